use crate::visitor::visit_depth_first_once_prunable;
use crate::{Node, NodeKind};
use std::collections::HashSet;

/// Free variables of a node, attached to it once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeVariables(pub Vec<Node>);

/// The variables used within `node` without being declared within it, in
/// order of first occurrence. Declarations, loop iterators and lambda
/// parameters bind variables.
///
/// The result is memoized as an attached value of `node`, except for
/// variables, which are their own single free variable.
pub fn free_variables(node: &Node) -> Vec<Node> {
    if node.is_variable() {
        // attaching a variable to itself would keep it alive forever
        return vec![node.clone()];
    }
    if let Some(fv) = node.attached_value::<FreeVariables>() {
        return fv.0.clone();
    }
    let mut used = vec![];
    let mut bound = HashSet::new();
    visit_depth_first_once_prunable(node, |n: &Node| {
        match n.kind() {
            NodeKind::Variable => used.push(n.clone()),
            NodeKind::DeclarationStmt | NodeKind::ForStmt => {
                bound.insert(n.child(0).clone());
            }
            NodeKind::LambdaExpr => {
                bound.extend(n.child(1).children().iter().cloned());
            }
            _ => (),
        }
        // variables do not occur within types or variables
        n.is_type() || n.is_variable()
    });
    let res: Vec<Node> = used.into_iter().filter(|v| !bound.contains(v)).collect();
    log::trace!("{} free variables in {}", res.len(), node.kind());
    node.attach_value(FreeVariables(res.clone()));
    res
}

/// All variables occurring in `node`, in order of first occurrence.
pub fn variables(node: &Node) -> Vec<Node> {
    let mut res = vec![];
    visit_depth_first_once_prunable(node, |n: &Node| {
        if n.is_variable() {
            res.push(n.clone());
        }
        n.is_type() || n.is_variable()
    });
    res
}
