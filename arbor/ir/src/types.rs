use crate::{Id, Node, NodeKind, NodeStore};
use std::collections::HashMap;

/// A binding of type variable names to types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: HashMap<Id, Node>,
}

impl Substitution {
    pub fn get(&self, var: Id) -> Option<&Node> {
        self.bindings.get(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Bind `var` to `ty`. Fails if `var` is already bound to another type.
    fn bind(&mut self, var: Id, ty: &Node) -> bool {
        match self.bindings.get(&var) {
            Some(bound) => bound == ty,
            None => {
                self.bindings.insert(var, ty.clone());
                true
            }
        }
    }

    /// Extend this substitution such that it maps `pattern` onto `concrete`.
    /// Type variables occurring in `concrete` are treated as constants.
    pub fn unify(&mut self, pattern: &Node, concrete: &Node) -> bool {
        if pattern.kind() == NodeKind::TypeVariable {
            return match pattern.name() {
                Some(var) => self.bind(var, concrete),
                None => false,
            };
        }
        if pattern == concrete {
            return true;
        }
        pattern.kind() == concrete.kind()
            && pattern.value() == concrete.value()
            && pattern.num_children() == concrete.num_children()
            && pattern
                .children()
                .iter()
                .zip(concrete.children())
                .all(|(p, c)| self.unify(p, c))
    }

    /// Replace every bound type variable in `ty`.
    pub fn apply(&self, store: &NodeStore, ty: &Node) -> Node {
        if self.is_empty() {
            return store.import(ty);
        }
        crate::mapper::transform_bottom_up(store, ty, |node| {
            if node.kind() != NodeKind::TypeVariable {
                return node.clone();
            }
            node.name()
                .and_then(|var| self.get(var))
                .map_or_else(|| node.clone(), |ty| store.import(ty))
        })
    }
}

/// Computes the substitution instantiating `pattern` to `concrete`, if any.
pub fn instantiate(pattern: &Node, concrete: &Node) -> Option<Substitution> {
    let mut subst = Substitution::default();
    subst.unify(pattern, concrete).then_some(subst)
}

/// Result type of calling a function of type `fun_ty` with arguments of the
/// given types, or `None` if the arguments do not match the parameters.
pub fn return_type(
    store: &NodeStore,
    fun_ty: &Node,
    arg_types: &[Node],
) -> Option<Node> {
    if fun_ty.kind() != NodeKind::FunctionType {
        return None;
    }
    let params = fun_ty.child(0).children();
    if params.len() != arg_types.len() {
        return None;
    }
    let mut subst = Substitution::default();
    params
        .iter()
        .zip(arg_types)
        .all(|(p, a)| subst.unify(p, a))
        .then(|| subst.apply(store, fun_ty.child(1)))
}
