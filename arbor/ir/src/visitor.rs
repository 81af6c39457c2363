//! Depth-first traversal of nodes and addresses.
//!
//! All traversals run on an explicit work list, so the depth of the visited
//! tree is not limited by the native stack. The `*_once` variants visit every
//! node instance a single time, which keeps traversals of heavily shared
//! DAGs linear in the number of distinct nodes.
use crate::{Address, ArborResult, Node, NodeId, NodeKind};
use std::collections::HashSet;
use std::convert::Infallible;

/// The order in which a traversal invokes its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Parents before their children.
    Pre,
    /// Children before their parents.
    Post,
}

/// Control flow for traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Continue traversal of the tree.
    Continue,
    /// Do not visit the children of the current node. In post-order
    /// traversals the children have already been visited and this is the
    /// same as [Action::Continue].
    Prune,
    /// Abort the whole traversal.
    Interrupt,
}

impl Action {
    /// Run the traversal specified by `next` if this action is
    /// [Action::Continue].
    pub fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Prune | Action::Interrupt => Ok(self),
        }
    }
}

/// The result of visiting a node.
pub type VisResult = ArborResult<Action>;

/// Anything a traversal can walk: nodes or addresses of nodes.
pub trait Visitable: Clone {
    /// The node represented by this element.
    fn node(&self) -> &Node;

    /// The element for child `idx` of [Visitable::node].
    fn child_at(&self, idx: usize) -> Self;

    /// The instance used by the `once` traversals to detect sharing.
    fn instance(&self) -> NodeId {
        self.node().id()
    }
}

impl Visitable for Node {
    fn node(&self) -> &Node {
        self
    }

    fn child_at(&self, idx: usize) -> Self {
        self.child(idx).clone()
    }
}

impl Visitable for Address {
    fn node(&self) -> &Node {
        self.as_node()
    }

    fn child_at(&self, idx: usize) -> Self {
        self.extend(idx)
    }
}

/// A configured depth-first traversal.
#[derive(Debug, Clone, Copy)]
pub struct DepthFirst {
    order: Order,
    once: bool,
}

impl DepthFirst {
    pub fn new(order: Order) -> Self {
        Self { order, once: false }
    }

    /// Visit every node instance only once.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Runs the traversal. Returns `Ok(true)` if the callback interrupted it.
    /// Errors of the callback abort the traversal and are returned as is.
    pub fn try_run<T, E, F>(&self, root: &T, mut f: F) -> Result<bool, E>
    where
        T: Visitable,
        F: FnMut(&T) -> Result<Action, E>,
    {
        let mut seen: HashSet<NodeId> = HashSet::new();
        match self.order {
            Order::Pre => {
                let mut stack = vec![root.clone()];
                while let Some(cur) = stack.pop() {
                    if self.once && !seen.insert(cur.instance()) {
                        continue;
                    }
                    match f(&cur)? {
                        Action::Interrupt => return Ok(true),
                        Action::Prune => (),
                        Action::Continue => {
                            let n = cur.node().num_children();
                            stack.extend((0..n).rev().map(|i| cur.child_at(i)));
                        }
                    }
                }
            }
            Order::Post => {
                // (element, index of the next child to visit)
                let mut stack = vec![(root.clone(), 0usize)];
                if self.once {
                    seen.insert(root.instance());
                }
                while let Some((cur, next)) = stack.pop() {
                    if next < cur.node().num_children() {
                        let child = cur.child_at(next);
                        stack.push((cur, next + 1));
                        if !self.once || seen.insert(child.instance()) {
                            stack.push((child, 0));
                        }
                        continue;
                    }
                    if f(&cur)? == Action::Interrupt {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Runs the traversal with a callback that cannot fail.
    pub fn run<T, F>(&self, root: &T, mut f: F) -> bool
    where
        T: Visitable,
        F: FnMut(&T) -> Action,
    {
        let res: Result<bool, Infallible> = self.try_run(root, |n| Ok(f(n)));
        let Ok(interrupted) = res;
        interrupted
    }
}

/// Visits every node of `root` in pre-order, shared sub-trees once for each
/// occurrence.
pub fn visit_depth_first<T: Visitable, F: FnMut(&T)>(root: &T, mut f: F) {
    DepthFirst::new(Order::Pre).run(root, |n| {
        f(n);
        Action::Continue
    });
}

pub fn visit_depth_first_post_order<T: Visitable, F: FnMut(&T)>(
    root: &T,
    mut f: F,
) {
    DepthFirst::new(Order::Post).run(root, |n| {
        f(n);
        Action::Continue
    });
}

/// Visits every node instance of `root` exactly once, in pre-order. Children
/// are visited in their declared order the first time their parent is seen.
pub fn visit_depth_first_once<T: Visitable, F: FnMut(&T)>(root: &T, mut f: F) {
    DepthFirst::new(Order::Pre).once().run(root, |n| {
        f(n);
        Action::Continue
    });
}

pub fn visit_depth_first_once_post_order<T: Visitable, F: FnMut(&T)>(
    root: &T,
    mut f: F,
) {
    DepthFirst::new(Order::Post).once().run(root, |n| {
        f(n);
        Action::Continue
    });
}

/// Pre-order traversal where returning `true` skips the children of the
/// current node.
pub fn visit_depth_first_prunable<T, F>(root: &T, mut f: F)
where
    T: Visitable,
    F: FnMut(&T) -> bool,
{
    DepthFirst::new(Order::Pre).run(root, |n| prune_if(f(n)));
}

pub fn visit_depth_first_once_prunable<T, F>(root: &T, mut f: F)
where
    T: Visitable,
    F: FnMut(&T) -> bool,
{
    DepthFirst::new(Order::Pre).once().run(root, |n| prune_if(f(n)));
}

fn prune_if(prune: bool) -> Action {
    if prune {
        Action::Prune
    } else {
        Action::Continue
    }
}

/// Pre-order traversal controlled by the returned [Action]. Returns true if
/// the traversal was interrupted.
pub fn visit_depth_first_interruptible<T, F>(root: &T, f: F) -> bool
where
    T: Visitable,
    F: FnMut(&T) -> Action,
{
    DepthFirst::new(Order::Pre).run(root, f)
}

pub fn visit_depth_first_once_interruptible<T, F>(root: &T, f: F) -> bool
where
    T: Visitable,
    F: FnMut(&T) -> Action,
{
    DepthFirst::new(Order::Pre).once().run(root, f)
}

/// Pre-order traversal with a fallible callback. The first error aborts the
/// traversal and is returned.
pub fn try_visit_depth_first<T, F>(root: &T, mut f: F) -> ArborResult<()>
where
    T: Visitable,
    F: FnMut(&T) -> ArborResult<()>,
{
    DepthFirst::new(Order::Pre)
        .try_run(root, |n| f(n).map(|_| Action::Continue))
        .map(|_| ())
}

/// Returns true if `pred` holds for some node of `root`.
pub fn any_node<T, F>(root: &T, mut pred: F) -> bool
where
    T: Visitable,
    F: FnMut(&T) -> bool,
{
    visit_depth_first_once_interruptible(root, |n| {
        if pred(n) {
            Action::Interrupt
        } else {
            Action::Continue
        }
    })
}

/// A pass over the addresses of a tree with hooks per kind of node.
///
/// `start_*` hooks run before the children of a node are visited and may
/// prune them; `finish_*` hooks run afterwards. The finish hook of a node
/// runs even if its start hook pruned the children. Specialized hooks
/// default to the hook of their category, which default to
/// [Visitor::start_node] and [Visitor::finish_node].
pub trait Visitor {
    /// Runs the pass on the tree below `root`. Returns `Ok(true)` if a hook
    /// interrupted it.
    fn do_pass(&mut self, root: &Address) -> ArborResult<bool> {
        enum Todo {
            Enter(Address),
            Exit(Address),
        }
        let mut stack = vec![Todo::Enter(root.clone())];
        while let Some(todo) = stack.pop() {
            match todo {
                Todo::Enter(addr) => match self.start(&addr)? {
                    Action::Interrupt => return Ok(true),
                    Action::Prune => stack.push(Todo::Exit(addr)),
                    Action::Continue => {
                        let n = addr.as_node().num_children();
                        let children =
                            (0..n).rev().map(|i| Todo::Enter(addr.extend(i)));
                        stack.push(Todo::Exit(addr.clone()));
                        stack.extend(children);
                    }
                },
                Todo::Exit(addr) => {
                    if self.finish(&addr)? == Action::Interrupt {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Dispatches to the start hook for the kind of the addressed node.
    fn start(&mut self, addr: &Address) -> VisResult {
        let kind = addr.as_node().kind();
        match kind {
            NodeKind::CallExpr => self.start_call(addr),
            NodeKind::Variable => self.start_variable(addr),
            NodeKind::DeclarationStmt => self.start_decl(addr),
            NodeKind::ForStmt => self.start_for(addr),
            NodeKind::CompoundStmt => self.start_compound(addr),
            _ if kind.is_type() => self.start_type(addr),
            _ if kind.is_expression() => self.start_expression(addr),
            _ if kind.is_statement() => self.start_statement(addr),
            _ => self.start_node(addr),
        }
    }

    /// Dispatches to the finish hook for the kind of the addressed node.
    fn finish(&mut self, addr: &Address) -> VisResult {
        let kind = addr.as_node().kind();
        match kind {
            NodeKind::CallExpr => self.finish_call(addr),
            NodeKind::Variable => self.finish_expression(addr),
            NodeKind::DeclarationStmt => self.finish_decl(addr),
            NodeKind::ForStmt => self.finish_for(addr),
            NodeKind::CompoundStmt => self.finish_compound(addr),
            _ if kind.is_type() => self.finish_node(addr),
            _ if kind.is_expression() => self.finish_expression(addr),
            _ if kind.is_statement() => self.finish_statement(addr),
            _ => self.finish_node(addr),
        }
    }

    fn start_node(&mut self, _addr: &Address) -> VisResult {
        Ok(Action::Continue)
    }

    fn finish_node(&mut self, _addr: &Address) -> VisResult {
        Ok(Action::Continue)
    }

    /// Types are leaves for most passes.
    fn start_type(&mut self, _addr: &Address) -> VisResult {
        Ok(Action::Prune)
    }

    fn start_expression(&mut self, addr: &Address) -> VisResult {
        self.start_node(addr)
    }

    fn finish_expression(&mut self, addr: &Address) -> VisResult {
        self.finish_node(addr)
    }

    fn start_statement(&mut self, addr: &Address) -> VisResult {
        self.start_node(addr)
    }

    fn finish_statement(&mut self, addr: &Address) -> VisResult {
        self.finish_node(addr)
    }

    fn start_call(&mut self, addr: &Address) -> VisResult {
        self.start_expression(addr)
    }

    fn finish_call(&mut self, addr: &Address) -> VisResult {
        self.finish_expression(addr)
    }

    fn start_variable(&mut self, addr: &Address) -> VisResult {
        self.start_expression(addr)
    }

    fn start_decl(&mut self, addr: &Address) -> VisResult {
        self.start_statement(addr)
    }

    fn finish_decl(&mut self, addr: &Address) -> VisResult {
        self.finish_statement(addr)
    }

    fn start_for(&mut self, addr: &Address) -> VisResult {
        self.start_statement(addr)
    }

    fn finish_for(&mut self, addr: &Address) -> VisResult {
        self.finish_statement(addr)
    }

    fn start_compound(&mut self, addr: &Address) -> VisResult {
        self.start_statement(addr)
    }

    fn finish_compound(&mut self, addr: &Address) -> VisResult {
        self.finish_statement(addr)
    }
}
