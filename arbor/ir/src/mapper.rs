//! Node mappings rebuild a node from transformed children.
//!
//! The store returns the original instance whenever a rebuilt node has the
//! same children as before, so mappings that change nothing preserve sharing
//! all the way up to the root.
use crate::{Node, NodeId, NodeStore};
use std::collections::HashMap;

/// Maps the children of a node, one at a time.
pub trait NodeMapping {
    /// Maps the child at position `index`.
    fn map_element(&mut self, index: usize, element: &Node) -> Node;
}

/// Wraps a closure into a [NodeMapping].
pub struct MapFn<F>(pub F);

impl<F> NodeMapping for MapFn<F>
where
    F: FnMut(usize, &Node) -> Node,
{
    fn map_element(&mut self, index: usize, element: &Node) -> Node {
        (self.0)(index, element)
    }
}

/// A mapping applying a function at most once per node instance.
pub struct CachedNodeMapping<F> {
    f: F,
    cache: HashMap<NodeId, Node>,
}

impl<F> CachedNodeMapping<F>
where
    F: FnMut(&Node) -> Node,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            cache: HashMap::new(),
        }
    }

    /// Number of distinct instances mapped so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<F> NodeMapping for CachedNodeMapping<F>
where
    F: FnMut(&Node) -> Node,
{
    fn map_element(&mut self, _index: usize, element: &Node) -> Node {
        if let Some(res) = self.cache.get(&element.id()) {
            return res.clone();
        }
        let res = (self.f)(element);
        self.cache.insert(element.id(), res.clone());
        res
    }
}

impl Node {
    /// Returns this node with every child replaced by its image under
    /// `mapping`. The result is interned in `store`.
    pub fn substitute<M: NodeMapping + ?Sized>(
        &self,
        store: &NodeStore,
        mapping: &mut M,
    ) -> Node {
        let children: Vec<Node> = self
            .children()
            .iter()
            .enumerate()
            .map(|(idx, c)| mapping.map_element(idx, c))
            .collect();
        store.rebuild(self, children)
    }
}

/// Applies `f` to every node of `root` bottom-up. Each distinct instance is
/// processed once and its image reused for every occurrence.
///
/// `f` receives the original node and the node rebuilt from the images of
/// its children, and returns the image of the original node. Images are
/// never transformed again.
pub fn map_bottom_up<F>(store: &NodeStore, root: &Node, mut f: F) -> Node
where
    F: FnMut(&Node, Node) -> Node,
{
    let mut cache: HashMap<NodeId, Node> = HashMap::new();
    // (node, children scheduled)
    let mut stack: Vec<(Node, bool)> = vec![(root.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if cache.contains_key(&node.id()) {
            continue;
        }
        if !expanded {
            stack.push((node.clone(), true));
            for child in node.children().iter().rev() {
                if !cache.contains_key(&child.id()) {
                    stack.push((child.clone(), false));
                }
            }
            continue;
        }
        let children: Vec<Node> = node
            .children()
            .iter()
            .map(|c| cache[&c.id()].clone())
            .collect();
        let rebuilt = store.rebuild(&node, children);
        let image = f(&node, rebuilt);
        cache.insert(node.id(), image);
    }
    log::trace!("mapped {} distinct nodes", cache.len());
    cache
        .remove(&root.id())
        .unwrap_or_else(|| unreachable!("root is always mapped"))
}

/// Applies `f` bottom-up to every node of `root`, passing the node rebuilt
/// from the already transformed children.
pub fn transform_bottom_up<F>(store: &NodeStore, root: &Node, mut f: F) -> Node
where
    F: FnMut(&Node) -> Node,
{
    map_bottom_up(store, root, |_, rebuilt| f(&rebuilt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::visit_depth_first_once;
    use crate::{Builder, NodeKind};

    fn shared_tree(b: &Builder) -> Node {
        let x = b.variable(b.int_type());
        let mut e = b.add(x.clone(), b.int_lit(1));
        for _ in 0..20 {
            e = b.mul(e.clone(), e);
        }
        e
    }

    #[test]
    fn identity_preserves_every_instance() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let root = shared_tree(&b);
        let before = store.len();
        let res = transform_bottom_up(&store, &root, |n| n.clone());
        assert!(res.ptr_eq(&root));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn leaf_rewrite_keeps_unaffected_subtrees_shared() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let one = b.int_lit(1);
        let untouched = b.sub(b.int_lit(5), b.int_lit(6));
        let root = b.add(b.mul(one.clone(), untouched.clone()), untouched.clone());

        let two = b.int_lit(2);
        let mut calls = 0;
        let res = transform_bottom_up(&store, &root, |n| {
            calls += 1;
            if n.ptr_eq(&one) { two.clone() } else { n.clone() }
        });
        assert_eq!(res, b.add(b.mul(two, untouched.clone()), untouched.clone()));
        // the untouched operand is the same instance in input and output
        assert!(res.call_args()[1].ptr_eq(&untouched));
        let mut distinct = 0;
        visit_depth_first_once(&root, |_: &Node| distinct += 1);
        assert_eq!(calls, distinct);
    }

    #[test]
    fn cached_mapping_maps_instances_once() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.int_lit(3);
        let tuple = b.tuple_expr([x.clone(), x.clone(), x]);
        let exprs = tuple.child(1).clone();
        let mut seen = 0;
        let mut mapping = CachedNodeMapping::new(|n: &Node| {
            seen += 1;
            if n.kind() == NodeKind::Literal { b.int_lit(4) } else { n.clone() }
        });
        let res = exprs.substitute(&store, &mut mapping);
        assert_eq!(mapping.cached(), 1);
        drop(mapping);
        assert_eq!(seen, 1);
        assert!(res.children().iter().all(|c| c.ptr_eq(&b.int_lit(4))));
    }

    #[test]
    fn substitute_with_indices() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let e = b.sub(b.int_lit(1), b.int_lit(2));
        // swap the two arguments of the call
        let args = e.call_args().to_vec();
        let swapped = e.substitute(
            &store,
            &mut MapFn(|idx, n: &Node| match idx {
                2 => args[1].clone(),
                3 => args[0].clone(),
                _ => n.clone(),
            }),
        );
        assert_eq!(swapped, b.sub(b.int_lit(2), b.int_lit(1)));
    }
}
