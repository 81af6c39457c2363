use crate::node::{Node, NodeId};
use arbor_utils::{ArborResult, Error};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

struct Step {
    node: Node,
    /// Index of `node` within the node of `parent`; 0 for the root.
    index: usize,
    parent: Option<Address>,
    depth: usize,
    root: Node,
}

impl Drop for Step {
    fn drop(&mut self) {
        // Unlink the parent chain one step at a time instead of recursively.
        let mut parent = self.parent.take();
        while let Some(Address(rc)) = parent {
            parent = match Rc::try_unwrap(rc) {
                Ok(mut step) => step.parent.take(),
                Err(_) => None,
            };
        }
    }
}

/// Identifies a node by the path leading to it from a root node.
///
/// Addresses are compared by root instance and path only: two addresses of
/// the same node reached along different paths, or below different roots, are
/// different. Addresses own nothing beyond shared handles to the nodes along
/// their path.
#[derive(Clone)]
pub struct Address(Rc<Step>);

impl Address {
    /// The empty path to `root`.
    pub fn root(root: Node) -> Self {
        Address(Rc::new(Step {
            node: root.clone(),
            index: 0,
            parent: None,
            depth: 0,
            root,
        }))
    }

    /// Follows the child indices of `path` starting at `root`.
    pub fn from_path(root: Node, path: &[usize]) -> ArborResult<Self> {
        path.iter()
            .try_fold(Address::root(root), |addr, idx| addr.child_address(*idx))
    }

    /// The address of child `idx` of the addressed node.
    pub fn child_address(&self, idx: usize) -> ArborResult<Self> {
        let node = self.as_node();
        if idx >= node.num_children() {
            return Err(Error::invalid_address(format!(
                "`{}' node has {} children, requested child {idx}",
                node.kind(),
                node.num_children()
            ))
            .with_post_msg(Some(format!("while extending address {self}"))));
        }
        Ok(self.extend(idx))
    }

    /// Extends the path by `idx`, which must be a valid child index.
    pub(crate) fn extend(&self, idx: usize) -> Self {
        Address(Rc::new(Step {
            node: self.as_node().child(idx).clone(),
            index: idx,
            parent: Some(self.clone()),
            depth: self.0.depth + 1,
            root: self.0.root.clone(),
        }))
    }

    /// The address `levels` steps closer to the root.
    pub fn parent_address(&self, levels: usize) -> ArborResult<Self> {
        if levels > self.depth() {
            return Err(Error::invalid_address(format!(
                "cannot go up {levels} levels from depth {}",
                self.depth()
            )));
        }
        let mut cur = self.clone();
        for _ in 0..levels {
            cur = cur.parent().clone();
        }
        Ok(cur)
    }

    /// Direct parent. Only called on non-root addresses.
    fn parent(&self) -> &Address {
        match &self.0.parent {
            Some(p) => p,
            None => unreachable!("root address has no parent"),
        }
    }

    /// The addressed node.
    pub fn as_node(&self) -> &Node {
        &self.0.node
    }

    pub fn root_node(&self) -> &Node {
        &self.0.root
    }

    pub fn root_address(&self) -> Address {
        let mut cur = self;
        while let Some(p) = &cur.0.parent {
            cur = p;
        }
        cur.clone()
    }

    /// Number of steps from the root.
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    /// Index of the addressed node within its parent; 0 for roots.
    pub fn child_index(&self) -> usize {
        self.0.index
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// Child indices from the root to the addressed node.
    pub fn path(&self) -> Vec<usize> {
        let mut path = vec![0; self.depth()];
        let mut cur = self;
        while let Some(p) = &cur.0.parent {
            path[cur.depth() - 1] = cur.child_index();
            cur = p;
        }
        path
    }

    /// Addresses from the root (inclusive) down to this one (inclusive).
    pub fn ancestors(&self) -> Vec<Address> {
        let mut res = Vec::with_capacity(self.depth() + 1);
        let mut cur = Some(self);
        while let Some(a) = cur {
            res.push(a.clone());
            cur = a.0.parent.as_ref();
        }
        res.reverse();
        res
    }

    /// Returns true if `other` is this address or lies below it.
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        if other.depth() < self.depth() {
            return false;
        }
        match other.parent_address(other.depth() - self.depth()) {
            Ok(anc) => anc == *self,
            Err(_) => false,
        }
    }

    /// Reinterprets the path of this address below `new_root`.
    pub fn switch_root(&self, new_root: Node) -> ArborResult<Address> {
        Address::from_path(new_root, &self.path()).map_err(|e| {
            e.with_post_msg(Some(format!("while switching root of {self}")))
        })
    }

    /// All addresses below `root` leading to nodes structurally equal to
    /// `target`, in pre-order. Sub-trees that cannot contain `target` are not
    /// entered.
    pub fn find_all(target: &Node, root: &Node) -> Vec<Address> {
        let mut memo = HashMap::new();
        let mut res = vec![];
        let mut stack = vec![Address::root(root.clone())];
        while let Some(addr) = stack.pop() {
            let node = addr.as_node();
            if node == target {
                res.push(addr);
                continue;
            }
            for idx in (0..node.num_children()).rev() {
                if contains(node.child(idx), target, &mut memo) {
                    stack.push(addr.extend(idx));
                }
            }
        }
        res
    }

    /// The first address of `target` below `root` in pre-order.
    pub fn find_first(target: &Node, root: &Node) -> Option<Address> {
        let mut memo = HashMap::new();
        if !contains(root, target, &mut memo) {
            return None;
        }
        let mut cur = Address::root(root.clone());
        while cur.as_node() != target {
            let node = cur.as_node();
            let idx = (0..node.num_children())
                .find(|i| contains(node.child(*i), target, &mut memo))?;
            cur = cur.extend(idx);
        }
        Some(cur)
    }
}

/// Returns true if `target` occurs within `node`. Memoized per instance.
fn contains(node: &Node, target: &Node, memo: &mut HashMap<NodeId, bool>) -> bool {
    // post-order: a node is decided once all its children are
    let mut stack = vec![(node, false)];
    while let Some((n, expanded)) = stack.pop() {
        if memo.contains_key(&n.id()) {
            continue;
        }
        if n == target {
            memo.insert(n.id(), true);
        } else if expanded {
            let res = n
                .children()
                .iter()
                .any(|c| memo.get(&c.id()).copied().unwrap_or(false));
            memo.insert(n.id(), res);
        } else {
            stack.push((n, true));
            stack.extend(n.children().iter().map(|c| (c, false)));
        }
    }
    memo.get(&node.id()).copied().unwrap_or(false)
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.depth() != other.depth()
            || self.root_node().id() != other.root_node().id()
        {
            return false;
        }
        let (mut a, mut b) = (self, other);
        loop {
            if Rc::ptr_eq(&a.0, &b.0) {
                return true;
            }
            if a.child_index() != b.child_index() {
                return false;
            }
            match (&a.0.parent, &b.0.parent) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                _ => return true,
            }
        }
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root_node().id().hash(state);
        self.path().hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root_node()
            .id()
            .cmp(&other.root_node().id())
            .then_with(|| self.path().cmp(&other.path()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0")?;
        for idx in self.path() {
            write!(f, "-{idx}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self, self.as_node())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, NodeStore};
    use arbor_utils::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn navigation_and_display() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.variable(b.int_type());
        let e = b.add(x.clone(), b.int_lit(1));
        let root = Address::root(e.clone());
        assert!(root.is_root());
        let arg = root.child_address(2).unwrap();
        assert_eq!(arg.as_node(), &x);
        assert_eq!(arg.to_string(), "0-2");
        assert_eq!(arg.parent_address(1).unwrap(), root);
        assert_eq!(arg.root_address(), root);
        assert!(root.is_prefix_of(&arg));
        assert!(!arg.is_prefix_of(&root));
    }

    #[test]
    fn navigation_failures_are_loud() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let root = Address::root(b.int_lit(1));
        let err = root.child_address(5).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidAddress(_)));
        assert!(root.parent_address(1).is_err());
        assert!(Address::from_path(b.int_lit(1), &[0, 0, 0]).is_err());
    }

    #[test]
    fn equality_depends_on_root_and_path() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let one = b.int_lit(1);
        let e = b.add(one.clone(), one.clone());
        let first = Address::from_path(e.clone(), &[2]).unwrap();
        let second = Address::from_path(e.clone(), &[3]).unwrap();
        // same node, different paths
        assert_eq!(first.as_node(), second.as_node());
        assert_ne!(first, second);
        assert!(first < second);
        // same path, different root
        let other = b.sub(one.clone(), one.clone());
        let moved = first.switch_root(other).unwrap();
        assert_ne!(first, moved);
        assert_eq!(first, Address::from_path(e, &[2]).unwrap());
    }

    #[test]
    fn find_all_finds_every_occurrence() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.variable(b.int_type());
        let sq = b.mul(x.clone(), x.clone());
        let e = b.add(sq.clone(), sq);
        let found = Address::find_all(&x, &e);
        let paths: Vec<_> = found.iter().map(Address::path).collect();
        assert_eq!(paths, vec![vec![2, 2], vec![2, 3], vec![3, 2], vec![3, 3]]);
        assert_eq!(Address::find_first(&x, &e), Some(found[0].clone()));
        assert!(Address::find_all(&b.int_lit(99), &e).is_empty());
    }

    #[test]
    fn deep_trees_are_searched_without_recursion() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let leaf = b.variable(b.int_type());
        let mut root = leaf.clone();
        for _ in 0..100_000 {
            root = b.compound([root]);
        }
        let found = Address::find_all(&leaf, &root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].depth(), 100_000);
        assert_eq!(Address::find_first(&leaf, &root), Some(found[0].clone()));
        assert!(Address::find_all(&b.int_lit(3), &root).is_empty());
    }

    proptest! {
        #[test]
        fn found_addresses_lead_to_the_target(
            leaves in proptest::collection::vec(0i64..4, 1..12),
            pick in 0usize..12,
        ) {
            let store = NodeStore::new();
            let b = Builder::new(&store);
            let mut e = b.int_lit(leaves[0]);
            for (i, l) in leaves.iter().enumerate().skip(1) {
                e = if i % 2 == 0 {
                    b.add(e, b.int_lit(*l))
                } else {
                    b.mul(b.int_lit(*l), e)
                };
            }
            let target = b.int_lit(leaves[pick % leaves.len()]);
            let found = Address::find_all(&target, &e);
            prop_assert!(!found.is_empty());
            for addr in &found {
                let again = Address::from_path(e.clone(), &addr.path()).unwrap();
                prop_assert_eq!(again.as_node(), &target);
                prop_assert_eq!(&again, addr);
            }
            // switching to a structurally equal root from another store
            let other = NodeStore::new();
            let copy = other.import(&e);
            let moved = found[0].switch_root(copy).unwrap();
            prop_assert_eq!(moved.as_node(), &target);
        }
    }
}
