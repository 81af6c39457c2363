//! The node store: owner and interning table of all nodes of a session.
use crate::lang::LangBasic;
use crate::node::{Node, NodeId, NodeKind, Slot, StoreId, Value};
use arbor_utils::{ArborResult, Error};
use smallvec::SmallVec;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_STORE: AtomicU32 = AtomicU32::new(0);

/// Interning key. Children are always interned in the same store, so they
/// are compared by instance.
#[derive(PartialEq, Eq, Hash)]
struct NodeKey {
    kind: NodeKind,
    value: Option<Value>,
    children: SmallVec<[NodeId; 4]>,
}

/// Owns the canonical instance of every node created through it.
///
/// Requesting a node that is structurally equal to one created earlier
/// returns that earlier instance. Nodes are never evicted; they are freed
/// together when the store and all outstanding handles are dropped.
///
/// A store is meant for one thread. Use one store per compilation unit and
/// move results between stores with [NodeStore::import].
pub struct NodeStore {
    id: StoreId,
    table: RefCell<HashMap<NodeKey, Node, ahash::RandomState>>,
    next_index: Cell<u32>,
    next_var_id: Cell<u64>,
    basic: OnceCell<Rc<LangBasic>>,
}

impl Drop for NodeStore {
    fn drop(&mut self) {
        // Children are created before their parents. Releasing the newest
        // nodes first means every child is still held here when its parent
        // goes, so freeing a deep tree never recurses.
        let mut nodes: Vec<Node> =
            self.table.get_mut().drain().map(|(_, n)| n).collect();
        nodes.sort_unstable_by_key(|n| std::cmp::Reverse(n.id().index()));
        drop(nodes);
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        let id = StoreId(NEXT_STORE.fetch_add(1, Ordering::Relaxed));
        log::debug!("created node store {}", id.0);
        Self {
            id,
            table: RefCell::new(HashMap::default()),
            next_index: Cell::new(0),
            next_var_id: Cell::new(1),
            basic: OnceCell::new(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Number of canonical nodes registered so far.
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `node` is an instance owned by this store.
    pub fn contains(&self, node: &Node) -> bool {
        node.store_id() == self.id
    }

    /// The basic language vocabulary of this store, built on first use.
    pub fn lang_basic(&self) -> Rc<LangBasic> {
        Rc::clone(self.basic.get_or_init(|| Rc::new(LangBasic::new(self))))
    }

    /// Returns a variable identifier not handed out by this store before.
    pub fn fresh_variable_id(&self) -> u64 {
        let id = self.next_var_id.get();
        self.next_var_id.set(id + 1);
        id
    }

    /// Make sure [NodeStore::fresh_variable_id] never returns `id`.
    pub fn reserve_variable_id(&self, id: u64) {
        if id >= self.next_var_id.get() {
            self.next_var_id.set(id + 1);
        }
    }

    /// Returns the canonical node with the given kind and children.
    ///
    /// # Panics
    /// Panics if the children violate the contract of `kind`. Malformed IR is
    /// never accepted.
    pub fn get<I>(&self, kind: NodeKind, children: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.try_get(kind, children)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Checked version of [NodeStore::get].
    pub fn try_get<I>(&self, kind: NodeKind, children: I) -> ArborResult<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        if kind.is_value() {
            return Err(Error::malformed_node(
                kind,
                "value nodes are created with `get_value'",
            ));
        }
        let children: SmallVec<[Node; 4]> =
            children.into_iter().map(|c| self.import(&c)).collect();
        Self::check_contract(kind, &children)?;
        Ok(self.intern(kind, None, children))
    }

    /// Returns the canonical value node carrying `value`.
    pub fn get_value(&self, value: Value) -> Node {
        self.intern(value.kind(), Some(value), SmallVec::new())
    }

    /// Returns a node of the same kind (and value) as `node` with the given
    /// children. Returns `node` itself if the children are unchanged.
    ///
    /// # Panics
    /// Panics if the new children violate the contract of the kind.
    pub fn rebuild<I>(&self, node: &Node, children: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.try_rebuild(node, children)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Checked version of [NodeStore::rebuild].
    pub fn try_rebuild<I>(&self, node: &Node, children: I) -> ArborResult<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let children: SmallVec<[Node; 4]> =
            children.into_iter().map(|c| self.import(&c)).collect();
        if self.contains(node)
            && children.len() == node.num_children()
            && children
                .iter()
                .zip(node.children())
                .all(|(a, b)| a.ptr_eq(b))
        {
            return Ok(node.clone());
        }
        if let Some(value) = node.value() {
            if !children.is_empty() {
                return Err(Error::malformed_node(
                    node.kind(),
                    "value nodes have no children",
                ));
            }
            return Ok(self.get_value(value.clone()));
        }
        Self::check_contract(node.kind(), &children)?;
        Ok(self.intern(node.kind(), None, children))
    }

    /// Returns the instance of this store structurally equal to `node`.
    /// Nodes of foreign stores are re-interned recursively.
    pub fn import(&self, node: &Node) -> Node {
        if self.contains(node) {
            return node.clone();
        }
        // Children are imported before their parent; `memo` maps foreign
        // instances to ours.
        let mut memo: HashMap<NodeId, Node> = HashMap::new();
        let mut stack = vec![(node, false)];
        while let Some((n, expanded)) = stack.pop() {
            if memo.contains_key(&n.id()) {
                continue;
            }
            if self.contains(n) {
                memo.insert(n.id(), n.clone());
            } else if expanded {
                let children: SmallVec<[Node; 4]> =
                    n.children().iter().map(|c| memo[&c.id()].clone()).collect();
                // The foreign node was already checked by its own store.
                let res = self.intern(n.kind(), n.value().cloned(), children);
                memo.insert(n.id(), res);
            } else {
                stack.push((n, true));
                stack.extend(n.children().iter().map(|c| (c, false)));
            }
        }
        memo[&node.id()].clone()
    }

    fn check_contract(kind: NodeKind, children: &[Node]) -> ArborResult<()> {
        let contract = kind.contract();
        let fixed = contract.fixed.len();
        if children.len() < fixed
            || (contract.rest.is_none() && children.len() != fixed)
        {
            return Err(Error::malformed_node(
                kind,
                format!(
                    "expected {}{} children, got {}",
                    if contract.rest.is_some() { "at least " } else { "" },
                    fixed,
                    children.len()
                ),
            ));
        }
        let slots = contract
            .fixed
            .iter()
            .copied()
            .chain(std::iter::repeat_n(
                contract.rest.unwrap_or(Slot::Kind(kind)),
                children.len() - fixed,
            ));
        for (idx, (slot, child)) in slots.zip(children).enumerate() {
            if !slot.accepts(child.kind()) {
                return Err(Error::malformed_node(
                    kind,
                    format!(
                        "child {idx} must be {slot}, found `{}'",
                        child.kind()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn intern(
        &self,
        kind: NodeKind,
        value: Option<Value>,
        children: SmallVec<[Node; 4]>,
    ) -> Node {
        let key = NodeKey {
            kind,
            value,
            children: children.iter().map(Node::id).collect(),
        };
        if let Some(node) = self.table.borrow().get(&key) {
            return node.clone();
        }
        let index = self.next_index.get();
        self.next_index.set(
            index.checked_add(1).expect("too many nodes in the store"),
        );
        let node = Node::new(
            NodeId::new(self.id, index),
            kind,
            key.value.clone(),
            children,
        );
        log::trace!("store {}: new {} #{index}", self.id.0, kind);
        self.table.borrow_mut().insert(key, node.clone());
        node
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("id", &self.id.0)
            .field("nodes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use arbor_utils::ErrorKind;

    #[test]
    fn structurally_equal_requests_share_an_instance() {
        let store = NodeStore::new();
        let a = store.get_value(Value::Int(12));
        let b = store.get_value(Value::Int(12));
        assert!(a.ptr_eq(&b));

        let ty = Builder::new(&store).int_type();
        let lit1 = store.get(
            NodeKind::Literal,
            [ty.clone(), store.get_value(Value::Str("12".into()))],
        );
        let lit2 = store.get(
            NodeKind::Literal,
            [ty.clone(), store.get_value(Value::Str("12".into()))],
        );
        let lit3 = store.get(
            NodeKind::Literal,
            [ty, store.get_value(Value::Str("13".into()))],
        );
        assert!(lit1.ptr_eq(&lit2));
        assert!(!lit1.ptr_eq(&lit3));
        assert_ne!(lit1, lit3);
    }

    #[test]
    fn malformed_nodes_are_rejected() {
        let store = NodeStore::new();
        let name = store.get_value(Value::Str("int".into()));
        let err = store.try_get(NodeKind::GenericType, [name.clone()]);
        assert!(matches!(
            err.map_err(|e| e.kind().clone()),
            Err(ErrorKind::MalformedNode { .. })
        ));
        // A value where a type is expected.
        let err = store.try_get(NodeKind::Types, [name]);
        assert!(err.is_err());
    }

    #[test]
    #[should_panic(expected = "malformed")]
    fn get_fails_fast_on_malformed_nodes() {
        let store = NodeStore::new();
        store.get(NodeKind::ReturnStmt, []);
    }

    #[test]
    fn import_reinterns_foreign_nodes() {
        let s1 = NodeStore::new();
        let s2 = NodeStore::new();
        let b1 = Builder::new(&s1);
        let b2 = Builder::new(&s2);

        let e1 = b1.add(b1.int_lit(1), b1.int_lit(2));
        let e2 = b2.add(b2.int_lit(1), b2.int_lit(2));
        assert!(!e1.ptr_eq(&e2));
        assert_eq!(e1, e2);

        let imported = s2.import(&e1);
        assert!(imported.ptr_eq(&e2));
        assert!(s2.contains(&imported));
        // importing an own node is the identity
        assert!(s2.import(&e2).ptr_eq(&e2));
    }

    #[test]
    fn deep_trees_are_imported_compared_and_freed() {
        let s1 = NodeStore::new();
        let s2 = NodeStore::new();
        let b1 = Builder::new(&s1);
        let b2 = Builder::new(&s2);
        let (mut e1, mut e2) = (b1.int_lit(0), b2.int_lit(0));
        for _ in 0..100_000 {
            e1 = b1.compound([e1]);
            e2 = b2.compound([e2]);
        }
        assert!(e1 == e2);
        assert!(s2.import(&e1).ptr_eq(&e2));
        let s3 = NodeStore::new();
        let copy = s3.import(&e2);
        assert!(s3.contains(&copy));
        assert!(copy == e1);
    }

    use proptest::prelude::*;

    /// Builds a small expression from a recipe of operators and leaves.
    fn build(b: &Builder, recipe: &[(u8, i64)]) -> Node {
        recipe.iter().fold(b.int_lit(0), |acc, (op, leaf)| {
            let leaf = b.int_lit(*leaf);
            match op % 3 {
                0 => b.add(acc, leaf),
                1 => b.mul(leaf, acc),
                _ => b.sub(acc, leaf),
            }
        })
    }

    proptest! {
        #[test]
        fn hash_consing_is_idempotent(
            r1 in proptest::collection::vec((0u8..3, -3i64..3), 0..8),
            r2 in proptest::collection::vec((0u8..3, -3i64..3), 0..8),
        ) {
            let store = NodeStore::new();
            let b = Builder::new(&store);
            let e1 = build(&b, &r1);
            let e1_again = build(&b, &r1);
            let e2 = build(&b, &r2);
            prop_assert!(e1.ptr_eq(&e1_again));
            let same_recipe = r1.iter().map(|(o, l)| (o % 3, *l)).collect::<Vec<_>>()
                == r2.iter().map(|(o, l)| (o % 3, *l)).collect::<Vec<_>>();
            prop_assert_eq!(e1.ptr_eq(&e2), same_recipe);
            prop_assert_eq!(e1 == e2, same_recipe);
        }
    }

    #[test]
    fn rebuild_with_same_children_is_identity() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let e = b.mul(b.int_lit(3), b.int_lit(4));
        let same = store.rebuild(&e, e.children().to_vec());
        assert!(same.ptr_eq(&e));
    }
}
