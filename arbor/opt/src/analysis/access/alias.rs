use arbor_ir::{visitor, LangBasic, Node, NodeKind, NodeStore};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Reference variables initialized with another reference variable.
///
/// After `decl ref<T> c = a`, `c` and `a` denote the same location, so
/// accesses through `c` are treated as accesses through `a`.
pub struct AliasMap {
    basic: Rc<LangBasic>,
    aliases: HashMap<Node, Node>,
}

impl AliasMap {
    /// An empty map over the language of `store`.
    pub fn new(store: &NodeStore) -> Self {
        Self {
            basic: store.lang_basic(),
            aliases: HashMap::new(),
        }
    }

    /// Collects the aliasing declarations anywhere below `root`.
    pub fn collect(store: &NodeStore, root: &Node) -> Self {
        let mut map = Self::new(store);
        visitor::visit_depth_first_once(root, |n: &Node| {
            if n.kind() != NodeKind::DeclarationStmt {
                return;
            }
            if let Some((var, init)) = n.declaration() {
                if init.is_variable() && map.basic.is_ref_type(var.expr_type()) {
                    map.insert(var.clone(), init.clone());
                }
            }
        });
        log::debug!("found {} aliasing declarations", map.len());
        map
    }

    /// Records that `alias` denotes the same location as `target`.
    pub fn insert(&mut self, alias: Node, target: Node) {
        log::trace!("alias {alias} -> {target}");
        self.aliases.insert(alias, target);
    }

    /// The variable `var` ultimately refers to. Cycles stop at the first
    /// repeated variable.
    pub fn resolve(&self, var: &Node) -> Node {
        let mut seen = HashSet::new();
        let mut cur = var;
        while let Some(next) = self.aliases.get(cur) {
            if !seen.insert(cur.id()) {
                break;
            }
            cur = next;
        }
        cur.clone()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub(super) fn basic(&self) -> &LangBasic {
        &self.basic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_ir::Builder;

    #[test]
    fn chains_are_followed() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let ref_int = b.ref_type(b.int_type());
        let a = b.variable(ref_int.clone());
        let c = b.variable(ref_int.clone());
        let d = b.variable(ref_int);
        let x = b.variable(b.int_type());
        let block = b.compound([
            b.decl(a.clone(), b.ref_var(b.int_lit(10))),
            b.decl(c.clone(), a.clone()),
            b.decl(d.clone(), c.clone()),
            // not a reference, so not an alias
            b.decl(x.clone(), b.deref(a.clone())),
        ]);
        let map = AliasMap::collect(&store, &block);
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(&d), a);
        assert_eq!(map.resolve(&c), a);
        assert_eq!(map.resolve(&a), a);
        assert_eq!(map.resolve(&x), x);
    }

    #[test]
    fn cycles_terminate() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let ref_int = b.ref_type(b.int_type());
        let a = b.variable(ref_int.clone());
        let c = b.variable(ref_int);
        let mut map = AliasMap::new(&store);
        map.insert(a.clone(), c.clone());
        map.insert(c.clone(), a.clone());
        let r = map.resolve(&a);
        assert!(r == a || r == c);
    }
}
