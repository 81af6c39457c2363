use crate::mapper::map_bottom_up;
use crate::{Address, ArborResult, Error, Node, NodeStore};
use itertools::Itertools;
use std::collections::HashMap;

/// Replaces every occurrence of the keys of `replacements` within `root`.
///
/// Keys are matched structurally. The tree is processed bottom-up: a parent
/// is looked up after its children have been replaced, first in its rebuilt
/// form and then in its original form. Replacement values are inserted as
/// they are and never transformed again.
pub fn replace_all(
    store: &NodeStore,
    root: &Node,
    replacements: &HashMap<Node, Node>,
) -> Node {
    if replacements.is_empty() {
        return store.import(root);
    }
    map_bottom_up(store, root, |orig, rebuilt| {
        replacements
            .get(&rebuilt)
            .or_else(|| replacements.get(orig))
            .map_or(rebuilt, |new| store.import(new))
    })
}

/// Replaces the node at `addr` by `new` and returns the new root. Only the
/// nodes along the path are rebuilt.
///
/// # Panics
/// Panics if `new` does not fit the position of the replaced node.
pub fn replace_node(store: &NodeStore, addr: &Address, new: Node) -> Node {
    try_replace_node(store, addr, new).unwrap_or_else(|e| panic!("{e}"))
}

/// Checked version of [replace_node]. Nothing is changed if a rebuilt node
/// would be malformed.
pub fn try_replace_node(
    store: &NodeStore,
    addr: &Address,
    new: Node,
) -> ArborResult<Node> {
    let mut cur = store.import(&new);
    let mut step = addr.clone();
    while !step.is_root() {
        let parent = step.parent_address(1)?;
        let mut children = parent.as_node().children().to_vec();
        children[step.child_index()] = cur;
        cur = store.try_rebuild(parent.as_node(), children).map_err(|e| {
            e.with_post_msg(Some(format!("while replacing the node at {addr}")))
        })?;
        step = parent;
    }
    Ok(cur)
}

/// Like [replace_node] but returns the address of the new node below the new
/// root.
pub fn replace_address(store: &NodeStore, addr: &Address, new: Node) -> Address {
    let root = replace_node(store, addr, new);
    addr.path()
        .into_iter()
        .fold(Address::root(root), |a, idx| a.extend(idx))
}

/// Replaces several addresses of one common root at once and returns the new
/// root. Deeper addresses are replaced first; a replacement below another
/// replaced address is overridden by the latter.
pub fn replace_all_addresses(
    store: &NodeStore,
    replacements: &[(Address, Node)],
) -> ArborResult<Node> {
    let Some((first, _)) = replacements.first() else {
        return Err(Error::invalid_address("no addresses to replace"));
    };
    let root = first.root_node().clone();
    if let Some((other, _)) =
        replacements.iter().find(|(a, _)| a.root_node().id() != root.id())
    {
        return Err(Error::invalid_address(format!(
            "addresses {first} and {other} have different roots"
        )));
    }
    let mut cur = root;
    for (addr, new) in replacements
        .iter()
        .sorted_by(|(a, _), (b, _)| b.depth().cmp(&a.depth()))
    {
        let moved = addr.switch_root(cur)?;
        cur = try_replace_node(store, &moved, new.clone())?;
    }
    log::debug!("replaced {} addresses", replacements.len());
    Ok(cur)
}

/// Replaces variables within `root`. Keys must be variables; values bound to
/// variables in declarations, loops or parameter lists must be variables too.
pub fn replace_vars(
    store: &NodeStore,
    root: &Node,
    replacements: &HashMap<Node, Node>,
) -> Node {
    if replacements.is_empty() {
        return store.import(root);
    }
    map_bottom_up(store, root, |orig, rebuilt| {
        if !orig.is_variable() {
            return rebuilt;
        }
        replacements
            .get(orig)
            .map_or(rebuilt, |new| store.import(new))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use arbor_utils::ErrorKind;

    #[test]
    fn replace_all_matches_structurally() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.variable(b.int_type());
        let y = b.variable(b.int_type());
        let e = b.add(b.mul(x.clone(), b.int_lit(2)), x.clone());
        let map = HashMap::from([(x.clone(), y.clone())]);
        let res = replace_all(&store, &e, &map);
        assert_eq!(res, b.add(b.mul(y.clone(), b.int_lit(2)), y));
        // the original is untouched
        assert_eq!(e.call_args()[1], x);
    }

    #[test]
    fn nested_keys_are_resolved_bottom_up() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let one = b.int_lit(1);
        let inner = b.add(one.clone(), one.clone());
        let outer = b.mul(inner.clone(), b.int_lit(3));
        // inner is replaced first; the rebuilt outer is then looked up
        let map = HashMap::from([
            (one.clone(), b.int_lit(5)),
            (b.mul(b.add(b.int_lit(5), b.int_lit(5)), b.int_lit(3)), b.int_lit(0)),
        ]);
        assert_eq!(replace_all(&store, &outer, &map), b.int_lit(0));
        // values are not transformed again
        let map = HashMap::from([(inner.clone(), b.add(one.clone(), one.clone()))]);
        assert!(replace_all(&store, &outer, &map).ptr_eq(&outer));
    }

    #[test]
    fn replace_node_rebuilds_only_one_occurrence() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.int_lit(1);
        let e = b.add(x.clone(), x.clone());
        let second = Address::from_path(e.clone(), &[3]).unwrap();
        let res = replace_node(&store, &second, b.int_lit(2));
        assert_eq!(res, b.add(b.int_lit(1), b.int_lit(2)));
        // replacing a node with itself yields the identical root
        assert!(replace_node(&store, &second, x).ptr_eq(&e));

        let new_addr = replace_address(&store, &second, b.int_lit(7));
        assert_eq!(new_addr.as_node(), &b.int_lit(7));
        assert_eq!(new_addr.path(), vec![3]);
    }

    #[test]
    fn replacements_must_fit_their_position() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let e = b.mul(b.add(b.int_lit(1), b.int_lit(2)), b.int_lit(3));
        let deep = Address::from_path(e.clone(), &[2, 3]).unwrap();
        let before = store.len();
        // a type is not an expression argument
        let err = try_replace_node(&store, &deep, b.int_type()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedNode { .. }));
        assert_eq!(store.len(), before);
        assert!(try_replace_node(&store, &deep, b.int_lit(4)).is_ok());
    }

    #[test]
    #[should_panic(expected = "malformed")]
    fn replace_node_panics_on_misfits() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let e = b.add(b.int_lit(1), b.int_lit(2));
        let arg = Address::from_path(e, &[2]).unwrap();
        replace_node(&store, &arg, b.int_type());
    }

    #[test]
    fn replace_several_addresses() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let x = b.int_lit(1);
        let e = b.add(b.mul(x.clone(), x.clone()), x.clone());
        let addrs = Address::find_all(&x, &e);
        assert_eq!(addrs.len(), 3);
        let repl = addrs
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), b.int_lit(10 + i as i64)))
            .collect_vec();
        let res = replace_all_addresses(&store, &repl).unwrap();
        assert_eq!(
            res,
            b.add(b.mul(b.int_lit(10), b.int_lit(11)), b.int_lit(12))
        );

        let foreign = Address::root(b.int_lit(4));
        let err = replace_all_addresses(
            &store,
            &[(addrs[0].clone(), x.clone()), (foreign, x)],
        );
        assert!(err.is_err());
    }

    #[test]
    fn replace_vars_only_touches_variables() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let v = b.variable(b.int_type());
        let w = b.variable(b.int_type());
        let body = b.compound([b.decl(v.clone(), b.int_lit(0)), b.add(v.clone(), v.clone())]);
        let map = HashMap::from([(v, w.clone())]);
        let res = replace_vars(&store, &body, &map);
        assert_eq!(res, b.compound([b.decl(w.clone(), b.int_lit(0)), b.add(w.clone(), w)]));
    }
}
