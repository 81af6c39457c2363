use arbor::{driver, kernels};
use arbor_ir::{arithmetic, mapper, Address, Builder, Node, NodeStore};
use arbor_opt::analysis::access::{Access, AccessManager, AliasMap};
use arbor_opt::analysis::polyhedral::{normalize, to_ir, Constraint};
use arbor_opt::AnalysisConf;
use proptest::prelude::*;
use std::collections::HashMap;
use std::rc::Rc;

#[test]
fn alias_and_reference_share_a_class() {
    let store = NodeStore::new();
    let b = Builder::new(&store);
    let block = kernels::alias(&b);
    let aliases = AliasMap::collect(&store, &block);
    let root = Address::root(block);
    // statements 3, 4 and 5 are `a`, `c` and the unrelated reference
    let access = |i: usize| {
        Access::extract(&root.child_address(i).unwrap(), &aliases).unwrap()
    };

    let mut mgr = AccessManager::new(AnalysisConf::default());
    let a = mgr.get_class_for(&access(3));
    let c = mgr.get_class_for(&access(4));
    let other = mgr.get_class_for(&access(5));
    assert!(Rc::ptr_eq(&a, &c));
    assert!(!Rc::ptr_eq(&a, &other));
    assert_eq!(a.borrow().len(), 2);
}

#[test]
fn alias_kernel_through_the_driver() {
    let store = NodeStore::new();
    let b = Builder::new(&store);
    let block = kernels::alias(&b);
    let report = driver::analyse(&b, &block, AnalysisConf::default()).unwrap();
    // the initializer of `c` is a use of `a` as well
    assert_eq!(report.accesses.len(), 4);
    assert_eq!(report.manager.len(), 2);
}

fn tautology(b: &Builder) -> (Node, Node) {
    let n = b.variable(b.int_type());
    let lhs = b.add(b.int_lit(7), n.clone());
    let rhs = b.add(b.int_lit(12), n.clone());
    (n, b.lt(lhs, rhs))
}

proptest! {
    #[test]
    fn cancelled_comparison_is_a_tautology(v in any::<i32>()) {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let (n, cond) = tautology(&b);
        let c = Constraint::from_expr(&[], &cond).unwrap();
        let ir = to_ir(&b, &normalize(&c));
        let env = HashMap::from([(n, i64::from(v))]);
        let res = arithmetic::evaluate(&ir, &env).unwrap();
        prop_assert!(res.as_bool().unwrap());
    }
}

#[test]
fn tautology_kernel_is_decided() {
    let store = NodeStore::new();
    let b = Builder::new(&store);
    let root = kernels::tautology(&b);
    let report = driver::analyse(&b, &root, AnalysisConf::default()).unwrap();
    assert_eq!(report.conditions.len(), 1);
    assert_eq!(report.conditions[0].verdict, Some(true));
    assert_eq!(report.conditions[0].normalized.to_string(), "int_ge(4, 0)");
}

#[test]
fn identity_mapping_keeps_instances() {
    let store = NodeStore::new();
    let b = Builder::new(&store);
    let root = kernels::stencil(&b);
    let same = mapper::transform_bottom_up(&store, &root, |n| n.clone());
    assert!(same.ptr_eq(&root));
}
