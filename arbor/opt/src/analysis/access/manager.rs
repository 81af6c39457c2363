use super::alias::AliasMap;
use super::class::AccessClass;
use super::extract::{list_str, Access, VarType};
use crate::{AnalysisConf, AnalysisOpt, Named, ParseVal};
use arbor_ir::visitor::{Action, VisResult, Visitor};
use arbor_ir::{rrc, Address, ArborResult, BasicOp, Error, NodeKind, RRC};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static MANAGER_COUNT: AtomicU32 = AtomicU32::new(0);

/// Partitions the accesses submitted to it into [AccessClass]es.
///
/// The partition only grows: a class, once created, is never merged with
/// another one and an access never changes its class.
pub struct AccessManager {
    id: u32,
    classes: Vec<RRC<AccessClass>>,
    conf: AnalysisConf,
}

impl Named for AccessManager {
    fn name() -> &'static str {
        "access"
    }

    fn description() -> &'static str {
        "partition memory accesses into alias classes"
    }

    fn opts() -> Vec<AnalysisOpt> {
        vec![
            AnalysisOpt::new(
                "range-merge",
                "merge array and tuple accesses using data paths and index ranges",
                ParseVal::Bool(true),
                AnalysisOpt::parse_bool,
            ),
            AnalysisOpt::new(
                "strict-context",
                "separate symbolic array accesses of different loop nests",
                ParseVal::Bool(true),
                AnalysisOpt::parse_bool,
            ),
            AnalysisOpt::new(
                "enum-bound",
                "maximal number of iterations enumerated by a range test",
                ParseVal::Num(256),
                AnalysisOpt::parse_num,
            ),
        ]
    }
}

impl AccessManager {
    pub fn new(conf: AnalysisConf) -> Self {
        Self {
            id: MANAGER_COUNT.fetch_add(1, Ordering::Relaxed),
            classes: vec![],
            conf,
        }
    }

    pub fn conf(&self) -> &AnalysisConf {
        &self.conf
    }

    pub fn classes(&self) -> &[RRC<AccessClass>] {
        &self.classes
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class of `access`, which is added to an existing class or to a
    /// new one if it is not a member yet.
    ///
    /// # Panics
    /// Panics if `access` and a stored access of the same variable disagree
    /// about the kind of the variable, or on an unsupported merge.
    pub fn get_class_for(&mut self, access: &Access) -> RRC<AccessClass> {
        self.try_get_class_for(access)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_get_class_for(
        &mut self,
        access: &Access,
    ) -> ArborResult<RRC<AccessClass>> {
        if let Some(class) =
            self.classes.iter().find(|c| c.borrow().contains(access))
        {
            return Ok(Rc::clone(class));
        }

        let mut target = None;
        'classes: for class in &self.classes {
            for stored in class.borrow().accesses() {
                if stored.variable() != access.variable() {
                    continue;
                }
                if stored.kind() != access.kind() {
                    return Err(Error::access_kind_mismatch(
                        access.variable(),
                        stored.kind(),
                        access.kind(),
                    )
                    .with_post_msg(Some(format!(
                        "while classifying {access} against {stored}"
                    ))));
                }
                if self.same_location(stored, access)? {
                    target = Some(Rc::clone(class));
                    break 'classes;
                }
            }
        }

        let class = match target {
            Some(class) => {
                log::trace!("{access} joins class {}", class.borrow().id());
                class
            }
            None => {
                let class = rrc(AccessClass::new(self.id, self.classes.len()));
                log::trace!("{access} opens class {}", class.borrow().id());
                self.classes.push(Rc::clone(&class));
                class
            }
        };
        class.borrow_mut().try_store_access(access.clone())?;
        Ok(class)
    }

    /// Decides if two accesses to the same variable of the same kind may
    /// denote the same location.
    fn same_location(&self, stored: &Access, access: &Access) -> ArborResult<bool> {
        match access.kind() {
            VarType::Scalar => Ok(true),
            VarType::Member => Ok(stored.path() == access.path()),
            kind @ (VarType::Tuple | VarType::Array) => {
                if !self.conf.range_merge {
                    return Err(Error::unsupported(format!(
                        "merging {kind} accesses {stored} and {access}"
                    )));
                }
                Ok(stored.path() == access.path() && self.ranges_may_overlap(stored, access))
            }
        }
    }

    fn ranges_may_overlap(&self, stored: &Access, access: &Access) -> bool {
        let (Some(r1), Some(r2)) = (stored.range(), access.range()) else {
            return true;
        };
        if r1 == r2 {
            return true;
        }
        let comparable = stored.context() == access.context()
            || (!r1.is_symbolic() && !r2.is_symbolic());
        if comparable {
            r1.may_overlap(r2, self.conf.enum_bound)
        } else if self.conf.strict_context {
            log::warn!(
                "symbolic ranges of {stored} and {access} belong to different contexts, keeping them apart"
            );
            false
        } else {
            true
        }
    }

    /// Classifies every access below `block`. Variables in binding positions
    /// are not accesses, and navigation expressions are classified as a
    /// whole rather than through their base.
    pub fn classify_block(
        &mut self,
        block: &Address,
        aliases: &AliasMap,
    ) -> ArborResult<Vec<(Access, RRC<AccessClass>)>> {
        let mut classifier = Classifier {
            manager: self,
            aliases,
            inner: HashSet::new(),
            found: vec![],
        };
        classifier.do_pass(block)?;
        let found = classifier.found;
        log::debug!(
            "classified {} accesses of {block} into {} classes",
            found.len(),
            self.len()
        );
        Ok(found)
    }
}

impl std::fmt::Display for AccessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for class in &self.classes {
            writeln!(f, "{}", class.borrow())?;
        }
        Ok(())
    }
}

struct Classifier<'a> {
    manager: &'a mut AccessManager,
    aliases: &'a AliasMap,
    /// Addresses that are part of an access already recorded.
    inner: HashSet<Address>,
    found: Vec<(Access, RRC<AccessClass>)>,
}

impl Classifier<'_> {
    fn is_binding(addr: &Address) -> bool {
        let Ok(parent) = addr.parent_address(1) else {
            return false;
        };
        match parent.as_node().kind() {
            NodeKind::DeclarationStmt | NodeKind::ForStmt => addr.child_index() == 0,
            NodeKind::Parameters => true,
            _ => false,
        }
    }

    fn record(&mut self, access: Access) -> ArborResult<()> {
        let class = self.manager.try_get_class_for(&access)?;
        self.found.push((access, class));
        Ok(())
    }
}

impl Visitor for Classifier<'_> {
    fn start_variable(&mut self, addr: &Address) -> VisResult {
        if !self.inner.contains(addr) && !Self::is_binding(addr) {
            if let Some(access) = Access::extract(addr, self.aliases) {
                self.record(access)?;
            }
        }
        Ok(Action::Prune)
    }

    fn start_call(&mut self, addr: &Address) -> VisResult {
        let navigation = self
            .aliases
            .basic()
            .called_op(addr.as_node())
            .is_some_and(BasicOp::is_ref_navigation);
        if !navigation {
            return Ok(Action::Continue);
        }
        let base = addr.child_address(2)?;
        if self.inner.contains(addr) {
            self.inner.insert(base);
        } else if let Some(access) = Access::extract(addr, self.aliases) {
            self.record(access)?;
            self.inner.insert(base);
        }
        Ok(Action::Continue)
    }

    fn finish_compound(&mut self, addr: &Address) -> VisResult {
        if log::log_enabled!(log::Level::Trace) {
            let here = self
                .found
                .iter()
                .filter(|(a, _)| addr.is_prefix_of(a.address()))
                .map(|(a, _)| a.clone())
                .collect::<Vec<_>>();
            log::trace!("accesses in block {addr}: {}", list_str(&here));
        }
        Ok(Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::access::{DataPath, PathStep};
    use arbor_ir::{Builder, Node, NodeStore};
    use arbor_utils::ErrorKind;

    fn access_at(root: &Node, target: &Node, aliases: &AliasMap) -> Access {
        let addrs = Address::find_all(target, root);
        Access::extract(addrs.last().unwrap(), aliases).unwrap()
    }

    #[test]
    fn aliases_share_a_class() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let ref_int = b.ref_type(b.int_type());
        let a = b.variable(ref_int.clone());
        let c = b.variable(ref_int.clone());
        let d = b.variable(ref_int);
        // { ref<int> a = var(10); ref<int> c = a; ref<int> d = var(5); a; c; d; }
        let block = b.compound([
            b.decl(a.clone(), b.ref_var(b.int_lit(10))),
            b.decl(c.clone(), a.clone()),
            b.decl(d.clone(), b.ref_var(b.int_lit(5))),
            a.clone(),
            c.clone(),
            d.clone(),
        ]);
        let aliases = AliasMap::collect(&store, &block);
        let root = Address::root(block.clone());
        let at = |i: usize| Access::extract(&root.child_address(i).unwrap(), &aliases).unwrap();

        let mut mgr = AccessManager::new(AnalysisConf::default());
        let ca = mgr.get_class_for(&at(3));
        let cc = mgr.get_class_for(&at(4));
        let cd = mgr.get_class_for(&at(5));
        assert!(Rc::ptr_eq(&ca, &cc));
        assert_ne!(*ca.borrow(), *cd.borrow());
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn resubmission_is_idempotent() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let a = b.variable(b.ref_type(b.int_type()));
        let block = b.compound([b.deref(a.clone())]);
        let aliases = AliasMap::new(&store);
        let acc = access_at(&block, &a, &aliases);
        let mut mgr = AccessManager::new(AnalysisConf::default());
        let first = mgr.get_class_for(&acc);
        let second = mgr.get_class_for(&acc);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.borrow().len(), 1);
    }

    #[test]
    fn members_are_told_apart_by_path() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let point = b.struct_type("point", [("x", b.int_type()), ("y", b.int_type())]);
        let p = b.variable(b.ref_type(point));
        let x = b.ref_member(p.clone(), "x", b.int_type());
        let y = b.ref_member(p.clone(), "y", b.int_type());
        let block = b.compound([
            b.assign(x.clone(), b.int_lit(1)),
            b.assign(y.clone(), b.deref(x.clone())),
        ]);
        let aliases = AliasMap::new(&store);
        let mut mgr = AccessManager::new(AnalysisConf::default());
        let found = mgr.classify_block(&Address::root(block), &aliases).unwrap();
        let paths = found.iter().map(|(a, _)| a.path().to_string()).collect::<Vec<_>>();
        assert_eq!(paths, vec![".x", ".y", ".x"]);
        assert_eq!(mgr.len(), 2);
        assert!(Rc::ptr_eq(&found[0].1, &found[2].1));
        assert!(!Rc::ptr_eq(&found[0].1, &found[1].1));
    }

    #[test]
    fn binding_positions_are_not_accesses() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let ref_int = b.ref_type(b.int_type());
        let a = b.variable(ref_int.clone());
        let p = b.variable(ref_int);
        let f = b.lambda([p.clone()], b.int_type(), b.return_stmt(b.deref(p.clone())));
        let block = b.compound([b.decl(a.clone(), b.ref_var(b.int_lit(0))), f]);
        let aliases = AliasMap::collect(&store, &block);
        let mut mgr = AccessManager::new(AnalysisConf::default());
        let found = mgr.classify_block(&Address::root(block), &aliases).unwrap();
        // only the use of `p` inside the lambda body
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.variable(), &p);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let a = b.variable(b.ref_type(b.int_type()));
        let block = b.compound([a.clone(), a.clone()]);
        let root = Address::root(block);
        let first = Access::new(root.child_address(0).unwrap(), a.clone(), VarType::Scalar);
        let mut path = DataPath::default();
        path.push(PathStep::Member("x".into()));
        let second = Access::new(root.child_address(1).unwrap(), a, VarType::Member)
            .with_path(path);

        let mut mgr = AccessManager::new(AnalysisConf::default());
        mgr.get_class_for(&first);
        let err = mgr.try_get_class_for(&second).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AccessKindMismatch { .. }));
    }

    /// `for (i = 0 .. 10) a[i] = a[i + shift]`
    fn shifted_copy(b: &Builder, shift: i64) -> (Node, Node) {
        let a = b.variable(b.ref_type(b.array_type(b.int_type())));
        let i = b.variable(b.int_type());
        let src = b.ref_array_element(a.clone(), b.add(i.clone(), b.int_lit(shift)));
        let dst = b.ref_array_element(a.clone(), i.clone());
        let body = b.assign(dst, b.deref(src));
        let lp = b.for_stmt(i, b.int_lit(0), b.int_lit(10), b.int_lit(1), body);
        (a, b.compound([lp]))
    }

    #[test]
    fn array_ranges_decide_merging() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let aliases = AliasMap::new(&store);

        let (_, disjoint) = shifted_copy(&b, 10);
        let mut mgr = AccessManager::new(AnalysisConf::default());
        let found = mgr.classify_block(&Address::root(disjoint.clone()), &aliases).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(mgr.len(), 2);

        let (_, overlapping) = shifted_copy(&b, 5);
        let mut mgr = AccessManager::new(AnalysisConf::default());
        mgr.classify_block(&Address::root(overlapping), &aliases).unwrap();
        assert_eq!(mgr.len(), 1);

        let conf = AnalysisConf {
            range_merge: false,
            ..AnalysisConf::default()
        };
        let mut mgr = AccessManager::new(conf);
        let err = mgr
            .classify_block(&Address::root(disjoint), &aliases)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    }

    #[test]
    fn descending_loops_are_not_assumed_empty() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let aliases = AliasMap::new(&store);
        // for (i = 10 .. 0 : -1) a[i] = a[i + 10] touches a[1..=20]
        let a = b.variable(b.ref_type(b.array_type(b.int_type())));
        let i = b.variable(b.int_type());
        let src = b.ref_array_element(a.clone(), b.add(i.clone(), b.int_lit(10)));
        let dst = b.ref_array_element(a.clone(), i.clone());
        let body = b.assign(dst, b.deref(src));
        let lp = b.for_stmt(i, b.int_lit(10), b.int_lit(0), b.int_lit(-1), body);
        let block = b.compound([lp]);

        let mut mgr = AccessManager::new(AnalysisConf::default());
        let found = mgr.classify_block(&Address::root(block), &aliases).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(mgr.len(), 1);
        assert!(Rc::ptr_eq(&found[0].1, &found[1].1));
    }

    #[test]
    fn symbolic_ranges_of_different_loops() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let a = b.variable(b.ref_type(b.array_type(b.int_type())));
        let n = b.variable(b.int_type());
        let (i, j) = (b.variable(b.int_type()), b.variable(b.int_type()));
        let write = |it: &Node, v: i64| {
            let body = b.assign(b.ref_array_element(a.clone(), it.clone()), b.int_lit(v));
            b.for_stmt(it.clone(), b.int_lit(0), n.clone(), b.int_lit(1), body)
        };
        let block = b.compound([write(&i, 0), write(&j, 1)]);
        let aliases = AliasMap::new(&store);

        let mut strict = AccessManager::new(AnalysisConf::default());
        strict.classify_block(&Address::root(block.clone()), &aliases).unwrap();
        assert_eq!(strict.len(), 2);

        let conf = AnalysisConf {
            strict_context: false,
            ..AnalysisConf::default()
        };
        let mut relaxed = AccessManager::new(conf);
        relaxed.classify_block(&Address::root(block), &aliases).unwrap();
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed.to_string().lines().count(), 1);
    }
}
