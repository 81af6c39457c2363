use super::alias::AliasMap;
use crate::analysis::polyhedral::{scop, AffineFunction, IterationDomain};
use arbor_ir::{Address, BasicOp, Id, LangBasic, Node, NodeKind};
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::HashSet;

/// How the storage behind a variable is structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Scalar,
    Member,
    Tuple,
    Array,
}

impl VarType {
    /// The kind of storage a reference variable points to; `None` for
    /// variables that are not references.
    pub fn of_variable(basic: &LangBasic, var: &Node) -> Option<VarType> {
        let elem = basic.ref_element_type(var.expr_type())?;
        Some(match elem.kind() {
            NodeKind::StructType => VarType::Member,
            NodeKind::TupleType => VarType::Tuple,
            _ if basic.is_array_type(elem) => VarType::Array,
            _ => VarType::Scalar,
        })
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VarType::Scalar => "scalar",
            VarType::Member => "member",
            VarType::Tuple => "tuple",
            VarType::Array => "array",
        };
        write!(f, "{s}")
    }
}

/// One navigation step below a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStep {
    Member(Id),
    Component(u64),
    /// Some element of an array; the index is described by the range of the
    /// access.
    Element,
}

/// The steps leading from a variable to the accessed part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DataPath(SmallVec<[PathStep; 4]>);

impl DataPath {
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has_element(&self) -> bool {
        self.0.contains(&PathStep::Element)
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for step in &self.0 {
            match step {
                PathStep::Member(m) => write!(f, ".{m}")?,
                PathStep::Component(c) => write!(f, ".{c}")?,
                PathStep::Element => write!(f, "[]")?,
            }
        }
        Ok(())
    }
}

/// The indices an array access touches: `index` evaluated at every point of
/// `domain`. Both share one iteration vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRange {
    pub domain: IterationDomain,
    pub index: AffineFunction,
}

impl AccessRange {
    /// The range of `idx` used at `addr`; `None` if the index is not affine.
    fn at(addr: &Address, idx: &Node) -> Option<AccessRange> {
        let domain = scop::loop_domain_over(addr, std::slice::from_ref(idx));
        match AffineFunction::from_expr(domain.iter_vec().clone(), idx) {
            Ok(index) => Some(AccessRange { domain, index }),
            Err(e) => {
                log::debug!("no range for index {idx}: {e}");
                None
            }
        }
    }

    pub fn is_symbolic(&self) -> bool {
        self.domain.is_symbolic() || self.index.is_symbolic()
    }

    /// Every index value, if the domain has at most `limit` points.
    pub fn values(&self, limit: u64) -> Option<HashSet<i64>> {
        if self.index.is_symbolic() {
            return None;
        }
        self.domain
            .points(limit)?
            .iter()
            .map(|p| self.index.evaluate(p).ok())
            .collect()
    }

    /// Inclusive bounds of the index values derived from the box bounds of
    /// the domain. `None` stands for unbounded.
    pub fn interval(&self) -> (Option<i64>, Option<i64>) {
        if self.index.is_symbolic() {
            return (None, None);
        }
        if self.domain.is_empty() {
            return (Some(1), Some(0));
        }
        let bounds = self.domain.bounds();
        let k = self.index.constant_term();
        let (mut lo, mut hi) = (Some(k), Some(k));
        for ((l, h), c) in bounds.iter().zip(self.index.coeffs()) {
            if *c == 0 {
                continue;
            }
            let (min, max) = if *c > 0 { (l, h) } else { (h, l) };
            lo = lo
                .zip(*min)
                .and_then(|(acc, v)| c.checked_mul(v)?.checked_add(acc));
            hi = hi
                .zip(*max)
                .and_then(|(acc, v)| c.checked_mul(v)?.checked_add(acc));
        }
        (lo, hi)
    }

    /// False only if no index value of `self` is shown to be an index value
    /// of `other`.
    pub fn may_overlap(&self, other: &AccessRange, limit: u64) -> bool {
        if self.is_symbolic() || other.is_symbolic() {
            return true;
        }
        if let (Some(a), Some(b)) = (self.values(limit), other.values(limit)) {
            return !a.is_disjoint(&b);
        }
        let ((l1, h1), (l2, h2)) = (self.interval(), other.interval());
        let below = |h: Option<i64>, l: Option<i64>| matches!((h, l), (Some(h), Some(l)) if h < l);
        !(below(h1, l1) || below(h2, l2) || below(h1, l2) || below(h2, l1))
    }
}

impl std::fmt::Display for AccessRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] over {}", self.index, self.domain)
    }
}

/// One expression accessing memory through a reference variable.
///
/// Accesses are identified by their address: the same expression at two
/// places of a program makes two accesses.
#[derive(Debug, Clone)]
pub struct Access {
    address: Address,
    variable: Node,
    path: DataPath,
    kind: VarType,
    range: Option<AccessRange>,
    context: Address,
}

impl Access {
    /// An access to all of `variable` at `address`. The context is the
    /// outermost loop enclosing the address, or its root.
    pub fn new(address: Address, variable: Node, kind: VarType) -> Self {
        let context = scop::scop_root(&address).unwrap_or_else(|| address.root_address());
        Self {
            address,
            variable,
            path: DataPath::default(),
            kind,
            range: None,
            context,
        }
    }

    pub fn with_path(mut self, path: DataPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_range(mut self, range: Option<AccessRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_context(mut self, context: Address) -> Self {
        self.context = context;
        self
    }

    /// The access performed by the expression at `addr`, if any.
    ///
    /// Reference variables are accesses; member, component and element
    /// navigations extend the access of their base. Variables are replaced
    /// by what they alias according to `aliases`.
    pub fn extract(addr: &Address, aliases: &AliasMap) -> Option<Access> {
        let node = addr.as_node();
        let basic = aliases.basic();
        match node.kind() {
            NodeKind::Variable => {
                let var = aliases.resolve(node);
                let kind = VarType::of_variable(basic, &var)?;
                Some(Access::new(addr.clone(), var, kind))
            }
            NodeKind::CallExpr => {
                let op = basic.called_op(node).filter(|op| op.is_ref_navigation())?;
                let base = Access::extract(&addr.child_address(2).ok()?, aliases)?;
                let arg = node.call_args().get(1)?;
                let mut path = base.path;
                let mut range = base.range;
                match op {
                    BasicOp::RefMemberAccess => {
                        path.push(PathStep::Member(arg.name()?));
                    }
                    BasicOp::RefComponentAccess => {
                        let idx = arg.name()?.as_str().parse().ok()?;
                        path.push(PathStep::Component(idx));
                    }
                    _ => {
                        // only the outermost array dimension gets a range
                        range = if path.has_element() {
                            None
                        } else {
                            AccessRange::at(addr, arg)
                        };
                        path.push(PathStep::Element);
                    }
                }
                Some(Access {
                    address: addr.clone(),
                    path,
                    range,
                    ..base
                })
            }
            _ => None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The accessed variable with aliases resolved.
    pub fn variable(&self) -> &Node {
        &self.variable
    }

    pub fn path(&self) -> &DataPath {
        &self.path
    }

    pub fn kind(&self) -> VarType {
        self.kind
    }

    pub fn range(&self) -> Option<&AccessRange> {
        self.range.as_ref()
    }

    /// The region the range of this access is valid in.
    pub fn context(&self) -> &Address {
        &self.context
    }
}

impl PartialEq for Access {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Access {}

impl std::hash::Hash for Access {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}@{}", self.variable, self.path, self.address)?;
        if let Some(r) = &self.range {
            write!(f, " {}", r.index)?;
        }
        Ok(())
    }
}

/// Accesses in `accs` in a compact form for log output.
pub(super) fn list_str(accs: &[Access]) -> String {
    accs.iter().map(|a| a.to_string()).join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_ir::{Builder, NodeStore};

    #[test]
    fn variable_kinds() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let basic = store.lang_basic();
        let scalar = b.variable(b.ref_type(b.int_type()));
        let tuple = b.variable(b.ref_type(b.tuple_type([b.int_type(), b.bool_type()])));
        let point = b.struct_type("point", [("x", b.int_type()), ("y", b.int_type())]);
        let member = b.variable(b.ref_type(point));
        let array = b.variable(b.ref_type(b.array_type(b.int_type())));
        let plain = b.variable(b.int_type());
        assert_eq!(VarType::of_variable(&basic, &scalar), Some(VarType::Scalar));
        assert_eq!(VarType::of_variable(&basic, &tuple), Some(VarType::Tuple));
        assert_eq!(VarType::of_variable(&basic, &member), Some(VarType::Member));
        assert_eq!(VarType::of_variable(&basic, &array), Some(VarType::Array));
        assert_eq!(VarType::of_variable(&basic, &plain), None);
    }

    #[test]
    fn navigation_builds_data_paths() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let point = b.struct_type("point", [("x", b.int_type()), ("y", b.int_type())]);
        let arr = b.variable(b.ref_type(b.array_type(point)));
        let i = b.variable(b.int_type());
        let elem = b.ref_array_element(arr.clone(), i.clone());
        let x = b.ref_member(elem, "x", b.int_type());
        let body = b.assign(x.clone(), b.int_lit(0));
        let root = b.for_stmt(i.clone(), b.int_lit(0), b.int_lit(8), b.int_lit(1), body);

        let aliases = AliasMap::new(&store);
        let addr = Address::find_first(&x, &root).unwrap();
        let acc = Access::extract(&addr, &aliases).unwrap();
        assert_eq!(acc.variable(), &arr);
        assert_eq!(acc.kind(), VarType::Array);
        assert_eq!(acc.path().to_string(), "[].x");
        assert_eq!(acc.context(), &Address::root(root.clone()));
        let range = acc.range().unwrap();
        assert!(!range.is_symbolic());
        assert_eq!(range.interval(), (Some(0), Some(7)));
        assert_eq!(range.values(64).unwrap().len(), 8);

        // the index variable is an int, not a reference
        let idx = Address::find_first(&i, &root).unwrap();
        assert!(Access::extract(&idx, &aliases).is_none());
    }

    #[test]
    fn navigations_missing_an_argument_are_not_accesses() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let point = b.struct_type("point", [("x", b.int_type())]);
        let p = b.variable(b.ref_type(point));
        let member = store.lang_basic().op(BasicOp::RefMemberAccess).clone();
        let short = b.call(b.ref_type(b.int_type()), member, [p.clone()]);
        let root = b.compound([short.clone()]);
        let aliases = AliasMap::new(&store);
        let addr = Address::find_first(&short, &root).unwrap();
        assert!(Access::extract(&addr, &aliases).is_none());
        // the base itself is still an access
        let base = Address::find_first(&p, &root).unwrap();
        assert_eq!(Access::extract(&base, &aliases).unwrap().variable(), &p);
    }

    #[test]
    fn shifted_ranges() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let arr = b.variable(b.ref_type(b.array_type(b.int_type())));
        let i = b.variable(b.int_type());
        let lo = b.ref_array_element(arr.clone(), i.clone());
        let hi = b.ref_array_element(arr.clone(), b.add(i.clone(), b.int_lit(10)));
        let body = b.compound([b.assign(lo.clone(), b.deref(hi.clone()))]);
        let root = b.for_stmt(i, b.int_lit(0), b.int_lit(10), b.int_lit(1), body);
        let aliases = AliasMap::new(&store);
        let get = |n: &Node| {
            let addr = Address::find_first(n, &root).unwrap();
            Access::extract(&addr, &aliases).unwrap()
        };
        let (lo, hi) = (get(&lo), get(&hi));
        let (rl, rh) = (lo.range().unwrap(), hi.range().unwrap());
        assert!(!rl.may_overlap(rh, 64));
        // the interval test agrees when enumeration is not allowed
        assert!(!rl.may_overlap(rh, 0));
        assert!(rl.may_overlap(rl, 64));
    }
}
