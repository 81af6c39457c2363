use super::constraint::{
    clone_constraint, try_extract_iteration_vector, try_normalize, Constraint,
    ConstraintType,
};
use super::iter_vec::{Element, IterationVector};
use arbor_ir::{ArborResult, Node};
use itertools::Itertools;
use std::collections::HashMap;
use std::rc::Rc;

/// The set of points of an iteration vector satisfying a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationDomain {
    iv: Rc<IterationVector>,
    constraint: Option<Constraint>,
    empty: bool,
}

/// Inclusive bounds of one iterator. `None` stands for unbounded.
pub type Bounds = (Option<i64>, Option<i64>);

impl IterationDomain {
    /// Every point of `iv`.
    pub fn universe(iv: Rc<IterationVector>) -> Self {
        Self {
            iv,
            constraint: None,
            empty: false,
        }
    }

    /// No point at all.
    pub fn empty(iv: Rc<IterationVector>) -> Self {
        Self {
            iv,
            constraint: None,
            empty: true,
        }
    }

    /// The points satisfying `constraint`.
    ///
    /// # Panics
    /// Panics if the leaves of `constraint` use different iteration vectors.
    pub fn new(constraint: Constraint) -> Self {
        let iv = try_extract_iteration_vector(&constraint)
            .unwrap_or_else(|e| panic!("{e}"));
        Self {
            iv,
            constraint: Some(constraint),
            empty: false,
        }
    }

    pub fn iter_vec(&self) -> &Rc<IterationVector> {
        &self.iv
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub fn is_universe(&self) -> bool {
        !self.empty && self.constraint.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// True if the domain depends on parameters.
    pub fn is_symbolic(&self) -> bool {
        self.constraint.as_ref().is_some_and(Constraint::is_symbolic)
    }

    /// This domain over `target`, which must contain every dimension the
    /// constraint depends on.
    pub fn rebase(&self, target: &Rc<IterationVector>) -> Self {
        Self {
            iv: Rc::clone(target),
            constraint: self
                .constraint
                .as_ref()
                .map(|c| clone_constraint(target, c)),
            empty: self.empty,
        }
    }

    /// The points in both domains, over the merge of both vectors.
    pub fn intersect(&self, other: &IterationDomain) -> Self {
        let iv = if self.iv == other.iv {
            Rc::clone(&self.iv)
        } else {
            Rc::new(self.iv.merge(&other.iv))
        };
        if self.empty || other.empty {
            return Self::empty(iv);
        }
        let constraint = match (
            self.rebase(&iv).constraint,
            other.rebase(&iv).constraint,
        ) {
            (Some(a), Some(b)) => Some(a & b),
            (a, b) => a.or(b),
        };
        Self {
            iv,
            constraint,
            empty: false,
        }
    }

    /// True if the point assigned by `env` lies in the domain.
    pub fn contains(&self, env: &HashMap<Node, i64>) -> ArborResult<bool> {
        if self.empty {
            return Ok(false);
        }
        self.constraint.as_ref().map_or(Ok(true), |c| c.evaluate(env))
    }

    /// Box bounds of every iterator implied by the non-symbolic single
    /// iterator leaves of a conjunctive constraint. Anything else leaves the
    /// iterators unbounded, as do leaves whose bound does not fit an `i64`.
    pub fn bounds(&self) -> Vec<Bounds> {
        let mut res: Vec<Bounds> = vec![(None, None); self.iv.num_iters()];
        let Some(c) = &self.constraint else {
            return res;
        };
        let Ok(normal) = try_normalize(c) else {
            return res;
        };
        let Some(leaves) = normal.conjuncts() else {
            return res;
        };
        for leaf in leaves {
            let f = &leaf.func;
            let terms = f
                .terms()
                .filter(|(e, _)| *e != Element::Constant)
                .collect_vec();
            let [(Element::Iter(iter), a)] = terms.as_slice() else {
                continue;
            };
            let Some(idx) = self.iv.index_of(&Element::Iter(iter.clone()))
            else {
                continue;
            };
            let (a, k) = (*a, f.constant_term());
            let (lo, hi) = &mut res[idx];
            match leaf_bounds(leaf.ty, a, k) {
                Some((l, h)) => {
                    l.into_iter().for_each(|l| tighten_lo(lo, l));
                    h.into_iter().for_each(|h| tighten_hi(hi, h));
                }
                None => log::debug!("bound of `{iter}' in {leaf} overflows"),
            }
        }
        res
    }

    /// All points of a non-symbolic domain with bounded iterators, as long
    /// as the bounding box holds at most `limit` points. Parameters are not
    /// part of the points.
    pub fn points(&self, limit: u64) -> Option<Vec<HashMap<Node, i64>>> {
        if self.empty {
            return Some(vec![]);
        }
        if self.is_symbolic() {
            return None;
        }
        let bounds = self.bounds();
        let mut size: u64 = 1;
        let mut ranges = vec![];
        for (lo, hi) in bounds {
            let (lo, hi) = (lo?, hi?);
            if hi < lo {
                return Some(vec![]);
            }
            let len = u64::try_from(hi.checked_sub(lo)?).ok()?.checked_add(1)?;
            size = size.checked_mul(len)?;
            if size > limit {
                return None;
            }
            ranges.push(lo..=hi);
        }
        let iters = self.iv.iters().cloned().collect_vec();
        if iters.is_empty() {
            let env = HashMap::new();
            return Some(if self.contains(&env).ok()? { vec![env] } else { vec![] });
        }
        let mut res = vec![];
        for point in ranges.into_iter().multi_cartesian_product() {
            let env: HashMap<Node, i64> =
                iters.iter().cloned().zip(point).collect();
            if self.contains(&env).ok()? {
                res.push(env);
            }
        }
        Some(res)
    }

    /// False only if the domains are shown to be disjoint. Symbolic domains
    /// and domains with unbounded iterators are assumed to intersect.
    pub fn may_intersect(&self, other: &IterationDomain, limit: u64) -> bool {
        let both = self.intersect(other);
        if both.is_empty() {
            return false;
        }
        if both.is_symbolic() {
            return true;
        }
        let disjoint_box = both
            .bounds()
            .iter()
            .any(|(lo, hi)| matches!((lo, hi), (Some(l), Some(h)) if h < l));
        if disjoint_box {
            return false;
        }
        both.points(limit).is_none_or(|pts| !pts.is_empty())
    }
}

/// Bounds on `i` implied by `a*i + k` in relation `ty` to zero, with `a`
/// nonzero. `None` if a bound does not fit an `i64`.
fn leaf_bounds(ty: ConstraintType, a: i64, k: i64) -> Option<Bounds> {
    Some(match ty {
        // i >= ceil(-k / a)
        ConstraintType::Ge if a > 0 => {
            let neg_k = k.checked_neg()?;
            let q = neg_k.div_euclid(a);
            (Some(q.checked_add(i64::from(neg_k.rem_euclid(a) != 0))?), None)
        }
        // i <= floor(k / -a)
        ConstraintType::Ge => (None, Some(k.div_euclid(a.checked_neg()?))),
        ConstraintType::Eq if k.checked_rem(a)? == 0 => {
            let v = k.checked_neg()?.checked_div(a)?;
            (Some(v), Some(v))
        }
        // no integer solution
        ConstraintType::Eq => (Some(1), Some(0)),
        _ => (None, None),
    })
}

fn tighten_lo(lo: &mut Option<i64>, v: i64) {
    *lo = Some(lo.map_or(v, |l| l.max(v)));
}

fn tighten_hi(hi: &mut Option<i64>, v: i64) {
    *hi = Some(hi.map_or(v, |h| h.min(v)));
}

impl std::fmt::Display for IterationDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.constraint, self.empty) {
            (_, true) => write!(f, "{{}}"),
            (None, false) => write!(f, "{{universe over {}}}", self.iv),
            (Some(c), false) => write!(f, "{{{} | {c}}}", self.iv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::polyhedral::AffineFunction;
    use arbor_ir::{Builder, NodeStore};

    /// lo <= i < hi over `iv`
    fn range(iv: &Rc<IterationVector>, lo: i64, hi: i64) -> Constraint {
        let lower = AffineFunction::from_coeffs(Rc::clone(iv), vec![1, -lo]);
        let upper = AffineFunction::from_coeffs(Rc::clone(iv), vec![1, -hi]);
        Constraint::raw(lower, ConstraintType::Ge)
            & Constraint::raw(upper, ConstraintType::Lt)
    }

    #[test]
    fn box_bounds() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let i = b.variable(b.int_type());
        let iv = Rc::new(IterationVector::new([i.clone()], []));
        let d = IterationDomain::new(range(&iv, 2, 10));
        assert_eq!(d.bounds(), vec![(Some(2), Some(9))]);
        assert_eq!(d.points(100).unwrap().len(), 8);
        assert!(d.points(4).is_none());
        let env = HashMap::from([(i, 10)]);
        assert!(!d.contains(&env).unwrap());
    }

    #[test]
    fn extreme_bounds_stay_unbounded() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let i = b.variable(b.int_type());
        let iv = Rc::new(IterationVector::new([i], []));
        let leaf = |coeffs: Vec<i64>, ty| {
            Constraint::raw(AffineFunction::from_coeffs(Rc::clone(&iv), coeffs), ty)
        };
        // i + MIN >= 0 needs i >= 2^63
        let d = IterationDomain::new(
            leaf(vec![1, i64::MIN], ConstraintType::Ge) & leaf(vec![1, -5], ConstraintType::Lt),
        );
        assert_eq!(d.bounds(), vec![(None, Some(4))]);
        // -i + MIN < 0 cannot be negated
        let d = IterationDomain::new(leaf(vec![-1, i64::MIN], ConstraintType::Lt));
        assert_eq!(d.bounds(), vec![(None, None)]);
        // MIN + 1 <= i <= MAX has too many points to count
        let d = IterationDomain::new(
            leaf(vec![1, i64::MAX], ConstraintType::Ge) & leaf(vec![-1, i64::MAX], ConstraintType::Ge),
        );
        assert_eq!(d.bounds(), vec![(Some(i64::MIN + 1), Some(i64::MAX))]);
        assert!(d.points(u64::MAX).is_none());
    }

    #[test]
    fn intersection_tests() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let i = b.variable(b.int_type());
        let iv = Rc::new(IterationVector::new([i], []));
        let low = IterationDomain::new(range(&iv, 0, 5));
        let high = IterationDomain::new(range(&iv, 5, 10));
        let mid = IterationDomain::new(range(&iv, 3, 7));
        assert!(!low.may_intersect(&high, 64));
        assert!(low.may_intersect(&mid, 64));
        assert!(high.may_intersect(&mid, 0));
        assert!(!low.may_intersect(&IterationDomain::empty(Rc::clone(&iv)), 64));
        assert!(low.may_intersect(&IterationDomain::universe(iv), 64));
    }

    #[test]
    fn symbolic_domains_may_intersect() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let i = b.variable(b.int_type());
        let n = b.variable(b.int_type());
        let iv = Rc::new(IterationVector::new([i], [n]));
        // i - n >= 0 and i < 0 are disjoint only for n >= 0
        let a = IterationDomain::new(Constraint::raw(
            AffineFunction::from_coeffs(Rc::clone(&iv), vec![1, -1, 0]),
            ConstraintType::Ge,
        ));
        let c = IterationDomain::new(Constraint::raw(
            AffineFunction::from_coeffs(Rc::clone(&iv), vec![1, 0, 0]),
            ConstraintType::Lt,
        ));
        assert!(a.is_symbolic());
        assert!(a.may_intersect(&c, 64));
    }
}
