use super::affine::{AffineFunction, LinearForm};
use super::iter_vec::{Element, IterationVector};
use arbor_ir::{ArborResult, BasicOp, Builder, Error, Node, NodeKind};
use std::collections::HashMap;
use std::ops::{BitAnd, BitOr, Not};
use std::rc::Rc;

/// Relation between an affine function and zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ConstraintType {
    /// Applies the relation to `lhs` and `rhs`.
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            ConstraintType::Eq => lhs == rhs,
            ConstraintType::Ne => lhs != rhs,
            ConstraintType::Lt => lhs < rhs,
            ConstraintType::Le => lhs <= rhs,
            ConstraintType::Gt => lhs > rhs,
            ConstraintType::Ge => lhs >= rhs,
        }
    }

    /// The IR comparison implementing this relation.
    pub fn op(self) -> BasicOp {
        match self {
            ConstraintType::Eq => BasicOp::IntEq,
            ConstraintType::Ne => BasicOp::IntNe,
            ConstraintType::Lt => BasicOp::IntLt,
            ConstraintType::Le => BasicOp::IntLe,
            ConstraintType::Gt => BasicOp::IntGt,
            ConstraintType::Ge => BasicOp::IntGe,
        }
    }

    pub fn from_op(op: BasicOp) -> Option<Self> {
        Some(match op {
            BasicOp::IntEq => ConstraintType::Eq,
            BasicOp::IntNe => ConstraintType::Ne,
            BasicOp::IntLt => ConstraintType::Lt,
            BasicOp::IntLe => ConstraintType::Le,
            BasicOp::IntGt => ConstraintType::Gt,
            BasicOp::IntGe => ConstraintType::Ge,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintType::Eq => "==",
            ConstraintType::Ne => "!=",
            ConstraintType::Lt => "<",
            ConstraintType::Le => "<=",
            ConstraintType::Gt => ">",
            ConstraintType::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// `func <ty> 0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffineConstraint {
    pub func: AffineFunction,
    pub ty: ConstraintType,
}

impl AffineConstraint {
    pub fn new(func: AffineFunction, ty: ConstraintType) -> Self {
        Self { func, ty }
    }

    pub fn evaluate(&self, env: &HashMap<Node, i64>) -> ArborResult<bool> {
        Ok(self.ty.holds(self.func.evaluate(env)?, 0))
    }
}

impl std::fmt::Display for AffineConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} 0", self.func, self.ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
}

/// A boolean combination of affine constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Raw(AffineConstraint),
    Neg(Box<Constraint>),
    Bin(BinaryOp, Box<Constraint>, Box<Constraint>),
}

impl From<AffineConstraint> for Constraint {
    fn from(c: AffineConstraint) -> Self {
        Constraint::Raw(c)
    }
}

impl BitAnd for Constraint {
    type Output = Constraint;

    fn bitand(self, rhs: Self) -> Self::Output {
        Constraint::Bin(BinaryOp::And, Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Constraint {
    type Output = Constraint;

    fn bitor(self, rhs: Self) -> Self::Output {
        Constraint::Bin(BinaryOp::Or, Box::new(self), Box::new(rhs))
    }
}

impl Not for Constraint {
    type Output = Constraint;

    fn not(self) -> Self::Output {
        Constraint::Neg(Box::new(self))
    }
}

/// Recursive dispatch over the three shapes of a [Constraint].
pub trait ConstraintVisitor {
    type Output;

    fn visit_raw(&mut self, c: &AffineConstraint) -> Self::Output;

    fn visit_neg(&mut self, sub: &Constraint) -> Self::Output;

    fn visit_bin(
        &mut self,
        op: BinaryOp,
        lhs: &Constraint,
        rhs: &Constraint,
    ) -> Self::Output;

    fn visit(&mut self, c: &Constraint) -> Self::Output {
        match c {
            Constraint::Raw(raw) => self.visit_raw(raw),
            Constraint::Neg(sub) => self.visit_neg(sub),
            Constraint::Bin(op, lhs, rhs) => self.visit_bin(*op, lhs, rhs),
        }
    }
}

impl Constraint {
    /// `func <ty> 0`
    pub fn raw(func: AffineFunction, ty: ConstraintType) -> Self {
        Constraint::Raw(AffineConstraint::new(func, ty))
    }

    /// Applies `f` to every leaf and keeps the structure of the tree.
    pub fn try_map_raw<F>(&self, f: &mut F) -> ArborResult<Constraint>
    where
        F: FnMut(&AffineConstraint) -> ArborResult<Constraint>,
    {
        Ok(match self {
            Constraint::Raw(raw) => f(raw)?,
            Constraint::Neg(sub) => !sub.try_map_raw(f)?,
            Constraint::Bin(op, lhs, rhs) => Constraint::Bin(
                *op,
                Box::new(lhs.try_map_raw(f)?),
                Box::new(rhs.try_map_raw(f)?),
            ),
        })
    }

    /// All leaves from left to right.
    pub fn leaves(&self) -> Vec<&AffineConstraint> {
        let mut res = vec![];
        let mut stack = vec![self];
        while let Some(c) = stack.pop() {
            match c {
                Constraint::Raw(raw) => res.push(raw),
                Constraint::Neg(sub) => stack.push(sub),
                Constraint::Bin(_, lhs, rhs) => {
                    stack.push(rhs);
                    stack.push(lhs);
                }
            }
        }
        res
    }

    /// The leaves of a conjunction of leaves; `None` if the tree contains
    /// negations or disjunctions.
    pub fn conjuncts(&self) -> Option<Vec<&AffineConstraint>> {
        match self {
            Constraint::Raw(raw) => Some(vec![raw]),
            Constraint::Bin(BinaryOp::And, lhs, rhs) => {
                let mut res = lhs.conjuncts()?;
                res.extend(rhs.conjuncts()?);
                Some(res)
            }
            _ => None,
        }
    }

    /// True if some leaf depends on a parameter.
    pub fn is_symbolic(&self) -> bool {
        self.leaves().iter().any(|l| l.func.is_symbolic())
    }

    pub fn evaluate(&self, env: &HashMap<Node, i64>) -> ArborResult<bool> {
        Evaluator { env }.visit(self)
    }

    /// Interprets the boolean expression `expr` over `iv`. Comparisons of
    /// affine integer expressions become leaves, logic operators become
    /// inner nodes, boolean literals become trivial leaves.
    pub fn from_expr_in(iv: &Rc<IterationVector>, expr: &Node) -> ArborResult<Self> {
        let not_affine = || Error::not_affine(format!("{expr}"));
        if expr.kind() == NodeKind::Literal {
            let zero = AffineFunction::new(Rc::clone(iv));
            return match expr.name().map(|n| n.as_str()) {
                Some("true") => Ok(Constraint::raw(zero, ConstraintType::Eq)),
                Some("false") => Ok(Constraint::raw(zero, ConstraintType::Ne)),
                _ => Err(not_affine()),
            };
        }
        let (op, args) = BasicOp::of_call(expr).ok_or_else(not_affine)?;
        if let Some(ty) = ConstraintType::from_op(op) {
            let lhs = AffineFunction::from_expr(Rc::clone(iv), &args[0])?;
            let rhs = AffineFunction::from_expr(Rc::clone(iv), &args[1])?;
            let diff = lhs.try_sub(&rhs).map_err(|_| not_affine())?;
            return Ok(Constraint::raw(diff, ty));
        }
        match op {
            BasicOp::BoolAnd => Ok(Self::from_expr_in(iv, &args[0])?
                & Self::from_expr_in(iv, &args[1])?),
            BasicOp::BoolOr => Ok(Self::from_expr_in(iv, &args[0])?
                | Self::from_expr_in(iv, &args[1])?),
            BasicOp::BoolNot => Ok(!Self::from_expr_in(iv, &args[0])?),
            _ => Err(not_affine()),
        }
    }

    /// Like [Constraint::from_expr_in] over a fresh iteration vector with
    /// `iters` as iterators and every other value as a parameter.
    pub fn from_expr(iters: &[Node], expr: &Node) -> ArborResult<Self> {
        let mut iv = IterationVector::new(iters.iter().cloned(), []);
        collect_atoms(expr, &mut |atom| {
            iv.add_param(atom.clone());
        })?;
        Self::from_expr_in(&Rc::new(iv), expr)
    }
}

/// Calls `f` for every atom of the integer expressions compared in `expr`.
fn collect_atoms<F: FnMut(&Node)>(expr: &Node, f: &mut F) -> ArborResult<()> {
    if let Some((op, args)) = BasicOp::of_call(expr) {
        if ConstraintType::from_op(op).is_some() {
            for arg in args {
                LinearForm::parse(arg)?.atoms().for_each(&mut *f);
            }
            return Ok(());
        }
        if op.is_logic() {
            for arg in args {
                collect_atoms(arg, f)?;
            }
        }
    }
    Ok(())
}

struct Evaluator<'a> {
    env: &'a HashMap<Node, i64>,
}

impl ConstraintVisitor for Evaluator<'_> {
    type Output = ArborResult<bool>;

    fn visit_raw(&mut self, c: &AffineConstraint) -> Self::Output {
        c.evaluate(self.env)
    }

    fn visit_neg(&mut self, sub: &Constraint) -> Self::Output {
        Ok(!self.visit(sub)?)
    }

    fn visit_bin(
        &mut self,
        op: BinaryOp,
        lhs: &Constraint,
        rhs: &Constraint,
    ) -> Self::Output {
        let l = self.visit(lhs)?;
        Ok(match op {
            BinaryOp::And => l && self.visit(rhs)?,
            BinaryOp::Or => l || self.visit(rhs)?,
        })
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Raw(raw) => write!(f, "({raw})"),
            Constraint::Neg(sub) => write!(f, "!{sub}"),
            Constraint::Bin(BinaryOp::And, lhs, rhs) => {
                write!(f, "({lhs} ^ {rhs})")
            }
            Constraint::Bin(BinaryOp::Or, lhs, rhs) => {
                write!(f, "({lhs} v {rhs})")
            }
        }
    }
}

/// Rewrites every relation into `== 0` or `>= 0`, negating equalities for
/// `!=`. Strict inequalities over integers are tightened by one.
///
/// # Panics
/// Panics if a rewritten coefficient overflows.
pub fn normalize(c: &Constraint) -> Constraint {
    try_normalize(c).unwrap_or_else(|e| panic!("{e}"))
}

pub fn try_normalize(c: &Constraint) -> ArborResult<Constraint> {
    c.try_map_raw(&mut |raw| {
        let f = &raw.func;
        let one = AffineFunction::constant(Rc::clone(f.iter_vec()), 1);
        Ok(match raw.ty {
            ConstraintType::Eq | ConstraintType::Ge => Constraint::Raw(raw.clone()),
            ConstraintType::Ne => !Constraint::raw(f.clone(), ConstraintType::Eq),
            // f > 0  <=>  f - 1 >= 0
            ConstraintType::Gt => Constraint::raw(f.try_sub(&one)?, ConstraintType::Ge),
            // f <= 0  <=>  -f >= 0
            ConstraintType::Le => Constraint::raw(f.try_neg()?, ConstraintType::Ge),
            // f < 0  <=>  -f - 1 >= 0
            ConstraintType::Lt => {
                Constraint::raw(f.try_neg()?.try_sub(&one)?, ConstraintType::Ge)
            }
        })
    })
}

/// Returns the iteration vector shared by all leaves of `c`.
///
/// # Panics
/// Panics if two leaves use different iteration vectors.
pub fn extract_iteration_vector(c: &Constraint) -> Rc<IterationVector> {
    try_extract_iteration_vector(c).unwrap_or_else(|e| panic!("{e}"))
}

pub fn try_extract_iteration_vector(
    c: &Constraint,
) -> ArborResult<Rc<IterationVector>> {
    let leaves = c.leaves();
    let first = Rc::clone(leaves[0].func.iter_vec());
    for leaf in &leaves[1..] {
        let iv = leaf.func.iter_vec();
        if !Rc::ptr_eq(iv, &first) && **iv != *first {
            return Err(Error::iter_vec_mismatch(format!(
                "constraint {c} mixes {first} and {iv}"
            )));
        }
    }
    Ok(first)
}

/// Rewrites `c` over `target`. All leaves must share one iteration vector,
/// every dimension with a nonzero coefficient must exist in `target`.
///
/// # Panics
/// Panics if the preconditions are violated.
pub fn clone_constraint(target: &Rc<IterationVector>, c: &Constraint) -> Constraint {
    try_clone_constraint(target, c).unwrap_or_else(|e| panic!("{e}"))
}

pub fn try_clone_constraint(
    target: &Rc<IterationVector>,
    c: &Constraint,
) -> ArborResult<Constraint> {
    let source = try_extract_iteration_vector(c)?;
    if Rc::ptr_eq(&source, target) {
        return Ok(c.clone());
    }
    // computed once for all leaves
    let translation = source.translation_to(target);
    c.try_map_raw(&mut |raw| {
        Ok(Constraint::raw(raw.func.rebase(target, &translation)?, raw.ty))
    })
}

/// Converts `c` into a boolean IR expression.
///
/// # Panics
/// Panics if the produced expression is not boolean.
pub fn to_ir(b: &Builder, c: &Constraint) -> Node {
    let res = ToIr { b }.visit(c);
    assert!(
        b.basic().is_bool(res.expr_type()),
        "constraint {c} converted to non-boolean expression {res}"
    );
    res
}

struct ToIr<'a, 'b> {
    b: &'a Builder<'b>,
}

impl ConstraintVisitor for ToIr<'_, '_> {
    type Output = Node;

    fn visit_raw(&mut self, c: &AffineConstraint) -> Node {
        let lhs = c.func.to_expr(self.b);
        self.b.call_op(c.ty.op(), [lhs, self.b.int_lit(0)])
    }

    fn visit_neg(&mut self, sub: &Constraint) -> Node {
        let sub = self.visit(sub);
        self.b.not(sub)
    }

    fn visit_bin(&mut self, op: BinaryOp, lhs: &Constraint, rhs: &Constraint) -> Node {
        let (l, r) = (self.visit(lhs), self.visit(rhs));
        match op {
            BinaryOp::And => self.b.and(l, r),
            BinaryOp::Or => self.b.or(l, r),
        }
    }
}

/// Substitutes `dst` for `src` in every leaf: the coefficient of `src` is
/// added to the one of `dst` and cleared. Used when a value is renamed.
///
/// # Panics
/// Panics if some leaf has no nonzero coefficient for `src`, or `dst` is not
/// a dimension of its iteration vector.
pub fn copy_from_constraint(c: &Constraint, src: &Element, dst: &Element) -> Constraint {
    try_copy_from_constraint(c, src, dst).unwrap_or_else(|e| panic!("{e}"))
}

pub fn try_copy_from_constraint(
    c: &Constraint,
    src: &Element,
    dst: &Element,
) -> ArborResult<Constraint> {
    c.try_map_raw(&mut |raw| {
        let coeff = raw.func.coeff(src);
        if coeff == 0 {
            return Err(Error::iter_vec_mismatch(format!(
                "`{src}' does not occur in {raw}"
            )));
        }
        let mut func = raw.func.clone();
        func.try_set_coeff(dst, func.coeff(dst) + coeff)?;
        func.try_set_coeff(src, 0)?;
        Ok(Constraint::raw(func, raw.ty))
    })
}
