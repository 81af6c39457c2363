use super::iter_vec::{Element, IterationVector};
use arbor_ir::{ArborResult, BasicOp, Builder, Error, Node, NodeKind};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::ops::{Add, Mul, Neg, Sub};
use std::rc::Rc;

/// A linear combination of the dimensions of an iteration vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffineFunction {
    iv: Rc<IterationVector>,
    coeffs: Vec<i64>,
}

impl AffineFunction {
    /// The zero function over `iv`.
    pub fn new(iv: Rc<IterationVector>) -> Self {
        let coeffs = vec![0; iv.size()];
        Self { iv, coeffs }
    }

    /// # Panics
    /// Panics unless there is one coefficient per dimension of `iv`.
    pub fn from_coeffs(iv: Rc<IterationVector>, coeffs: Vec<i64>) -> Self {
        assert_eq!(
            iv.size(),
            coeffs.len(),
            "{} coefficients for iteration vector {iv}",
            coeffs.len()
        );
        Self { iv, coeffs }
    }

    /// The constant function `c` over `iv`.
    pub fn constant(iv: Rc<IterationVector>, c: i64) -> Self {
        let mut res = Self::new(iv);
        let idx = res.iv.constant_index();
        res.coeffs[idx] = c;
        res
    }

    pub fn iter_vec(&self) -> &Rc<IterationVector> {
        &self.iv
    }

    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }

    /// The coefficient of `elem`; zero for dimensions not in the vector.
    pub fn coeff(&self, elem: &Element) -> i64 {
        self.iv.index_of(elem).map_or(0, |idx| self.coeffs[idx])
    }

    pub fn constant_term(&self) -> i64 {
        self.coeffs[self.iv.constant_index()]
    }

    /// # Panics
    /// Panics if `elem` is not a dimension of the iteration vector.
    pub fn set_coeff(&mut self, elem: &Element, c: i64) {
        self.try_set_coeff(elem, c).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_set_coeff(&mut self, elem: &Element, c: i64) -> ArborResult<()> {
        let idx = self.iv.index_of(elem).ok_or_else(|| {
            Error::iter_vec_mismatch(format!(
                "`{elem}' is not part of {}",
                self.iv
            ))
        })?;
        self.coeffs[idx] = c;
        Ok(())
    }

    /// True if no iterator or parameter has a nonzero coefficient.
    pub fn is_constant(&self) -> bool {
        let c = self.iv.constant_index();
        self.coeffs[..c].iter().all(|x| *x == 0)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|x| *x == 0)
    }

    /// True if some parameter has a nonzero coefficient.
    pub fn is_symbolic(&self) -> bool {
        let first = self.iv.num_iters();
        self.coeffs[first..self.iv.constant_index()]
            .iter()
            .any(|x| *x != 0)
    }

    /// Nonzero coefficients together with their dimension.
    pub fn terms(&self) -> impl Iterator<Item = (Element, i64)> + '_ {
        self.iv
            .elements()
            .zip(self.coeffs.iter().copied())
            .filter(|(_, c)| *c != 0)
    }

    /// Evaluates the function with the iterators and parameters taking their
    /// value from `env`.
    pub fn evaluate(&self, env: &HashMap<Node, i64>) -> ArborResult<i64> {
        let mut res: i64 = 0;
        for (elem, c) in self.terms() {
            let v = match &elem {
                Element::Iter(n) | Element::Param(n) => *env.get(n).ok_or_else(
                    || Error::misc(format!("no value for `{elem}'")),
                )?,
                Element::Constant => 1,
            };
            res = c
                .checked_mul(v)
                .and_then(|t| res.checked_add(t))
                .ok_or_else(|| Error::misc(format!("overflow evaluating {self}")))?;
        }
        Ok(res)
    }

    /// Interprets the integer expression `expr` over `iv`.
    ///
    /// Fails if the expression is not affine or uses values that are not
    /// dimensions of `iv`.
    pub fn from_expr(iv: Rc<IterationVector>, expr: &Node) -> ArborResult<Self> {
        let form = LinearForm::parse(expr)?;
        let mut res = Self::constant(iv, form.constant);
        for (atom, c) in form.terms {
            let elem = res.iv.element_of(&atom).ok_or_else(|| {
                Error::not_affine(format!(
                    "`{atom}' is not part of {}",
                    res.iv
                ))
            })?;
            let idx = res.iv.index_of(&elem).unwrap_or_default();
            res.coeffs[idx] = res.coeffs[idx]
                .checked_add(c)
                .ok_or_else(|| Error::not_affine(format!("{expr}")))?;
        }
        Ok(res)
    }

    /// Builds the integer expression computing this function.
    pub fn to_expr(&self, b: &Builder) -> Node {
        let mut acc: Option<Node> = None;
        for (elem, c) in self.terms() {
            let (Element::Iter(atom) | Element::Param(atom)) = elem else {
                continue;
            };
            acc = Some(match acc {
                None if c == 1 => atom,
                None => b.mul(b.int_lit(c), atom),
                Some(e) if c == 1 => b.add(e, atom),
                Some(e) if c == -1 => b.sub(e, atom),
                Some(e) => match c.checked_neg() {
                    Some(m) if c < 0 => b.sub(e, b.mul(b.int_lit(m), atom)),
                    _ => b.add(e, b.mul(b.int_lit(c), atom)),
                },
            });
        }
        let k = self.constant_term();
        match acc {
            None => b.int_lit(k),
            Some(e) if k == 0 => e,
            Some(e) => match k.checked_neg() {
                Some(m) if k < 0 => b.sub(e, b.int_lit(m)),
                _ => b.add(e, b.int_lit(k)),
            },
        }
    }

    /// Sum of two functions over the same iteration vector. Fails if a
    /// coefficient overflows.
    pub fn try_add(&self, other: &AffineFunction) -> ArborResult<Self> {
        self.check_compatible(other);
        let coeffs = self
            .coeffs
            .iter()
            .zip(&other.coeffs)
            .map(|(a, b)| a.checked_add(*b))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.overflow(format!("{self} + {other}")))?;
        Ok(Self::from_coeffs(Rc::clone(&self.iv), coeffs))
    }

    pub fn try_sub(&self, other: &AffineFunction) -> ArborResult<Self> {
        self.try_add(&other.try_scale(-1)?)
    }

    pub fn try_neg(&self) -> ArborResult<Self> {
        self.try_scale(-1)
    }

    pub fn try_scale(&self, k: i64) -> ArborResult<Self> {
        let coeffs = self
            .coeffs
            .iter()
            .map(|c| c.checked_mul(k))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.overflow(format!("{k} * ({self})")))?;
        Ok(Self::from_coeffs(Rc::clone(&self.iv), coeffs))
    }

    fn overflow(&self, what: String) -> Error {
        Error::misc(format!("coefficient overflow computing {what}"))
    }

    /// This function over `target`, given the index of every dimension of
    /// the current vector within `target`.
    pub(crate) fn rebase(
        &self,
        target: &Rc<IterationVector>,
        translation: &[Option<usize>],
    ) -> ArborResult<Self> {
        let mut res = Self::new(Rc::clone(target));
        for (idx, c) in self.coeffs.iter().enumerate() {
            if *c == 0 {
                continue;
            }
            match translation.get(idx).copied().flatten() {
                Some(t) => res.coeffs[t] = *c,
                None => {
                    return Err(Error::iter_vec_mismatch(format!(
                        "dimension {idx} of {self} is missing in {target}",
                    )));
                }
            }
        }
        Ok(res)
    }

    fn check_compatible(&self, other: &Self) {
        assert!(
            Rc::ptr_eq(&self.iv, &other.iv) || self.iv == other.iv,
            "combining functions over {} and {}",
            self.iv,
            other.iv
        );
    }
}

// The operators panic where the `try_*` methods report an overflow.

impl Add for &AffineFunction {
    type Output = AffineFunction;

    fn add(self, other: &AffineFunction) -> AffineFunction {
        self.try_add(other).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Sub for &AffineFunction {
    type Output = AffineFunction;

    fn sub(self, other: &AffineFunction) -> AffineFunction {
        self.try_sub(other).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Neg for &AffineFunction {
    type Output = AffineFunction;

    fn neg(self) -> AffineFunction {
        self.try_neg().unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Mul<i64> for &AffineFunction {
    type Output = AffineFunction;

    fn mul(self, k: i64) -> AffineFunction {
        self.try_scale(k).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl std::fmt::Display for AffineFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (elem, c) in self.terms() {
            let sign = if c < 0 { "-" } else { "+" };
            if first {
                if c < 0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            first = false;
            match (elem, c.unsigned_abs()) {
                (Element::Constant, a) => write!(f, "{a}")?,
                (e, 1) => write!(f, "{e}")?,
                (e, a) => write!(f, "{a}*{e}")?,
            }
        }
        if first {
            write!(f, "0")?;
        }
        Ok(())
    }
}

/// An integer expression as a sum of atoms with coefficients.
pub(crate) struct LinearForm {
    pub terms: LinkedHashMap<Node, i64>,
    pub constant: i64,
}

impl LinearForm {
    fn constant(c: i64) -> Self {
        Self {
            terms: LinkedHashMap::new(),
            constant: c,
        }
    }

    fn atom(node: &Node) -> Self {
        let mut terms = LinkedHashMap::new();
        terms.insert(node.clone(), 1);
        Self { terms, constant: 0 }
    }

    fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// `self + sign * other`; `None` on overflow.
    fn add(mut self, other: LinearForm, sign: i64) -> Option<Self> {
        for (atom, c) in other.terms {
            let entry = self.terms.entry(atom).or_insert(0);
            *entry = entry.checked_add(sign.checked_mul(c)?)?;
        }
        self.terms.retain(|_, c| *c != 0);
        self.constant =
            self.constant.checked_add(sign.checked_mul(other.constant)?)?;
        Some(self)
    }

    fn scale(mut self, k: i64) -> Option<Self> {
        for c in self.terms.values_mut() {
            *c = c.checked_mul(k)?;
        }
        self.terms.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_mul(k)?;
        Some(self)
    }

    /// Reads `expr` as a linear form. Variables and dereferences of variables
    /// are atoms. Fails on coefficients that do not fit an `i64`.
    pub fn parse(expr: &Node) -> ArborResult<Self> {
        let not_affine = || Error::not_affine(format!("{expr}"));
        match expr.kind() {
            NodeKind::Literal => expr
                .name()
                .and_then(|n| n.as_str().parse::<i64>().ok())
                .map(Self::constant)
                .ok_or_else(not_affine),
            NodeKind::Variable => Ok(Self::atom(expr)),
            NodeKind::CastExpr => Self::parse(expr.child(1)),
            NodeKind::CallExpr => {
                let (op, args) =
                    BasicOp::of_call(expr).ok_or_else(not_affine)?;
                let res = match op {
                    BasicOp::IntAdd => {
                        Self::parse(&args[0])?.add(Self::parse(&args[1])?, 1)
                    }
                    BasicOp::IntSub => {
                        Self::parse(&args[0])?.add(Self::parse(&args[1])?, -1)
                    }
                    BasicOp::IntMul => {
                        let lhs = Self::parse(&args[0])?;
                        let rhs = Self::parse(&args[1])?;
                        if lhs.is_constant() {
                            rhs.scale(lhs.constant)
                        } else if rhs.is_constant() {
                            lhs.scale(rhs.constant)
                        } else {
                            None
                        }
                    }
                    BasicOp::RefDeref if args[0].is_variable() => {
                        Some(Self::atom(expr))
                    }
                    _ => None,
                };
                res.ok_or_else(not_affine)
            }
            _ => Err(not_affine()),
        }
    }

    /// Atoms in order of first occurrence.
    pub fn atoms(&self) -> impl Iterator<Item = &Node> {
        self.terms.keys()
    }
}
