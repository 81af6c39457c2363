//! Static control parts: the loop nests enclosing a program point.
use super::affine::{AffineFunction, LinearForm};
use super::constraint::{Constraint, ConstraintType};
use super::domain::IterationDomain;
use super::iter_vec::IterationVector;
use arbor_ir::{Address, Node, NodeKind};
use std::rc::Rc;

const FOR_STEP: usize = 3;
/// Index of the body within a for statement.
const FOR_BODY: usize = 4;

/// The for statements whose body contains `addr`, outermost first.
pub fn enclosing_loops(addr: &Address) -> Vec<Address> {
    let chain = addr.ancestors();
    chain
        .windows(2)
        .filter(|w| {
            w[0].as_node().kind() == NodeKind::ForStmt
                && w[1].child_index() == FOR_BODY
        })
        .map(|w| w[0].clone())
        .collect()
}

/// The outermost loop enclosing `addr`, which delimits the region its
/// iteration domain is valid in.
pub fn scop_root(addr: &Address) -> Option<Address> {
    enclosing_loops(addr).into_iter().next()
}

/// The iteration domain of the loop nest enclosing `addr`.
pub fn loop_domain(addr: &Address) -> IterationDomain {
    loop_domain_over(addr, &[])
}

/// Like [loop_domain], with the values used by `exprs` added as parameters
/// to the iteration vector.
///
/// For every loop `for (i = s .. e : step)` with a positive constant step the
/// domain contains `i >= s` and `i < e`. Other steps and bounds that are not
/// affine are left out, which only makes the domain larger.
pub fn loop_domain_over(addr: &Address, exprs: &[Node]) -> IterationDomain {
    let loops = enclosing_loops(addr);
    let mut iv = IterationVector::default();
    for l in &loops {
        iv.add_iter(l.as_node().child(0).clone());
    }
    let bounds: Vec<&Node> = loops
        .iter()
        .flat_map(|l| [l.as_node().child(1), l.as_node().child(2)])
        .collect();
    for e in bounds.iter().copied().chain(exprs) {
        if let Ok(form) = LinearForm::parse(e) {
            for atom in form.atoms() {
                iv.add_param(atom.clone());
            }
        }
    }
    let iv = Rc::new(iv);

    let mut constraint: Option<Constraint> = None;
    let mut push = |c: Constraint| {
        constraint = Some(match constraint.take() {
            Some(prev) => prev & c,
            None => c,
        });
    };
    for l in &loops {
        let node = l.as_node();
        let Ok(iter) = AffineFunction::from_expr(Rc::clone(&iv), node.child(0))
        else {
            continue;
        };
        let step = AffineFunction::from_expr(Rc::clone(&iv), node.child(FOR_STEP));
        if !step.is_ok_and(|s| s.is_constant() && s.constant_term() > 0) {
            log::debug!("bounds of loop {l} left out: step is not a positive constant");
            continue;
        }
        let lower = AffineFunction::from_expr(Rc::clone(&iv), node.child(1))
            .and_then(|start| iter.try_sub(&start));
        match lower {
            Ok(f) => push(Constraint::raw(f, ConstraintType::Ge)),
            Err(e) => log::debug!("lower bound of loop {l} left out: {e}"),
        }
        let upper = AffineFunction::from_expr(Rc::clone(&iv), node.child(2))
            .and_then(|end| iter.try_sub(&end));
        match upper {
            Ok(f) => push(Constraint::raw(f, ConstraintType::Lt)),
            Err(e) => log::debug!("upper bound of loop {l} left out: {e}"),
        }
    }
    match constraint {
        Some(c) => IterationDomain::new(c),
        None => IterationDomain::universe(iv),
    }
}
