//! Affine functions and constraints over loop iteration vectors.
//!
//! Constraints are kept apart from the IR until they are converted with
//! [to_ir]; coefficient manipulation and normalization happen on this
//! dedicated representation.
mod affine;
mod constraint;
mod domain;
mod iter_vec;
pub mod scop;

pub use affine::AffineFunction;
pub use constraint::{
    clone_constraint, copy_from_constraint, extract_iteration_vector,
    normalize, to_ir, try_clone_constraint, try_copy_from_constraint,
    try_extract_iteration_vector, try_normalize, AffineConstraint, BinaryOp,
    Constraint, ConstraintType, ConstraintVisitor,
};
pub use domain::IterationDomain;
pub use iter_vec::{Element, IterationVector};
