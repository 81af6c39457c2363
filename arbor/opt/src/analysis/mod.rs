//! Analyses used by data-flow clients of the IR.
pub mod access;
pub mod polyhedral;
