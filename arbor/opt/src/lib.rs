//! Analyses built on top of the arbor IR.
//!
//! [analysis::polyhedral] represents affine constraints over loop iteration
//! vectors and converts them from and to IR expressions.
//! [analysis::access] partitions the memory accesses of a block into alias
//! classes, using the polyhedral representation to reason about array ranges.
pub mod analysis;
mod conf;

pub use conf::{AnalysisConf, AnalysisOpt, Named, ParseVal};
