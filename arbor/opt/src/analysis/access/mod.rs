//! Partitioning of memory accesses into alias classes.
//!
//! An [Access] describes one expression reading or writing memory: the
//! variable it goes through, the member/component/element path below that
//! variable and, for array elements inside loop nests, the range of indices
//! it touches. An [AccessManager] assigns every access submitted to it an
//! [AccessClass]; accesses in one class are believed to denote the same
//! memory location.
mod alias;
mod class;
mod extract;
mod manager;

pub use alias::AliasMap;
pub use class::AccessClass;
pub use extract::{Access, AccessRange, DataPath, PathStep, VarType};
pub use manager::AccessManager;
