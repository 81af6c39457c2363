//! Internal representation of the arbor middle-end.
//!
//! The IR is a forest of immutable, hash-consed nodes owned by a
//! [`NodeStore`]. Structurally equal nodes requested from the same store are
//! the same instance, so sub-trees are freely shared between parents and no
//! node knows its parents.
//! 1. [`Address`]es identify a node *within* a given root and replace the
//!    missing parent links.
//! 2. The [`visitor`] module implements the traversal engine shared by all
//!    analyses, [`mapper`] and [`transform`] build new trees out of old ones.

// Modules defining internal structures.
mod address;
mod builder;
mod common;
mod lang;
mod node;
mod printer;
mod store;

/// Generic traversal of nodes and addresses.
pub mod visitor;

/// Bottom-up and child-wise node mappings.
pub mod mapper;

/// Replacement of nodes and addresses.
pub mod transform;

/// Matching of polymorphic types.
pub mod types;

/// Analyses computed directly on the IR.
pub mod analysis;

/// Evaluation of integer and boolean expressions.
pub mod arithmetic;

// Re-export types at the module level.
pub use address::Address;
pub use arbor_utils::{ArborResult, Error, GetName, Id};
pub use builder::Builder;
pub use common::{rrc, RRC};
pub use lang::{BasicOp, LangBasic};
pub use node::{Node, NodeCategory, NodeId, NodeKind, Slot, StoreId, Value};
pub use printer::Printer;
pub use store::NodeStore;
