//! Shared utilities for the arbor compiler middle-end.
mod errors;
mod id;

pub use errors::{ArborResult, Error, ErrorKind};
pub use id::{GetName, Id};
