//! # The arbor driver
//!
//! This crate plumbs together the arbor crates and provides a command-line
//! interface that runs the analyses on a set of built-in kernels.
//! Depend on [`arbor_ir`] and [`arbor_opt`] directly instead of this crate.
pub mod cmdline;
pub mod driver;
pub mod kernels;
