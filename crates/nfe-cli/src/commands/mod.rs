//! Subcommand implementations.

pub mod batch;
pub mod check;
pub mod config;
