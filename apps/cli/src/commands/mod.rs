//! CLI subcommand implementations.

pub mod catalog;
pub mod run;
pub mod tools;
pub mod validate;
