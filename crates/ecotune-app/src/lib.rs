//! Command-line front end: parameter search, single headless runs, and space listing.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, OptimizeArgs, RunArgs};
pub use commands::{RunSummary, optimize, params_table, run};
