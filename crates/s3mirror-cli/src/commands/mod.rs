//! CLI subcommands

pub mod check;
pub mod completions;
pub mod config;
pub mod key;
pub mod run;
