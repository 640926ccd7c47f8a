//! fba-margin command-line front end.
//!
//! Resolves configuration, sets up logging, and runs the subcommands and
//! the interactive REPL on top of the `fba-margin` library.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;
pub mod progress;
pub mod repl;
