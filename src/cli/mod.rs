//! CLI module for examsched - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
