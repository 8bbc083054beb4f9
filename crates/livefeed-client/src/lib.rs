//! CLI, feed rendering, avatar lookups
//!
//! This crate provides the `livefeed` command-line interface.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
