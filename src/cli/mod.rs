//! CLI module for aerostore
//!
//! Provides a command-line interface for:
//! - create: Provision a collection
//! - put / get / delete: Single-document operations
//! - scan / count: Ordered reads
//! - status: Store status

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute, load_config, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_documents, write_error, write_response};
