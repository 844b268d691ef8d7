//! CLI module for coursebase
//!
//! Provides command-line interface for:
//! - init: Create the data directory, table files and an empty snapshot
//! - schema: Print the stored table catalog
//! - ddl: Print SQL DDL
//! - exec: Run JSON requests against the store

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{ddl, exec, execute, init, run, run_command, schema, Request, RequestError, Session};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_response, ok_response, write_response};
