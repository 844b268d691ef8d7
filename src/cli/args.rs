//! CLI argument definitions using clap
//!
//! Commands:
//! - coursebase init --config <path>
//! - coursebase schema --config <path>
//! - coursebase ddl
//! - coursebase exec --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// coursebase - storage for courses, lessons, subscriptions and payments
#[derive(Parser, Debug)]
#[command(name = "coursebase")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./coursebase.json")]
        config: PathBuf,
    },

    /// Print the table catalog as JSON
    Schema {
        /// Path to configuration file
        #[arg(long, default_value = "./coursebase.json")]
        config: PathBuf,
    },

    /// Print SQL DDL for the course platform tables
    Ddl,

    /// Execute JSON requests from stdin, one per line
    Exec {
        /// Path to configuration file
        #[arg(long, default_value = "./coursebase.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
