//! CLI argument definitions using clap
//!
//! Commands:
//! - aerostore create <collection> --config <path>
//! - aerostore put <collection> --config <path>      (documents on stdin)
//! - aerostore get <collection> <id> --config <path>
//! - aerostore delete <collection> <id> --config <path>
//! - aerostore scan <collection> [--prefix <p> | --filter <json>] --config <path>
//! - aerostore count <collection> --config <path>
//! - aerostore status --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerostore - document collections over an embedded ordered key-value engine
#[derive(Parser, Debug)]
#[command(name = "aerostore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new, empty collection
    Create {
        /// Collection name
        collection: String,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// Write documents read from stdin, one JSON object per line
    Put {
        /// Collection name
        collection: String,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// Read one document by id
    Get {
        /// Collection name
        collection: String,

        /// Document id
        id: String,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// Delete one document by id
    Delete {
        /// Collection name
        collection: String,

        /// Document id
        id: String,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// List documents in key order
    Scan {
        /// Collection name
        collection: String,

        /// Only ids starting with this prefix
        #[arg(long, conflicts_with = "filter")]
        prefix: Option<String>,

        /// Selector document, e.g. '{"_id": {"$prefix": "user:"}}'
        #[arg(long)]
        filter: Option<String>,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// Count documents in a collection
    Count {
        /// Collection name
        collection: String,

        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },

    /// Report store status
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./aerostore.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_with_prefix() {
        let cli = Cli::try_parse_from(["aerostore", "scan", "users", "--prefix", "user:"]).unwrap();
        match cli.command {
            Command::Scan {
                collection,
                prefix,
                filter,
                config,
            } => {
                assert_eq!(collection, "users");
                assert_eq!(prefix.as_deref(), Some("user:"));
                assert!(filter.is_none());
                assert_eq!(config, PathBuf::from("./aerostore.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_prefix_conflicts_with_filter() {
        let parsed = Cli::try_parse_from([
            "aerostore", "scan", "users", "--prefix", "a", "--filter", "{}",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_get_requires_id() {
        assert!(Cli::try_parse_from(["aerostore", "get", "users"]).is_err());
    }
}
