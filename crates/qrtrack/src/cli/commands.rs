//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Item commands.
#[derive(Debug, Subcommand)]
pub enum ItemsCommand {
    /// List stored items
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Copy items from a JSON item file into the configured store
    Import {
        /// JSON array of items to import
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Code image commands.
#[derive(Debug, Subcommand)]
pub enum CodesCommand {
    /// Re-render every item's code with a freshly signed link
    Regenerate,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_command_debug() {
        let cmd = ServeCommand {
            bind: Some("0.0.0.0:8080".to_string()),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("bind"));
        assert!(debug_str.contains("0.0.0.0:8080"));
    }

    #[test]
    fn test_items_command_debug() {
        let cmd = ItemsCommand::Import {
            file: PathBuf::from("items.json"),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Import"));
        assert!(debug_str.contains("items.json"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
