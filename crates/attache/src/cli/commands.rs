//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Attache - store, read and remove issue attachments
#[derive(Parser, Debug)]
#[command(name = "attache")]
#[command(about = "Store, read and remove issue attachments", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Settings file to use instead of the default search path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a file and print its description as JSON
    Put {
        /// File to upload
        file: PathBuf,

        /// Name to record instead of the file's own name
        #[arg(long)]
        name: Option<String>,

        /// MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Relative sub-directory (local) or id prefix (memory)
        #[arg(long)]
        path: Option<String>,

        /// Metadata entry as key=value; repeatable
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },

    /// Read a stored file
    Get {
        /// Identity returned by `put`
        id: String,

        /// Write the bytes here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether an identity is stored
    Exists {
        /// Identity returned by `put`
        id: String,
    },

    /// Remove a stored file
    Rm {
        /// Identity returned by `put`
        id: String,
    },

    /// Print the resolved storage settings as JSON
    Config,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}
