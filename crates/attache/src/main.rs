//! Attache CLI binary.
//!
//! This binary provides command-line access to attachment storage:
//! - Upload files through the storage pipeline
//! - Read, check and remove stored files
//! - Inspect the resolved storage settings

use attache::{ObservabilityConfig, StorageFactory, StorageSettings, init_observability};
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, handle_command};

    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    init_observability(ObservabilityConfig::new(log_level).with_json_logs(cli.json_logs))?;

    let settings = match &cli.config {
        Some(path) => StorageSettings::from_file(path)?,
        None => StorageSettings::load()?,
    };
    let factory = StorageFactory::new(settings);

    // Execute the requested command
    handle_command(cli.command, &factory).await?;

    Ok(())
}
