//! # Structure Type Host
//!
//! Loads structure type extensions from a directory at startup and keeps them
//! in a registry for the rest of the process.
//!
//! ```bash
//! # Run with default configuration
//! type_host
//!
//! # Custom configuration and extension directory
//! type_host --config host.toml --extensions /opt/types --log-level debug
//!
//! # Abort on dependency cycles while developing extensions
//! type_host --debug-graph
//! ```
//!
//! The configuration file (default `config.toml`) is created with defaults if
//! it doesn't exist. SIGHUP reloads every extension; SIGINT and SIGTERM shut
//! the host down.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod registry;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the host until it is told to stop.
///
/// Exits the process with code 1 if startup or the run loop fails.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file, so read it before anything logs.
    let mut logging_config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_config.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging_config, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{LoaderSettings, LoggingSettings};
pub use registry::{RegisteredType, TypeRegistry};
