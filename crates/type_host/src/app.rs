//! Main application logic and lifecycle management.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::registry::TypeRegistry;
use crate::signals::{HostSignal, SignalListener};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use type_loader::{LoadReport, SymbolTable, TypeLoader};

/// Owns the loader and the registry it feeds.
///
/// Loads are serialized through the loader mutex, so a reload triggered by a
/// signal never overlaps another session.
pub struct Application {
    config: AppConfig,
    directory: PathBuf,
    loader: Arc<Mutex<TypeLoader>>,
    registry: Arc<TypeRegistry>,
}

impl Application {
    /// Loads configuration, applies CLI overrides and validates the result.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(extension_dir) = &args.extension_dir {
            config.loader.directory = extension_dir.to_string_lossy().to_string();
        }
        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if args.debug_graph {
            config.loader.debug_graph = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let loader_config = config.to_loader_config(args.to_compatibility_config());
        let loader = TypeLoader::new(loader_config, Arc::new(SymbolTable::new()));
        Ok(Self::with_loader(config, loader))
    }

    /// Builds an application around an existing loader.
    pub fn with_loader(config: AppConfig, loader: TypeLoader) -> Self {
        Self {
            directory: config.extension_directory(),
            config,
            loader: Arc::new(Mutex::new(loader)),
            registry: Arc::new(TypeRegistry::new()),
        }
    }

    pub fn registry(&self) -> Arc<TypeRegistry> {
        self.registry.clone()
    }

    /// Starts a fresh session and refills the registry from it.
    pub async fn load_types(&self) -> Result<LoadReport, Box<dyn std::error::Error>> {
        let mut loader = self.loader.lock().await;

        // Instances must go before the context that created them.
        self.registry.clear();

        let outcome = loader.reload(&self.directory)?;
        self.registry.register_all(outcome.extensions);
        Ok(outcome.report)
    }

    /// Releases every type and closes the loader's session.
    pub async fn shutdown(&self) {
        let mut loader = self.loader.lock().await;
        self.registry.clear();
        loader.shutdown();
        info!("🔌 Structure type session closed");
    }

    /// Loads all types, then serves reload and shutdown signals until asked
    /// to stop.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting structure type host");
        self.log_configuration_summary();

        let mut signals = SignalListener::new()?;
        self.load_types().await?;
        info!(
            "✅ Host is running with {} structure types: {:?}",
            self.registry.len(),
            self.registry.names()
        );
        info!("🔄 Send SIGHUP to reload, Ctrl+C to shut down");

        loop {
            match signals.recv().await? {
                HostSignal::Reload => match self.load_types().await {
                    Ok(report) => info!("✅ Reload complete: {}", report.summary()),
                    Err(e) => error!("❌ Reload failed: {}", e),
                },
                HostSignal::Shutdown => break,
            }
        }

        self.shutdown().await;
        info!("👋 Structure type host shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📂 Extension directory: {}", self.directory.display());
        info!("  🏷️ Manifest section: [{}]", self.config.loader.manifest_section);
        info!("  🕸️ Fail on dependency cycles: {}", self.config.loader.debug_graph);
        info!("  🛡️ Compatibility: {:?}", self.config.loader.compatibility);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use type_loader::LoaderConfig;

    fn app_for(directory: &std::path::Path) -> Application {
        let mut config = AppConfig::default();
        config.loader.directory = directory.to_string_lossy().to_string();
        let loader = TypeLoader::new(LoaderConfig::default(), Arc::new(SymbolTable::new()));
        Application::with_loader(config, loader)
    }

    #[tokio::test]
    async fn test_load_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let app = app_for(temp_dir.path());

        let report = app.load_types().await.unwrap();
        assert!(report.loaded().is_empty());
        assert!(report.is_clean());
        assert!(app.registry().is_empty());

        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_reports_broken_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir
            .path()
            .join(format!("gate.{}", type_loader::discovery::LIBRARY_EXTENSION));
        std::fs::write(&archive, "not a library").unwrap();
        std::fs::write(
            temp_dir.path().join("gate.toml"),
            "entry_point = \"create_gate\"\n[structure_type]\ntype_name = \"Gate\"\nversion = 1\n",
        )
        .unwrap();

        let app = app_for(temp_dir.path());
        let first = app.load_types().await.unwrap();
        let second = app.load_types().await.unwrap();
        assert_eq!(first, second);
        assert!(second.failure_of("gate").is_some());
        assert!(app.registry().is_empty());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("host.toml");
        std::fs::write(&config_path, "[logging]\nlevel = \"chatty\"\n").unwrap();

        let args = CliArgs::try_parse_from(["type_host", "--config", config_path.to_str().unwrap()])
            .unwrap();
        assert!(Application::new(args).await.is_err());
    }

    #[tokio::test]
    async fn test_new_applies_cli_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("host.toml");
        let extensions = temp_dir.path().join("types");

        let args = CliArgs::try_parse_from([
            "type_host",
            "--config",
            config_path.to_str().unwrap(),
            "--extensions",
            extensions.to_str().unwrap(),
            "--debug-graph",
        ])
        .unwrap();

        let app = Application::new(args).await.unwrap();
        assert!(config_path.exists());
        assert_eq!(app.directory, extensions);
        assert!(app.config.loader.debug_graph);
        assert!(app.loader.lock().await.config().fail_fast);
    }
}
