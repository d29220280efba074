//! Session management: one loading context per load, torn down on reload.

use crate::builder::GraphBuilder;
use crate::compat::CompatibilityConfig;
use crate::context::{IsolatedContext, LoadingContext, SymbolTable};
use crate::descriptor::ExtensionDescriptor;
use crate::discovery::discover_archives;
use crate::error::LoaderError;
use crate::graph::DependencyGraph;
use crate::loader::{ExtensionLoader, LoadOutcome, LoadReport, LoadedExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Manifest section read when no other is configured.
pub const DEFAULT_MANIFEST_SECTION: &str = "structure_type";

/// Settings for one extension family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Manifest section holding the type name, version and dependencies.
    pub manifest_section: String,

    /// Abort graph building on a dependency cycle instead of disabling the
    /// offending extension.
    pub fail_fast: bool,

    pub compatibility: CompatibilityConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            manifest_section: DEFAULT_MANIFEST_SECTION.to_string(),
            fail_fast: false,
            compatibility: CompatibilityConfig::default(),
        }
    }
}

type ContextFactory = Box<dyn Fn() -> Box<dyn LoadingContext> + Send + Sync>;

/// Loads an extension family and owns the context its code lives in.
///
/// Each call to [`TypeLoader::load_directory`] starts a new session: the
/// previous context is closed first, so nothing from an earlier load can be
/// resolved again. Callers that run loads from several tasks must serialize
/// them.
pub struct TypeLoader {
    config: LoaderConfig,
    new_context: ContextFactory,
    context: Option<Box<dyn LoadingContext>>,
    graph: DependencyGraph,
    session_id: u64,
}

impl TypeLoader {
    /// Creates a loader that opens dynamic libraries and falls back to
    /// `builtins` for entry points no archive provides.
    pub fn new(config: LoaderConfig, builtins: Arc<SymbolTable>) -> Self {
        let compatibility = config.compatibility;
        Self::with_context_factory(config, move || {
            Box::new(IsolatedContext::new(builtins.clone(), compatibility))
        })
    }

    /// Creates a loader with a custom context per session.
    pub fn with_context_factory<F>(config: LoaderConfig, factory: F) -> Self
    where
        F: Fn() -> Box<dyn LoadingContext> + Send + Sync + 'static,
    {
        Self {
            config,
            new_context: Box::new(factory),
            context: None,
            graph: DependencyGraph::new(),
            session_id: 0,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of sessions started so far.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn has_session(&self) -> bool {
        self.context.is_some()
    }

    /// Discovers and loads every archive in `directory`.
    pub fn load_directory(&mut self, directory: &Path) -> Result<LoadOutcome, LoaderError> {
        info!("🔌 Loading structure types from: {}", directory.display());
        let descriptors = discover_archives(directory, &self.config.manifest_section)?;
        self.load_descriptors(descriptors)
    }

    /// Starts a session over already discovered descriptors.
    pub fn load_descriptors(
        &mut self,
        descriptors: Vec<ExtensionDescriptor>,
    ) -> Result<LoadOutcome, LoaderError> {
        self.begin_session();

        let builder = GraphBuilder::new(self.config.fail_fast);
        if let Err(e) = builder.extend(&mut self.graph, descriptors) {
            error!("❌ Dependency graph rejected, abandoning session: {}", e);
            self.teardown();
            return Err(e);
        }

        let extensions = match self.context.as_deref_mut() {
            Some(context) => ExtensionLoader::new(context).load(&mut self.graph),
            None => return Err(LoaderError::ContextClosed),
        };
        let report = LoadReport::from_graph(&self.graph);
        report.log_summary();

        Ok(LoadOutcome { extensions, report })
    }

    /// Loads a single archive into the current session.
    ///
    /// Its requirements are resolved against extensions already known to the
    /// session. Returns `None`, after logging why, if the archive is invalid,
    /// already present, or fails to load.
    pub fn load_archive(&mut self, archive: &Path) -> Option<LoadedExtension> {
        let descriptor =
            match ExtensionDescriptor::from_archive(archive, &self.config.manifest_section) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!("❌ Cannot load archive {}: {}", archive.display(), e);
                    return None;
                }
            };
        let name = descriptor.name().to_string();

        if self.context.is_none() {
            self.begin_session();
        }

        let builder = GraphBuilder::new(self.config.fail_fast);
        match builder.extend(&mut self.graph, vec![descriptor]) {
            Ok(added) if added.is_empty() => {
                warn!("⚠️ Structure type '{}' is already part of this session", name);
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                error!("❌ Cannot add '{}' to the dependency graph: {}", name, e);
                return None;
            }
        }

        let context = self.context.as_deref_mut()?;
        let loaded = ExtensionLoader::new(context)
            .load(&mut self.graph)
            .into_iter()
            .find(|extension| extension.name() == name);

        if loaded.is_none() {
            if let Some(failure) = self
                .graph
                .find(&name)
                .and_then(|id| self.graph.node(id).failure())
            {
                warn!("⚠️ Structure type '{}' not loaded: {}", name, failure);
            }
        }
        loaded
    }

    /// Tears the current session down and loads `directory` again.
    ///
    /// Instances from the previous session must already be released.
    pub fn reload(&mut self, directory: &Path) -> Result<LoadOutcome, LoaderError> {
        info!("🔄 Reloading structure types (session {})", self.session_id);
        self.load_directory(directory)
    }

    /// Closes the current context. Loading again starts a fresh session.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    /// Names of extensions loaded in the current session, dependencies first.
    pub fn loaded_names(&self) -> Vec<String> {
        self.report().loaded().to_vec()
    }

    pub fn report(&self) -> LoadReport {
        LoadReport::from_graph(&self.graph)
    }

    fn begin_session(&mut self) {
        self.teardown();
        self.context = Some((self.new_context)());
        self.session_id += 1;
        info!("🆕 Started loading session {}", self.session_id);
    }

    fn teardown(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.close();
            info!("🧹 Closed loading session {}", self.session_id);
        }
        self.graph = DependencyGraph::new();
    }
}

impl Drop for TypeLoader {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FailureKind;
    use crate::discovery::LIBRARY_EXTENSION;
    use std::fs;
    use tempfile::TempDir;
    use test_log::test;

    fn loader() -> TypeLoader {
        TypeLoader::new(LoaderConfig::default(), Arc::new(SymbolTable::new()))
    }

    fn write_corrupt_archive(dir: &Path, stem: &str, dependencies: &str) -> std::path::PathBuf {
        let archive = dir.join(format!("{}.{}", stem, LIBRARY_EXTENSION));
        fs::write(&archive, "not a library").unwrap();
        fs::write(
            dir.join(format!("{}.toml", stem)),
            format!(
                "entry_point = \"create_{stem}\"\n[structure_type]\ntype_name = \"{stem}\"\nversion = 1\ndependencies = \"{dependencies}\"\n"
            ),
        )
        .unwrap();
        archive
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.manifest_section, "structure_type");
        assert!(!config.fail_fast);
        assert_eq!(config.compatibility, CompatibilityConfig::default());
    }

    #[test]
    fn test_config_partial_toml() {
        let config: LoaderConfig = toml::from_str("fail_fast = true\n").unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.manifest_section, DEFAULT_MANIFEST_SECTION);
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader();
        let outcome = loader.load_directory(&temp_dir.path().join("missing")).unwrap();
        assert!(outcome.extensions.is_empty());
        assert!(outcome.report.is_clean());
        assert_eq!(loader.session_id(), 1);
        assert!(loader.has_session());
    }

    #[test]
    fn test_corrupt_archive_fails_with_dependents() {
        let temp_dir = TempDir::new().unwrap();
        write_corrupt_archive(temp_dir.path(), "base", "");
        write_corrupt_archive(temp_dir.path(), "tower", "base1;1");

        let mut loader = loader();
        let outcome = loader.load_directory(temp_dir.path()).unwrap();

        assert!(outcome.extensions.is_empty());
        assert_eq!(
            outcome.report.failure_of("base").unwrap().kind,
            FailureKind::LoadError
        );
        assert_eq!(
            outcome.report.failure_of("tower").unwrap().kind,
            FailureKind::DependencyUnavailable
        );
    }

    #[test]
    fn test_reload_starts_new_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader();
        loader.load_directory(temp_dir.path()).unwrap();
        loader.reload(temp_dir.path()).unwrap();
        assert_eq!(loader.session_id(), 2);

        loader.shutdown();
        assert!(!loader.has_session());
        assert!(loader.loaded_names().is_empty());
    }

    #[test]
    fn test_load_archive_without_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join(format!("lonely.{}", LIBRARY_EXTENSION));
        fs::write(&archive, "x").unwrap();

        let mut loader = loader();
        assert!(loader.load_archive(&archive).is_none());
        assert!(!loader.has_session());
    }

    #[test]
    fn test_load_archive_records_failure() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_corrupt_archive(temp_dir.path(), "gate", "");

        let mut loader = loader();
        assert!(loader.load_archive(&archive).is_none());
        assert_eq!(
            loader.report().failure_of("gate").unwrap().kind,
            FailureKind::LoadError
        );
        // Same name again is refused.
        assert!(loader.load_archive(&archive).is_none());
        assert_eq!(loader.session_id(), 1);
    }

    #[test]
    fn test_rejected_graph_closes_the_session() {
        let mut loader = TypeLoader::new(
            LoaderConfig {
                fail_fast: true,
                ..LoaderConfig::default()
            },
            Arc::new(SymbolTable::new()),
        );
        let descriptors = vec![
            ExtensionDescriptor::with_dependencies("a", 1, "create_a", "a.so".into(), "b0;1"),
            ExtensionDescriptor::with_dependencies("b", 1, "create_b", "b.so".into(), "a0;1"),
        ];

        assert!(matches!(
            loader.load_descriptors(descriptors),
            Err(LoaderError::GraphError(_))
        ));
        assert!(!loader.has_session());
        assert_eq!(loader.report(), LoadReport::default());
        assert!(loader.loaded_names().is_empty());
    }
}
