//! Error types for the type loader.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid manifest for {}: {source}", path.display())]
    ManifestError {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Dependency graph error: {0}")]
    GraphError(#[from] GraphError),

    #[error("Library loading error: {0}")]
    LibraryError(String),

    #[error("Entry point '{0}' not found in any registered archive")]
    SymbolNotFound(String),

    #[error("Extension instantiation error: {0}")]
    InstantiationError(String),

    #[error("Extension failed validation: {0}")]
    ValidationError(#[from] structure_type_api::ExtensionError),

    #[error("Extension ABI version mismatch: {0}")]
    VersionMismatch(String),

    #[error("Loading context is closed")]
    ContextClosed,
}

/// Problems with an archive's manifest. Any of these excludes the archive
/// from discovery.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("malformed TOML: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("missing 'entry_point'")]
    MissingEntryPoint,

    #[error("missing section [{0}]")]
    MissingSection(String),

    #[error("missing 'type_name' in section [{0}]")]
    MissingTypeName(String),

    #[error("missing 'version' in section [{0}]")]
    MissingVersion(String),

    #[error("invalid version '{0}': expected a non-negative integer")]
    InvalidVersion(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("adding dependency '{dependent}' -> '{dependency}' would create a cycle")]
    DependencyCycle { dependent: String, dependency: String },
}
