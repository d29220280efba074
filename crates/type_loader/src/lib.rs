//! # Type Loader
//!
//! Discovers structure type extensions packaged as dynamic libraries, checks
//! their declared dependencies, orders them dependency-first and instantiates
//! them through an isolated loading context.
//!
//! A load runs in four steps:
//!
//! 1. [`discovery`] reads the manifest next to every library in a directory
//!    and produces [`ExtensionDescriptor`]s.
//! 2. [`GraphBuilder`] turns descriptors into a [`DependencyGraph`], failing
//!    extensions whose dependencies are missing or out of range.
//! 3. [`propagation`] disables everything depending on a failed extension.
//! 4. [`ExtensionLoader`] instantiates the rest, leaf-first, through a
//!    [`LoadingContext`] and smoke-tests each instance.
//!
//! [`TypeLoader`] drives the whole thing and owns the session's context.
//! Failures are never fatal: the worst outcome is an empty list, with every
//! rejected extension and its reason recorded in the [`LoadReport`].

pub mod builder;
pub mod compat;
pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod loader;
pub mod manager;
pub mod propagation;
pub mod requirement;

pub use builder::GraphBuilder;
pub use compat::CompatibilityConfig;
pub use context::{ExtensionFactory, ExtensionInstance, IsolatedContext, LoadingContext, SymbolTable};
pub use descriptor::{canonical_name, ArchiveManifest, ExtensionDescriptor};
pub use error::{GraphError, LoaderError, ManifestError};
pub use graph::{DependencyGraph, FailureKind, LoadFailure, LoadNode, NodeId, NodeStatus};
pub use loader::{ExtensionLoader, FailureRecord, LoadOutcome, LoadReport, LoadedExtension};
pub use manager::{LoaderConfig, TypeLoader, DEFAULT_MANIFEST_SECTION};
pub use requirement::{parse_dependencies, Requirement, TokenError, NO_DEPENDENCIES};
