//! Walks a resolved graph and instantiates every extension that can load.

use crate::context::{panic_message, ExtensionInstance, LoadingContext};
use crate::descriptor::ExtensionDescriptor;
use crate::error::LoaderError;
use crate::graph::{DependencyGraph, FailureKind, LoadFailure, NodeId};
use crate::propagation::propagate_failure;
use std::fmt;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use structure_type_api::DataSerializer;
use tracing::{debug, error, info, warn};

/// An extension that passed loading and its smoke test.
///
/// Carries the serializer built during the smoke test, so callers never have
/// to invoke the extension again to obtain it.
pub struct LoadedExtension {
    descriptor: ExtensionDescriptor,
    serializer: DataSerializer,
    instance: ExtensionInstance,
}

impl LoadedExtension {
    pub fn new(
        descriptor: ExtensionDescriptor,
        serializer: DataSerializer,
        instance: ExtensionInstance,
    ) -> Self {
        Self {
            descriptor,
            serializer,
            instance,
        }
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Serializer validated while loading.
    pub fn serializer(&self) -> &DataSerializer {
        &self.serializer
    }

    pub fn instance(&self) -> &ExtensionInstance {
        &self.instance
    }

    pub fn into_parts(self) -> (ExtensionDescriptor, DataSerializer, ExtensionInstance) {
        (self.descriptor, self.serializer, self.instance)
    }
}

impl Deref for LoadedExtension {
    type Target = ExtensionInstance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("name", &self.name())
            .field("version", &self.descriptor.version())
            .field("archive", &self.descriptor.archive())
            .finish()
    }
}

/// One extension that did not load, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub name: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of a session, per extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    loaded: Vec<String>,
    failures: Vec<FailureRecord>,
}

impl LoadReport {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let loaded = graph
            .leaf_first_order()
            .into_iter()
            .map(|id| graph.node(id))
            .filter(|node| node.is_loaded())
            .map(|node| node.name().to_string())
            .collect();
        let failures = graph
            .failures()
            .map(|(node, failure)| FailureRecord {
                name: node.name().to_string(),
                kind: failure.kind(),
                message: failure.message().to_string(),
            })
            .collect();
        Self { loaded, failures }
    }

    /// Names of loaded extensions, dependencies first.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn failure_of(&self, name: &str) -> Option<&FailureRecord> {
        let name = crate::descriptor::canonical_name(name);
        self.failures.iter().find(|record| record.name == name)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let count = |kind| self.failures.iter().filter(|r| r.kind == kind).count();
        format!(
            "{} loaded, {} failed ({} load errors, {} unavailable dependencies, {} unsatisfied versions)",
            self.loaded.len(),
            self.failures.len(),
            count(FailureKind::LoadError),
            count(FailureKind::DependencyUnavailable),
            count(FailureKind::DependencyVersionUnsatisfied)
        )
    }

    pub fn log_summary(&self) {
        info!("📊 Structure types: {}", self.summary());
        for record in &self.failures {
            warn!("  ❌ {} ({}): {}", record.name, record.kind, record.message);
        }
    }
}

/// Everything a session produced.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Live extensions, dependencies before dependents.
    pub extensions: Vec<LoadedExtension>,
    pub report: LoadReport,
}

/// Loads the pending nodes of a graph through one loading context.
pub struct ExtensionLoader<'a> {
    context: &'a mut dyn LoadingContext,
}

impl<'a> ExtensionLoader<'a> {
    pub fn new(context: &'a mut dyn LoadingContext) -> Self {
        Self { context }
    }

    /// Loads every pending node, dependencies first.
    ///
    /// A node that fails to register, instantiate or pass its smoke test is
    /// marked `LoadError` and its dependents are disabled before they are
    /// reached. Nodes that are already loaded or failed are skipped.
    pub fn load(&mut self, graph: &mut DependencyGraph) -> Vec<LoadedExtension> {
        let mut loaded = Vec::new();

        for id in graph.leaf_first_order() {
            let node = graph.node(id);
            if let Some(failure) = node.failure() {
                debug!("⏭️ Skipping '{}': {}", node.name(), failure);
                continue;
            }
            if node.is_loaded() {
                continue;
            }

            let descriptor = node.descriptor().clone();
            match self.load_one(&descriptor) {
                Ok((serializer, instance)) => {
                    graph.node_mut(id).mark_loaded();
                    info!(
                        "✅ Loaded structure type '{}' v{}",
                        descriptor.name(),
                        descriptor.version()
                    );
                    loaded.push(LoadedExtension::new(descriptor, serializer, instance));
                }
                Err(e) => self.reject(graph, id, &descriptor, e),
            }
        }

        loaded.shrink_to_fit();
        loaded
    }

    fn load_one(
        &mut self,
        descriptor: &ExtensionDescriptor,
    ) -> Result<(DataSerializer, ExtensionInstance), LoaderError> {
        self.context.register_archive(descriptor.archive())?;
        let instance = self.context.instantiate(descriptor.entry_point())?;

        // Every call into the extension happens under the guard.
        let smoke_test = catch_unwind(AssertUnwindSafe(|| {
            let reported = instance.type_name().to_string();
            instance.serializer().map(|serializer| (reported, serializer))
        }));
        let (reported, serializer) = match smoke_test {
            Ok(Ok(checked)) => checked,
            Ok(Err(e)) => return Err(LoaderError::ValidationError(e)),
            Err(payload) => {
                return Err(LoaderError::InstantiationError(format!(
                    "structure type '{}' panicked during its smoke test: {}",
                    descriptor.name(),
                    panic_message(payload.as_ref())
                )))
            }
        };

        if !reported.eq_ignore_ascii_case(descriptor.name()) {
            warn!(
                "⚠️ Archive {} declares type '{}' but its extension reports '{}'",
                descriptor.archive().display(),
                descriptor.name(),
                reported
            );
        }
        Ok((serializer, instance))
    }

    fn reject(
        &self,
        graph: &mut DependencyGraph,
        id: NodeId,
        descriptor: &ExtensionDescriptor,
        cause: LoaderError,
    ) {
        error!(
            "❌ Failed to load structure type '{}' from {}: {}",
            descriptor.name(),
            descriptor.archive().display(),
            cause
        );
        graph
            .node_mut(id)
            .fail(LoadFailure::load_error(cause.to_string()));
        let disabled = propagate_failure(graph, id);
        if disabled > 0 {
            warn!(
                "⛓️ {} dependents of '{}' will not be loaded",
                disabled,
                descriptor.name()
            );
        }
    }
}
