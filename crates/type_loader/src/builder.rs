//! Resolution of declared requirements into graph edges.
//!
//! Building never loads code. It creates one node per extension, checks every
//! requirement against the other nodes, records what cannot be satisfied and
//! cascades those failures to dependents.

use crate::descriptor::ExtensionDescriptor;
use crate::error::{GraphError, LoaderError};
use crate::graph::{DependencyGraph, LoadFailure, NodeId};
use crate::propagation::propagate_all;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    fail_fast: bool,
}

impl GraphBuilder {
    /// With `fail_fast` set, a dependency cycle aborts the build with an error
    /// instead of disabling the extension that closes it.
    pub fn new(fail_fast: bool) -> Self {
        Self { fail_fast }
    }

    pub fn build(&self, descriptors: Vec<ExtensionDescriptor>) -> Result<DependencyGraph, LoaderError> {
        let mut graph = DependencyGraph::new();
        self.extend(&mut graph, descriptors)?;
        Ok(graph)
    }

    /// Adds `descriptors` to an existing graph and resolves their requirements
    /// against everything in it. Returns the ids of the nodes actually added.
    pub fn extend(
        &self,
        graph: &mut DependencyGraph,
        descriptors: Vec<ExtensionDescriptor>,
    ) -> Result<Vec<NodeId>, LoaderError> {
        let mut added = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if graph.find(descriptor.name()).is_some() {
                warn!(
                    "⚠️ Extension '{}' from {} is already known, ignoring duplicate",
                    descriptor.name(),
                    descriptor.archive().display()
                );
                continue;
            }
            added.push(graph.add_node(descriptor));
        }

        for &id in &added {
            self.resolve(graph, id)?;
        }

        let cascaded = propagate_all(graph);
        debug!(
            "🕸️ Dependency graph: {} nodes, {} edges, {} cascaded failures",
            graph.len(),
            graph.edge_count(),
            cascaded
        );
        Ok(added)
    }

    fn resolve(&self, graph: &mut DependencyGraph, id: NodeId) -> Result<(), LoaderError> {
        let dependent = graph.node(id).name().to_string();
        let requirements = graph.node(id).descriptor().requirements().to_vec();

        for requirement in requirements {
            let Some(dependency) = graph.find(requirement.name()) else {
                let message = format!(
                    "dependency '{}' of '{}' was not found",
                    requirement.name(),
                    dependent
                );
                warn!("❌ {}", message);
                graph.node_mut(id).fail(LoadFailure::dependency_unavailable(message));
                continue;
            };

            let found = graph.node(dependency).descriptor();
            if !requirement.satisfied_by(found) {
                let found_version = found.version();
                let message = format!(
                    "found '{}' version {} but '{}' requires {}",
                    requirement.name(),
                    found_version,
                    dependent,
                    requirement
                );
                warn!("❌ {}", message);
                graph.node_mut(id).fail(LoadFailure::version_unsatisfied(message));
                continue;
            }

            match graph.add_edge(id, dependency) {
                Ok(()) => {}
                Err(e @ GraphError::DependencyCycle { .. }) => {
                    if self.fail_fast {
                        return Err(e.into());
                    }
                    warn!("🔁 {}", e);
                    graph.node_mut(id).fail(LoadFailure::dependency_unavailable(format!(
                        "circular dependency: {}",
                        e
                    )));
                }
            }
        }
        Ok(())
    }
}
