//! Cascading of failures to everything that depends on a failed extension.

use crate::graph::{DependencyGraph, LoadFailure, NodeId};
use tracing::warn;

/// Marks every transitive dependent of `failed` as `DependencyUnavailable`.
///
/// Dependents that already carry a failure keep it. Returns how many nodes were
/// newly marked; calling it again for the same node marks nothing.
pub fn propagate_failure(graph: &mut DependencyGraph, failed: NodeId) -> usize {
    let origin = graph.node(failed);
    let Some(reason) = origin.failure().map(|failure| failure.to_string()) else {
        return 0;
    };
    let origin_name = origin.name().to_string();

    let mut marked = 0;
    for dependent in graph.transitive_dependents(failed) {
        let node = graph.node_mut(dependent);
        let message = format!(
            "'{}' cannot load because its dependency '{}' is unavailable ({})",
            node.name(),
            origin_name,
            reason
        );
        if node.fail(LoadFailure::dependency_unavailable(message)) {
            warn!(
                "⛓️ Extension '{}' disabled: dependency '{}' failed",
                node.name(),
                origin_name
            );
            marked += 1;
        }
    }
    marked
}

/// Propagates every failure currently recorded in the graph.
pub fn propagate_all(graph: &mut DependencyGraph) -> usize {
    let failed: Vec<NodeId> = graph
        .ids()
        .filter(|&id| graph.node(id).is_failed())
        .collect();
    failed
        .into_iter()
        .map(|id| propagate_failure(graph, id))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ExtensionDescriptor;
    use crate::graph::FailureKind;
    use std::path::PathBuf;

    fn chain() -> (DependencyGraph, Vec<NodeId>) {
        // d -> c -> b -> a, e unrelated
        let mut graph = DependencyGraph::new();
        let ids: Vec<NodeId> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| {
                graph.add_node(ExtensionDescriptor::new(
                    name,
                    1,
                    "create",
                    PathBuf::from("x.so"),
                    Vec::new(),
                ))
            })
            .collect();
        graph.add_edge(ids[1], ids[0]).unwrap();
        graph.add_edge(ids[2], ids[1]).unwrap();
        graph.add_edge(ids[3], ids[2]).unwrap();
        (graph, ids)
    }

    #[test]
    fn test_propagates_to_transitive_dependents() {
        let (mut graph, ids) = chain();
        graph.node_mut(ids[0]).fail(LoadFailure::load_error("bad archive"));

        assert_eq!(propagate_failure(&mut graph, ids[0]), 3);
        for &id in &ids[1..4] {
            let failure = graph.node(id).failure().unwrap();
            assert_eq!(failure.kind(), FailureKind::DependencyUnavailable);
            assert!(failure.message().contains("'a'"));
        }
        assert!(graph.node(ids[4]).is_pending());
    }

    #[test]
    fn test_idempotent() {
        let (mut graph, ids) = chain();
        graph.node_mut(ids[0]).fail(LoadFailure::load_error("bad archive"));
        propagate_failure(&mut graph, ids[0]);
        assert_eq!(propagate_failure(&mut graph, ids[0]), 0);
    }

    #[test]
    fn test_existing_failure_preserved() {
        let (mut graph, ids) = chain();
        graph
            .node_mut(ids[2])
            .fail(LoadFailure::version_unsatisfied("own reason"));
        graph.node_mut(ids[0]).fail(LoadFailure::load_error("bad archive"));

        propagate_failure(&mut graph, ids[0]);
        assert_eq!(
            graph.node(ids[2]).failure().unwrap().kind(),
            FailureKind::DependencyVersionUnsatisfied
        );
        assert!(graph.node(ids[3]).is_failed());
    }

    #[test]
    fn test_pending_node_propagates_nothing() {
        let (mut graph, ids) = chain();
        assert_eq!(propagate_failure(&mut graph, ids[0]), 0);
        assert_eq!(propagate_all(&mut graph), 0);
    }

    #[test]
    fn test_propagate_all() {
        let (mut graph, ids) = chain();
        graph.node_mut(ids[1]).fail(LoadFailure::load_error("boom"));
        assert_eq!(propagate_all(&mut graph), 2);
        assert!(graph.node(ids[0]).is_pending());
        assert_eq!(graph.failures().count(), 3);
    }
}
