//! Dependency graph over discovered extensions.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; edges point from a
//! dependent to the dependency it requires. The graph is kept acyclic by
//! refusing any edge that would close a cycle.

use crate::descriptor::{canonical_name, ExtensionDescriptor};
use crate::error::GraphError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node inside its [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A dependency is missing, failed, or part of a cycle.
    DependencyUnavailable,
    /// The dependency exists but its version is outside the declared range.
    DependencyVersionUnsatisfied,
    /// Registering, instantiating or smoke-testing the extension failed.
    LoadError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::DependencyUnavailable => "dependency unavailable",
            FailureKind::DependencyVersionUnsatisfied => "dependency version unsatisfied",
            FailureKind::LoadError => "load error",
        };
        f.write_str(label)
    }
}

/// Why a node did not load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    kind: FailureKind,
    message: String,
}

impl LoadFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn dependency_unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DependencyUnavailable, message)
    }

    pub fn version_unsatisfied(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DependencyVersionUnsatisfied, message)
    }

    pub fn load_error(message: impl Into<String>) -> Self {
        Self::new(FailureKind::LoadError, message)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Lifecycle of a node within one session. `Loaded` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    Loaded,
    Failed(LoadFailure),
}

/// One extension in the graph. Equality and hashing use the name only.
#[derive(Debug, Clone)]
pub struct LoadNode {
    descriptor: ExtensionDescriptor,
    status: NodeStatus,
}

impl LoadNode {
    fn new(descriptor: ExtensionDescriptor) -> Self {
        Self {
            descriptor,
            status: NodeStatus::Pending,
        }
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    pub fn failure(&self) -> Option<&LoadFailure> {
        match &self.status {
            NodeStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, NodeStatus::Pending)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, NodeStatus::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, NodeStatus::Failed(_))
    }

    /// Records a failure. Only a pending node accepts one; returns whether it did.
    pub(crate) fn fail(&mut self, failure: LoadFailure) -> bool {
        if self.is_pending() {
            self.status = NodeStatus::Failed(failure);
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_loaded(&mut self) -> bool {
        if self.is_pending() {
            self.status = NodeStatus::Loaded;
            true
        } else {
            false
        }
    }
}

impl PartialEq for LoadNode {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for LoadNode {}

impl Hash for LoadNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<LoadNode>,
    by_name: HashMap<String, NodeId>,
    dependencies: Vec<Vec<NodeId>>,
    dependents: Vec<Vec<NodeId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node for `descriptor`. If a node with the same name exists it is
    /// returned unchanged and the descriptor is discarded.
    pub fn add_node(&mut self, descriptor: ExtensionDescriptor) -> NodeId {
        if let Some(&existing) = self.by_name.get(descriptor.name()) {
            return existing;
        }
        let id = NodeId(self.nodes.len());
        self.by_name.insert(descriptor.name().to_string(), id);
        self.nodes.push(LoadNode::new(descriptor));
        self.dependencies.push(Vec::new());
        self.dependents.push(Vec::new());
        id
    }

    /// Records that `dependent` depends on `dependency`.
    ///
    /// Fails without modifying the graph if the edge would create a cycle,
    /// including a node depending on itself. Repeated edges are ignored.
    pub fn add_edge(&mut self, dependent: NodeId, dependency: NodeId) -> Result<(), GraphError> {
        if self.dependencies[dependent.0].contains(&dependency) {
            return Ok(());
        }
        if dependent == dependency || self.depends_on(dependency, dependent) {
            return Err(GraphError::DependencyCycle {
                dependent: self.nodes[dependent.0].name().to_string(),
                dependency: self.nodes[dependency.0].name().to_string(),
            });
        }
        self.dependencies[dependent.0].push(dependency);
        self.dependents[dependency.0].push(dependent);
        Ok(())
    }

    /// True if `from` reaches `to` by following dependency edges.
    fn depends_on(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.dependencies[current.0].iter().copied());
            }
        }
        false
    }

    /// Looks a node up by name; the name is canonicalized first.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(&canonical_name(name)).copied()
    }

    pub fn node(&self, id: NodeId) -> &LoadNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut LoadNode {
        &mut self.nodes[id.0]
    }

    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        &self.dependencies[id.0]
    }

    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        &self.dependents[id.0]
    }

    /// Every node that depends on `id` directly or indirectly, nearest first.
    pub fn transitive_dependents(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for &dependent in &self.dependents[current.0] {
                if seen.insert(dependent) {
                    result.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }
        result
    }

    /// All nodes ordered so that each comes after everything it depends on.
    ///
    /// Ties are broken by insertion order, so the result is deterministic.
    pub fn leaf_first_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        for start in 0..self.nodes.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            // (node, index of the next dependency to visit)
            let mut stack = vec![(start, 0usize)];
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if let Some(&dependency) = self.dependencies[node].get(next) {
                    frame.1 += 1;
                    if !visited[dependency.0] {
                        visited[dependency.0] = true;
                        stack.push((dependency.0, 0));
                    }
                } else {
                    order.push(NodeId(node));
                    stack.pop();
                }
            }
        }
        order
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LoadNode> {
        self.nodes.iter()
    }

    /// Nodes that have failed, in insertion order.
    pub fn failures(&self) -> impl Iterator<Item = (&LoadNode, &LoadFailure)> {
        self.nodes
            .iter()
            .filter_map(|node| node.failure().map(|failure| (node, failure)))
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor(name: &str) -> ExtensionDescriptor {
        ExtensionDescriptor::new(name, 1, "create", PathBuf::from(format!("{name}.so")), Vec::new())
    }

    fn position(order: &[NodeId], id: NodeId) -> usize {
        order.iter().position(|&n| n == id).unwrap()
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let mut graph = DependencyGraph::new();
        let first = graph.add_node(descriptor("Door"));
        let second = graph.add_node(descriptor("door"));
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.find("DOOR"), Some(first));
    }

    #[test]
    fn test_node_identity_is_name() {
        let a = LoadNode::new(ExtensionDescriptor::new("x", 1, "a", PathBuf::from("a.so"), Vec::new()));
        let b = LoadNode::new(ExtensionDescriptor::new("X", 9, "b", PathBuf::from("b.so"), Vec::new()));
        assert_eq!(a, b);
        let set: HashSet<LoadNode> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(descriptor("a"));
        let b = graph.add_node(descriptor("b"));
        let c = graph.add_node(descriptor("c"));
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let err = graph.add_edge(c, a).unwrap_err();
        assert_eq!(
            err,
            GraphError::DependencyCycle {
                dependent: "c".to_string(),
                dependency: "a".to_string()
            }
        );
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.add_edge(a, a).is_err());
    }

    #[test]
    fn test_repeated_edge_ignored() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(descriptor("a"));
        let b = graph.add_node(descriptor("b"));
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, b).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependents_of(b), &[a]);
    }

    #[test]
    fn test_leaf_first_order() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_node(descriptor("app"));
        let mid = graph.add_node(descriptor("mid"));
        let base = graph.add_node(descriptor("base"));
        let lone = graph.add_node(descriptor("lone"));
        graph.add_edge(app, mid).unwrap();
        graph.add_edge(mid, base).unwrap();
        graph.add_edge(app, base).unwrap();

        let order = graph.leaf_first_order();
        assert_eq!(order.len(), 4);
        assert!(position(&order, base) < position(&order, mid));
        assert!(position(&order, mid) < position(&order, app));
        assert_eq!(order, vec![base, mid, app, lone]);
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(descriptor("a"));
        let b = graph.add_node(descriptor("b"));
        let c = graph.add_node(descriptor("c"));
        let d = graph.add_node(descriptor("d"));
        graph.add_edge(b, a).unwrap();
        graph.add_edge(c, b).unwrap();
        graph.add_edge(d, a).unwrap();
        graph.add_edge(d, c).unwrap();

        let dependents = graph.transitive_dependents(a);
        assert_eq!(dependents.len(), 3);
        assert!(dependents.contains(&b) && dependents.contains(&c) && dependents.contains(&d));
        assert!(graph.transitive_dependents(d).is_empty());
    }

    #[test]
    fn test_first_failure_kept() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(descriptor("a"));
        assert!(graph.node_mut(a).fail(LoadFailure::load_error("first")));
        assert!(!graph.node_mut(a).fail(LoadFailure::dependency_unavailable("second")));
        assert!(!graph.node_mut(a).mark_loaded());
        assert_eq!(graph.node(a).failure().unwrap().message(), "first");
        assert_eq!(graph.failures().count(), 1);
    }

    #[test]
    fn test_loaded_is_terminal() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(descriptor("a"));
        assert!(graph.node_mut(a).mark_loaded());
        assert!(!graph.node_mut(a).fail(LoadFailure::load_error("late")));
        assert!(graph.node(a).is_loaded());
    }
}
