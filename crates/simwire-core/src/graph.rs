use crate::id::NodeId;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, VecDeque};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("dependency cycle detected among components: {}", .members.join(", "))]
    CycleDetected { members: Vec<String> },
    #[error("component declared twice in dependency graph: {0}")]
    DuplicateNode(String),
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Adjacency lists for a single node.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    /// Nodes this node reads from.
    inputs: Vec<NodeId>,
    /// Nodes that read from this node.
    outputs: Vec<NodeId>,
}

/// Per-node data stored in the dependency graph.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The component's key in its vehicle.
    pub name: String,
}

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Directed graph of components. An edge `a -> b` means `b` reads from `a`,
/// so `a` must be constructed first.
///
/// Adjacency is stored in a `SecondaryMap` keyed by `NodeId`, which keeps it
/// in lockstep with the primary `nodes` SlotMap.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: SlotMap<NodeId, NodeData>,
    adjacency: SecondaryMap<NodeId, NodeAdjacency>,
    by_name: HashMap<String, NodeId>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Create a new, empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named node. Names are unique within one graph.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId, GraphError> {
        if self.by_name.contains_key(name) {
            return Err(GraphError::DuplicateNode(name.to_string()));
        }
        let id = self.nodes.insert(NodeData {
            name: name.to_string(),
        });
        self.adjacency.insert(id, NodeAdjacency::default());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Record that `to` depends on `from`.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::NodeNotFound(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(GraphError::NodeNotFound(to));
        }
        if let Some(adj) = self.adjacency.get_mut(from) {
            adj.outputs.push(to);
        }
        if let Some(adj) = self.adjacency.get_mut(to) {
            adj.inputs.push(from);
        }
        self.edge_count += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn get_node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node)
    }

    /// Nodes that `node` reads from.
    pub fn get_inputs(&self, node: NodeId) -> &[NodeId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes that read from `node`.
    pub fn get_outputs(&self, node: NodeId) -> &[NodeId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.outputs.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    // -----------------------------------------------------------------------
    // Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------

    /// Compute a construction order. Ties are broken by insertion order, so
    /// the result is deterministic for a given sequence of `add_node` calls.
    ///
    /// Returns `CycleDetected` naming every node that could not be ordered.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let node_count = self.nodes.len();

        // Compute in-degree for each node.
        let mut in_degree: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        for (nid, _) in &self.nodes {
            in_degree.insert(nid, self.get_inputs(nid).len());
        }

        // Seed the queue with all zero-in-degree nodes.
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for (nid, _) in &self.nodes {
            if in_degree.get(nid) == Some(&0) {
                queue.push_back(nid);
            }
        }

        let mut order: Vec<NodeId> = Vec::with_capacity(node_count);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &dest in self.get_outputs(node) {
                if let Some(deg) = in_degree.get_mut(dest) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dest);
                    }
                }
            }
        }

        if order.len() != node_count {
            let mut members: Vec<String> = in_degree
                .iter()
                .filter(|&(_, &deg)| deg > 0)
                .filter_map(|(nid, _)| self.nodes.get(nid).map(|n| n.name.clone()))
                .collect();
            members.sort();
            return Err(GraphError::CycleDetected { members });
        }

        Ok(order)
    }
}
