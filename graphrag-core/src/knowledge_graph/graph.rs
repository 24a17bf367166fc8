// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Knowledge Graph
//!
//! Undirected accumulator for extracted triples:
//! - Nodes keyed by exact (trimmed) name, kept in insertion order
//! - One edge per unordered node pair, merged by [`EdgeMergePolicy`]
//! - Connected components in insertion order for community detection
//!
//! The graph has a single owner. Parallel extraction feeds it through one
//! consumer so that the merge order equals the text-unit order.

use crate::config::EdgeMergePolicy;
use crate::knowledge_graph::entities::{GraphStats, Triple};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::info;

/// Index of a node in insertion order
pub type NodeId = usize;

/// One observed relationship on an edge, with its original direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
}

/// Edge in the knowledge graph (unordered pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Endpoints in first-insertion orientation
    pub endpoints: (NodeId, NodeId),
    /// Exactly one entry under `Overwrite`
    pub relations: Vec<Relation>,
}

impl GraphEdge {
    /// Label attribute as persisted
    pub fn label(&self) -> String {
        self.relations
            .iter()
            .map(|r| r.label.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Undirected knowledge graph built from triples
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    nodes: Vec<String>,
    node_index: HashMap<String, NodeId>,
    edges: Vec<GraphEdge>,
    /// Unordered pair (low, high) -> position in `edges`
    edge_index: HashMap<(NodeId, NodeId), usize>,
    adjacency: Vec<Vec<NodeId>>,
    merge_policy: EdgeMergePolicy,
}

fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl KnowledgeGraph {
    /// Create a new empty graph with last-write-wins edges
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_policy(merge_policy: EdgeMergePolicy) -> Self {
        Self {
            merge_policy,
            ..Default::default()
        }
    }

    /// Fold `triples` in order into a fresh graph
    pub fn from_triples<'a>(
        triples: impl IntoIterator<Item = &'a Triple>,
        merge_policy: EdgeMergePolicy,
    ) -> Self {
        let mut graph = Self::with_merge_policy(merge_policy);
        for triple in triples {
            graph.add_triple(triple);
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Knowledge graph built"
        );
        graph
    }

    /// Get or create a node by exact name
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.node_index.get(name) {
            return id;
        }

        let id = self.nodes.len();
        self.nodes.push(name.to_string());
        self.node_index.insert(name.to_string(), id);
        self.adjacency.push(Vec::new());
        id
    }

    /// Add a triple: both nodes, then insert or merge the edge
    pub fn add_triple(&mut self, triple: &Triple) {
        let source = self.add_node(&triple.source);
        let target = self.add_node(&triple.target);
        let relation = Relation {
            source,
            target,
            label: triple.relation.clone(),
        };

        let key = pair_key(source, target);
        match self.edge_index.get(&key) {
            Some(&pos) => {
                let edge = &mut self.edges[pos];
                match self.merge_policy {
                    EdgeMergePolicy::Overwrite => {
                        edge.relations.clear();
                        edge.relations.push(relation);
                    }
                    EdgeMergePolicy::Accumulate => {
                        // Distinct by label; a restated label keeps its first direction
                        if !edge.relations.iter().any(|r| r.label == relation.label) {
                            edge.relations.push(relation);
                        }
                    }
                }
            }
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(GraphEdge {
                    endpoints: (source, target),
                    relations: vec![relation],
                });
                self.adjacency[source].push(target);
                if source != target {
                    self.adjacency[target].push(source);
                }
            }
        }
    }

    /// Add multiple triples in order
    pub fn add_triples(&mut self, triples: &[Triple]) {
        for triple in triples {
            self.add_triple(triple);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in insertion order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(String::as_str)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    /// Neighbors in first-connection order (a self-loop lists the node itself)
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&GraphEdge> {
        self.edge_index
            .get(&pair_key(a, b))
            .map(|&pos| &self.edges[pos])
    }

    /// Connected components.
    ///
    /// Components appear in the insertion order of their first node; members
    /// appear in breadth-first order from that node.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut components = Vec::new();

        for start in 0..self.nodes.len() {
            if seen[start] {
                continue;
            }

            seen[start] = true;
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &neighbor in &self.adjacency[node] {
                    if !seen[neighbor] {
                        seen[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }

            components.push(component);
        }

        components
    }

    /// Edges whose both endpoints lie in `members`, in insertion order
    pub fn induced_edges(&self, members: &HashSet<NodeId>) -> Vec<&GraphEdge> {
        self.edges
            .iter()
            .filter(|e| members.contains(&e.endpoints.0) && members.contains(&e.endpoints.1))
            .collect()
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            component_count: self.connected_components().len(),
        }
    }
}
