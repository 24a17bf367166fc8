// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Leiden Community Detection Algorithm
//!
//! Partitions one connected component at a time. Leiden is an improvement
//! over Louvain that ensures well-connected communities through an
//! intermediate refinement phase.
//!
//! ## Algorithm Overview
//!
//! 1. **Local Moving Phase**: Move nodes between communities to maximize modularity
//! 2. **Refinement Phase**: Merge singletons only inside their community, and only
//!    along edges, so every refined community is connected
//! 3. **Aggregation Phase**: Create super-nodes from refined communities, seeded
//!    with the unrefined partition
//! 4. **Repeat**: Until every super-node is its own community
//!
//! ## Modularity
//!
//! Q = (1/2m) * Σij[Aij - γ * (ki*kj)/(2m)] * δ(ci, cj)
//!
//! Where:
//! - Aij = edge weight between i and j
//! - ki, kj = degree of nodes i, j
//! - m = total edge weight
//! - γ = resolution
//! - δ(ci, cj) = 1 if nodes in same community
//!
//! Reference: Traag et al., "From Louvain to Leiden: guaranteeing well-connected communities"
//! https://www.nature.com/articles/s41598-019-41695-z

use crate::config::LeidenSettings;
use crate::error::PartitionError;
use crate::knowledge_graph::graph::{KnowledgeGraph, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Splits one connected component into communities.
///
/// Implementations must return a non-overlapping cover of
/// `component.nodes()`, or an error. The detector validates the cover and
/// falls back to a single community on any failure.
pub trait CommunityPartitioner: Send + Sync {
    fn partition(&self, component: &ComponentGraph) -> Result<Vec<Vec<NodeId>>, PartitionError>;
}

/// Weighted undirected network over local indices `0..n`
#[derive(Debug, Clone, Default)]
struct Network {
    /// Neighbors excluding self, sorted, each with its edge weight
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degrees: Vec<f64>,
    /// m: sum of all edge weights, self loops included
    total_weight: f64,
}

impl Network {
    fn new(adjacency: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>) -> Self {
        let degrees: Vec<f64> = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(row, &loop_weight)| row.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * loop_weight)
            .collect();
        let total_weight = degrees.iter().sum::<f64>() / 2.0;

        Self {
            adjacency,
            self_loops,
            degrees,
            total_weight,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse nodes sharing an id in `assignment` into one super-node
    fn aggregate(&self, assignment: &[usize], count: usize) -> Self {
        let mut weights: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_loops = vec![0.0; count];

        for (i, row) in self.adjacency.iter().enumerate() {
            let ci = assignment[i];
            self_loops[ci] += self.self_loops[i];

            for &(j, w) in row {
                if i >= j {
                    continue;
                }
                let cj = assignment[j];
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    *weights[ci].entry(cj).or_default() += w;
                    *weights[cj].entry(ci).or_default() += w;
                }
            }
        }

        let adjacency = weights
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect();

        Self::new(adjacency, self_loops)
    }
}

/// One connected component prepared for partitioning
#[derive(Debug, Clone, Default)]
pub struct ComponentGraph {
    nodes: Vec<NodeId>,
    network: Network,
}

impl ComponentGraph {
    /// Unit-weight view of `members` inside `graph`
    pub fn from_graph(graph: &KnowledgeGraph, members: &[NodeId]) -> Self {
        let local: HashMap<NodeId, usize> = members
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        let mut adjacency = vec![Vec::new(); members.len()];
        let mut self_loops = vec![0.0; members.len()];

        for (i, &id) in members.iter().enumerate() {
            for neighbor in graph.neighbors(id) {
                if *neighbor == id {
                    self_loops[i] = 1.0;
                } else if let Some(&j) = local.get(neighbor) {
                    adjacency[i].push((j, 1.0));
                }
            }
            adjacency[i].sort_by_key(|&(j, _)| j);
        }

        Self {
            nodes: members.to_vec(),
            network: Network::new(adjacency, self_loops),
        }
    }

    /// Build from explicit undirected edges over local indices
    pub fn from_edges(nodes: Vec<NodeId>, edges: &[(usize, usize, f64)]) -> Self {
        let mut adjacency: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); nodes.len()];
        let mut self_loops = vec![0.0; nodes.len()];

        for &(a, b, w) in edges {
            if a == b {
                self_loops[a] += w;
            } else {
                *adjacency[a].entry(b).or_default() += w;
                *adjacency[b].entry(a).or_default() += w;
            }
        }

        Self {
            nodes,
            network: Network::new(
                adjacency.into_iter().map(|row| row.into_iter().collect()).collect(),
                self_loops,
            ),
        }
    }

    /// Global node ids, indexed by local position
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.network.total_weight
    }

    /// Modularity of `membership` (community per local index)
    pub fn modularity(&self, membership: &[usize], resolution: f64) -> f64 {
        let m = self.network.total_weight;
        if m == 0.0 {
            return 0.0;
        }

        let mut internal: HashMap<usize, f64> = HashMap::new();
        let mut totals: HashMap<usize, f64> = HashMap::new();

        for (i, row) in self.network.adjacency.iter().enumerate() {
            let ci = membership[i];
            *totals.entry(ci).or_default() += self.network.degrees[i];
            *internal.entry(ci).or_default() += self.network.self_loops[i];
            for &(j, w) in row {
                if i < j && membership[j] == ci {
                    *internal.entry(ci).or_default() += w;
                }
            }
        }

        totals
            .iter()
            .map(|(c, &tot)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                inside / m - resolution * (tot / (2.0 * m)).powi(2)
            })
            .sum()
    }
}

/// Leiden community detection algorithm
pub struct LeidenClustering {
    config: LeidenSettings,
}

impl LeidenClustering {
    /// Create new Leiden clustering with default config
    pub fn new() -> Self {
        Self {
            config: LeidenSettings::default(),
        }
    }

    /// Create with custom config
    pub fn with_config(config: LeidenSettings) -> Self {
        Self { config }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Local moving phase: move nodes to maximize modularity gain.
    /// `partition` ids must be below `net.len()`.
    fn local_moving_phase<R: Rng>(
        &self,
        net: &Network,
        partition: &mut [usize],
        rng: &mut R,
    ) -> bool {
        let n = net.len();
        let two_m = 2.0 * net.total_weight;
        let resolution = self.config.resolution;

        let mut community_degree = vec![0.0; n];
        for (i, &c) in partition.iter().enumerate() {
            community_degree[c] += net.degrees[i];
        }

        let mut neighbor_weight = vec![0.0; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut order: Vec<usize> = (0..n).collect();
        let mut improved = false;

        for _sweep in 0..self.config.max_iterations {
            order.shuffle(rng);
            let mut moved = false;

            for &node in &order {
                let current = partition[node];
                let degree = net.degrees[node];

                for &(neighbor, w) in &net.adjacency[node] {
                    let c = partition[neighbor];
                    if neighbor_weight[c] == 0.0 {
                        touched.push(c);
                    }
                    neighbor_weight[c] += w;
                }

                community_degree[current] -= degree;
                let stay_gain = neighbor_weight[current]
                    - resolution * community_degree[current] * degree / two_m;

                let mut best = current;
                let mut best_gain = stay_gain;
                for &c in &touched {
                    if c == current {
                        continue;
                    }
                    let gain =
                        neighbor_weight[c] - resolution * community_degree[c] * degree / two_m;
                    if gain > best_gain {
                        best_gain = gain;
                        best = c;
                    }
                }

                // Gains are in edge-weight units; divide by m for ΔQ
                if best != current
                    && (best_gain - stay_gain) / net.total_weight > self.config.min_improvement
                {
                    partition[node] = best;
                    moved = true;
                } else {
                    best = current;
                }
                community_degree[best] += degree;

                for c in touched.drain(..) {
                    neighbor_weight[c] = 0.0;
                }
            }

            if !moved {
                break;
            }
            improved = true;
        }

        improved
    }

    /// Refinement phase: ensure communities are well-connected (Leiden improvement)
    ///
    /// Every node starts as a singleton. A singleton may join a neighboring
    /// refined community inside its own community when that increases
    /// modularity, so refined communities stay connected.
    fn refinement_phase<R: Rng>(
        &self,
        net: &Network,
        partition: &[usize],
        rng: &mut R,
    ) -> Vec<usize> {
        let n = net.len();
        let two_m = 2.0 * net.total_weight;
        let resolution = self.config.resolution;

        let mut refined: Vec<usize> = (0..n).collect();
        let mut refined_degree = net.degrees.clone();
        let mut singleton = vec![true; n];

        let mut neighbor_weight = vec![0.0; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        for &node in &order {
            if !singleton[node] {
                continue;
            }
            let degree = net.degrees[node];

            for &(neighbor, w) in &net.adjacency[node] {
                if partition[neighbor] != partition[node] {
                    continue;
                }
                let c = refined[neighbor];
                if neighbor_weight[c] == 0.0 {
                    touched.push(c);
                }
                neighbor_weight[c] += w;
            }

            let mut best = refined[node];
            let mut best_gain = 0.0;
            for &c in &touched {
                if c == refined[node] {
                    continue;
                }
                let gain = neighbor_weight[c] - resolution * refined_degree[c] * degree / two_m;
                if gain > best_gain {
                    best_gain = gain;
                    best = c;
                }
            }

            if best != refined[node] {
                refined_degree[refined[node]] -= degree;
                refined_degree[best] += degree;
                refined[node] = best;
                // Community ids start as node ids; `best` is still home to node `best`
                singleton[node] = false;
                singleton[best] = false;
            }

            for c in touched.drain(..) {
                neighbor_weight[c] = 0.0;
            }
        }

        refined
    }

    /// Run Leiden and return community index per local node
    fn detect(&self, component: &ComponentGraph) -> Vec<usize> {
        let n = component.len();
        let mut rng = self.rng();

        let mut net = component.network.clone();
        let mut partition: Vec<usize> = (0..n).collect();
        let mut node_to_aggregate: Vec<usize> = (0..n).collect();

        for level in 0..self.config.max_iterations {
            self.local_moving_phase(&net, &mut partition, &mut rng);
            let communities = renumber_communities(&mut partition);

            if communities == net.len() {
                debug!(level, communities, "Leiden converged");
                break;
            }

            let mut refined = self.refinement_phase(&net, &partition, &mut rng);
            let mut refined_count = renumber_communities(&mut refined);
            if refined_count == net.len() {
                // Nothing merged; aggregate the unrefined partition so the level shrinks
                refined = partition.clone();
                refined_count = communities;
            }

            let mut next_partition = vec![0; refined_count];
            for (v, &r) in refined.iter().enumerate() {
                next_partition[r] = partition[v];
            }
            for aggregate in node_to_aggregate.iter_mut() {
                *aggregate = refined[*aggregate];
            }

            net = net.aggregate(&refined, refined_count);
            partition = next_partition;
        }

        let mut membership: Vec<usize> = node_to_aggregate.iter().map(|&a| partition[a]).collect();
        renumber_communities(&mut membership);
        membership
    }
}

impl CommunityPartitioner for LeidenClustering {
    fn partition(&self, component: &ComponentGraph) -> Result<Vec<Vec<NodeId>>, PartitionError> {
        if component.is_empty() {
            return Err(PartitionError::EmptyComponent);
        }
        if component.total_weight() <= 0.0 {
            return Err(PartitionError::NoEdges);
        }

        let membership = self.detect(component);
        let count = membership.iter().max().map_or(0, |&c| c + 1);

        let mut groups: Vec<Vec<NodeId>> = vec![Vec::new(); count];
        for (local, &c) in membership.iter().enumerate() {
            groups[c].push(component.nodes[local]);
        }

        debug!(
            nodes = component.len(),
            communities = count,
            modularity = component.modularity(&membership, self.config.resolution),
            "Partitioned component"
        );

        Ok(groups)
    }
}

impl Default for LeidenClustering {
    fn default() -> Self {
        Self::new()
    }
}

/// Renumber communities to be contiguous in first-appearance order
fn renumber_communities(communities: &mut [usize]) -> usize {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    for c in communities.iter_mut() {
        let next_id = mapping.len();
        *c = *mapping.entry(*c).or_insert(next_id);
    }
    mapping.len()
}
