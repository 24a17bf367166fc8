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

//! Community Detection
//!
//! Splits the graph into connected components and partitions each one
//! separately. Whatever the partitioner does, every node ends up in exactly
//! one community: a failed or invalid partition turns the whole component
//! into a single community.

use crate::config::{CommunityOrdering, LeidenSettings};
use crate::error::PartitionError;
use crate::knowledge_graph::entities::Community;
use crate::knowledge_graph::graph::{KnowledgeGraph, NodeId};
use crate::knowledge_graph::leiden::{CommunityPartitioner, ComponentGraph, LeidenClustering};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Partitions a graph into communities, one component at a time
pub struct CommunityDetector {
    partitioner: Arc<dyn CommunityPartitioner>,
    ordering: CommunityOrdering,
}

impl CommunityDetector {
    pub fn new(partitioner: Arc<dyn CommunityPartitioner>, ordering: CommunityOrdering) -> Self {
        Self {
            partitioner,
            ordering,
        }
    }

    /// Detector backed by [`LeidenClustering`]
    pub fn leiden(settings: LeidenSettings, ordering: CommunityOrdering) -> Self {
        Self::new(Arc::new(LeidenClustering::with_config(settings)), ordering)
    }

    /// Detect communities. Ids are assigned sequentially after ordering.
    pub fn detect(&self, graph: &KnowledgeGraph) -> Vec<Community> {
        let components = graph.connected_components();
        let mut groups: Vec<Vec<NodeId>> = Vec::new();
        let mut fallbacks = 0usize;

        for (index, component) in components.iter().enumerate() {
            let view = ComponentGraph::from_graph(graph, component);
            let result = self
                .partitioner
                .partition(&view)
                .and_then(|parts| validate_cover(component, parts));

            match result {
                Ok(parts) => {
                    debug!(
                        component = index,
                        nodes = component.len(),
                        communities = parts.len(),
                        "Partitioned component"
                    );
                    groups.extend(parts);
                }
                Err(e) => {
                    warn!(
                        component = index,
                        nodes = component.len(),
                        "Partition failed ({}), using whole component as one community",
                        e
                    );
                    fallbacks += 1;
                    groups.push(component.clone());
                }
            }
        }

        let mut named: Vec<Vec<String>> = groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .filter_map(|id| graph.node_name(id).map(str::to_string))
                    .collect()
            })
            .collect();

        if self.ordering == CommunityOrdering::Lexicographic {
            for members in named.iter_mut() {
                members.sort();
            }
            named.sort_by(|a, b| a.first().cmp(&b.first()));
        }

        let communities: Vec<Community> = named
            .into_iter()
            .enumerate()
            .map(|(id, nodes)| Community::new(id as u32, nodes))
            .collect();

        info!(
            components = components.len(),
            communities = communities.len(),
            fallbacks,
            "Community detection complete"
        );

        communities
    }
}

/// Check that `parts` is a non-overlapping cover of `component` with no empty part
fn validate_cover(
    component: &[NodeId],
    parts: Vec<Vec<NodeId>>,
) -> Result<Vec<Vec<NodeId>>, PartitionError> {
    let expected: HashSet<NodeId> = component.iter().copied().collect();
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(expected.len());

    for part in &parts {
        if part.is_empty() {
            return Err(PartitionError::InvalidCover("empty community".to_string()));
        }
        for id in part {
            if !expected.contains(id) {
                return Err(PartitionError::InvalidCover(format!(
                    "node {} is outside the component",
                    id
                )));
            }
            if !seen.insert(*id) {
                return Err(PartitionError::InvalidCover(format!(
                    "node {} assigned twice",
                    id
                )));
            }
        }
    }

    if seen.len() != expected.len() {
        return Err(PartitionError::InvalidCover(format!(
            "{} of {} nodes assigned",
            seen.len(),
            expected.len()
        )));
    }

    Ok(parts)
}
