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

//! Community Summarization
//!
//! Renders each community as an entity list plus the relationships that stay
//! inside it, then asks the model for a one-paragraph summary. Edges that
//! cross into another community are left out of the rendering.

use crate::knowledge_graph::entities::{Community, CommunitySummaryRecord};
use crate::knowledge_graph::graph::{KnowledgeGraph, NodeId};
use crate::llm::{generate_with_timeout, LLMClient};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Self-contained summary instruction; `{community_data}` is replaced by the rendering
pub const COMMUNITY_SUMMARY_PROMPT: &str = "\
Based on the following entities and relationships from a text community, write a concise, one-paragraph summary that captures the main topic of this community.

Data:
{community_data}

Summary:
";

/// Summary stored for a community whose call failed
pub const SUMMARY_FAILED: &str = "Error: Failed to generate summary.";

/// Render a community as `Entities:` and `Relationships:` sections
pub fn render_community(graph: &KnowledgeGraph, community: &Community) -> String {
    let members: HashSet<NodeId> = community
        .nodes
        .iter()
        .filter_map(|name| graph.node_id(name))
        .collect();

    let mut out = String::from("Entities:\n");
    for node in &community.nodes {
        let _ = writeln!(out, "- {}", node);
    }

    out.push_str("\nRelationships:\n");
    for edge in graph.induced_edges(&members) {
        for relation in &edge.relations {
            let (Some(source), Some(target)) = (
                graph.node_name(relation.source),
                graph.node_name(relation.target),
            ) else {
                continue;
            };
            let _ = writeln!(out, "- {} -> {} -> {}", source, relation.label, target);
        }
    }

    out
}

/// Summarizes communities through the LLM capability
pub struct CommunitySummarizer {
    llm: Arc<dyn LLMClient>,
    max_concurrency: usize,
    request_timeout: Duration,
}

impl CommunitySummarizer {
    pub fn new(llm: Arc<dyn LLMClient>, max_concurrency: usize, request_timeout: Duration) -> Self {
        Self {
            llm,
            max_concurrency: max_concurrency.max(1),
            request_timeout,
        }
    }

    /// One record per community, in the order given
    pub async fn summarize_all(
        &self,
        graph: &KnowledgeGraph,
        communities: &[Community],
    ) -> Vec<CommunitySummaryRecord> {
        info!(communities = communities.len(), "Summarizing communities");

        let records: Vec<CommunitySummaryRecord> = stream::iter(communities)
            .map(|community| self.summarize_one(graph, community))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let failed = records.iter().filter(|r| r.summary == SUMMARY_FAILED).count();
        info!(
            communities = records.len(),
            failed,
            "Finished summarizing communities"
        );

        records
    }

    async fn summarize_one(
        &self,
        graph: &KnowledgeGraph,
        community: &Community,
    ) -> CommunitySummaryRecord {
        let rendered = render_community(graph, community);
        let prompt = COMMUNITY_SUMMARY_PROMPT.replace("{community_data}", rendered.trim_end());

        let summary =
            match generate_with_timeout(self.llm.as_ref(), &prompt, "", self.request_timeout).await
            {
                Ok(summary) => {
                    debug!(community = community.id, "Community summary: {}", summary);
                    summary.trim().to_string()
                }
                Err(e) => {
                    error!(community = community.id, "Failed to summarize community: {}", e);
                    SUMMARY_FAILED.to_string()
                }
            };

        CommunitySummaryRecord {
            community_id: community.id,
            nodes: community.nodes.clone(),
            summary,
        }
    }
}
