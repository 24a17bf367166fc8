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

//! Pipeline orchestration
//!
//! Indexing: extract → parse → build graph → detect communities → summarize.
//! Querying: load summaries → map-reduce answer. The two only share the
//! summaries artifact, so they can run in separate processes.

use crate::artifacts;
use crate::config::{GraphRagConfig, StorageConfig};
use crate::error::{GraphRagError, Result};
use crate::knowledge_graph::communities::CommunityDetector;
use crate::knowledge_graph::entities::{
    Community, CommunitySummaryRecord, GraphStats, QueryAnswer, TextUnit,
};
use crate::knowledge_graph::extractor::{ExtractedBlock, ExtractorConfig, TripleExtractor};
use crate::knowledge_graph::graph::KnowledgeGraph;
use crate::knowledge_graph::leiden::CommunityPartitioner;
use crate::knowledge_graph::parser::RelationshipParser;
use crate::knowledge_graph::query::QueryAnswerer;
use crate::knowledge_graph::summarizer::{CommunitySummarizer, SUMMARY_FAILED};
use crate::llm::LLMClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters collected during one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingStats {
    pub units: usize,
    pub failed_extractions: usize,
    pub blocks_without_relationships: usize,
    pub triples: usize,
    pub malformed_lines: usize,
    pub graph: GraphStats,
    pub communities: usize,
    pub failed_summaries: usize,
}

/// Everything an indexing run produced, before persistence
#[derive(Debug, Clone)]
pub struct IndexingOutput {
    pub graph: KnowledgeGraph,
    pub communities: Vec<Community>,
    pub summaries: Vec<CommunitySummaryRecord>,
    pub stats: IndexingStats,
}

/// Where [`IndexingPipeline::persist`] wrote its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifacts {
    pub graph_path: PathBuf,
    pub summaries_path: PathBuf,
}

/// Runs extraction, graph building, community detection, and summarization
pub struct IndexingPipeline {
    extractor: TripleExtractor,
    parser: RelationshipParser,
    detector: CommunityDetector,
    summarizer: CommunitySummarizer,
    config: GraphRagConfig,
}

impl IndexingPipeline {
    pub fn new(config: GraphRagConfig, llm: Arc<dyn LLMClient>) -> Self {
        let detector = CommunityDetector::leiden(
            config.pipeline.leiden.clone(),
            config.pipeline.community_ordering,
        );
        Self::with_detector(config, llm, detector)
    }

    /// Use `partitioner` instead of Leiden
    pub fn with_partitioner(
        config: GraphRagConfig,
        llm: Arc<dyn LLMClient>,
        partitioner: Arc<dyn CommunityPartitioner>,
    ) -> Self {
        let detector = CommunityDetector::new(partitioner, config.pipeline.community_ordering);
        Self::with_detector(config, llm, detector)
    }

    fn with_detector(
        config: GraphRagConfig,
        llm: Arc<dyn LLMClient>,
        detector: CommunityDetector,
    ) -> Self {
        let request_timeout = Duration::from_secs(config.llm.request_timeout_secs);
        let extractor = TripleExtractor::with_config(
            ExtractorConfig {
                max_concurrency: config.pipeline.max_concurrency,
                request_timeout,
            },
            llm.clone(),
        );
        let summarizer =
            CommunitySummarizer::new(llm, config.pipeline.max_concurrency, request_timeout);

        Self {
            extractor,
            parser: RelationshipParser::new(),
            detector,
            summarizer,
            config,
        }
    }

    /// Run every indexing stage. Nothing is written to disk.
    pub async fn run(&self, units: &[TextUnit]) -> Result<IndexingOutput> {
        let start = Instant::now();
        info!(units = units.len(), "Starting indexing pipeline");

        let blocks = self.extractor.extract_all(units).await?;
        let (graph, mut stats) = self.build_graph(&blocks);

        let communities = self.detector.detect(&graph);
        let summaries = self.summarizer.summarize_all(&graph, &communities).await;

        stats.units = units.len();
        stats.communities = communities.len();
        stats.failed_summaries = summaries
            .iter()
            .filter(|r| r.summary == SUMMARY_FAILED)
            .count();

        info!(
            nodes = stats.graph.node_count,
            edges = stats.graph.edge_count,
            communities = stats.communities,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Indexing pipeline complete"
        );

        Ok(IndexingOutput {
            graph,
            communities,
            summaries,
            stats,
        })
    }

    /// Parse and fold blocks in unit order; the only writer to the graph
    fn build_graph(&self, blocks: &[ExtractedBlock]) -> (KnowledgeGraph, IndexingStats) {
        let mut graph = KnowledgeGraph::with_merge_policy(self.config.pipeline.edge_merge_policy);
        let mut stats = IndexingStats::default();

        for block in blocks {
            if block.failed {
                stats.failed_extractions += 1;
            }

            let parsed = self.parser.parse_block(&block.unit_id, &block.text);
            if !parsed.has_relationships {
                stats.blocks_without_relationships += 1;
            }
            stats.triples += parsed.triples.len();
            stats.malformed_lines += parsed.malformed;
            graph.add_triples(&parsed.triples);
        }

        stats.graph = graph.stats();
        info!(
            nodes = stats.graph.node_count,
            edges = stats.graph.edge_count,
            triples = stats.triples,
            "Knowledge graph built"
        );

        (graph, stats)
    }

    /// Write the graph and the summaries
    pub fn persist(output: &IndexingOutput, storage: &StorageConfig) -> Result<PersistedArtifacts> {
        let graph_path = storage.graph_path();
        let summaries_path = storage.summaries_path();

        artifacts::save_graph_gml(&graph_path, &output.graph)?;
        artifacts::save_summaries(&summaries_path, &output.summaries)?;

        Ok(PersistedArtifacts {
            graph_path,
            summaries_path,
        })
    }
}

/// Answers queries from persisted community summaries
pub struct QueryPipeline {
    answerer: QueryAnswerer,
}

impl QueryPipeline {
    pub fn new(config: &GraphRagConfig, llm: Arc<dyn LLMClient>) -> Self {
        Self {
            answerer: QueryAnswerer::new(
                llm,
                config.pipeline.max_concurrency,
                Duration::from_secs(config.llm.request_timeout_secs),
                config.pipeline.max_partial_answers,
            ),
        }
    }

    /// Load summaries from `summaries_path` and answer `query`.
    ///
    /// A blank query or a missing, invalid, or empty summaries file fails
    /// before any model call.
    pub async fn answer(&self, query: &str, summaries_path: &Path) -> Result<QueryAnswer> {
        if query.trim().is_empty() {
            return Err(GraphRagError::EmptyInput("query is blank".to_string()));
        }

        let records = artifacts::load_summaries(summaries_path)?;
        self.answerer.answer(query.trim(), &records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LLMError, PartitionError};
    use crate::knowledge_graph::extractor::ENTITY_EXTRACTION_PROMPT;
    use crate::knowledge_graph::graph::NodeId;
    use crate::knowledge_graph::leiden::ComponentGraph;
    use crate::llm::LLMResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Extraction answers come from the unit text; everything else is a fixed summary
    struct EchoLLM {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMClient for EchoLLM {
        async fn generate(
            &self,
            instruction: &str,
            content: &str,
        ) -> std::result::Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = if instruction == ENTITY_EXTRACTION_PROMPT {
                if content == "fail" {
                    return Err(LLMError::RateLimitExceeded);
                }
                content.to_string()
            } else {
                "A summary.".to_string()
            };
            Ok(LLMResponse {
                content: reply,
                model: "echo".to_string(),
                duration_ms: 0,
            })
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct WholeComponent;

    impl CommunityPartitioner for WholeComponent {
        fn partition(
            &self,
            component: &ComponentGraph,
        ) -> std::result::Result<Vec<Vec<NodeId>>, PartitionError> {
            Ok(vec![component.nodes().to_vec()])
        }
    }

    fn echo() -> Arc<EchoLLM> {
        Arc::new(EchoLLM {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_last_write_wins_in_unit_order() {
        let units = vec![
            TextUnit::new("0", "Relationships:\n- Alice -> knows -> Bob"),
            TextUnit::new("1", "fail"),
            TextUnit::new("2", "Relationships:\n- Bob -> married -> Alice\n- Bob -> -> Carol"),
        ];

        let pipeline = IndexingPipeline::with_partitioner(
            GraphRagConfig::default(),
            echo(),
            Arc::new(WholeComponent),
        );
        let output = pipeline.run(&units).await.unwrap();

        assert_eq!(output.graph.node_count(), 2);
        assert_eq!(output.graph.edges()[0].label(), "married");
        assert_eq!(output.stats.failed_extractions, 1);
        assert_eq!(output.stats.blocks_without_relationships, 1);
        assert_eq!(output.stats.triples, 2);
        assert_eq!(output.stats.malformed_lines, 1);
        assert_eq!(output.communities.len(), 1);
        assert_eq!(output.summaries[0].summary, "A summary.");
    }

    #[tokio::test]
    async fn test_empty_units_is_fatal_before_calls() {
        let llm = echo();
        let pipeline = IndexingPipeline::new(GraphRagConfig::default(), llm.clone());

        assert!(matches!(pipeline.run(&[]).await, Err(GraphRagError::EmptyInput(_))));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persist_writes_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let mut config = GraphRagConfig::default();
        config.storage.output_dir = dir.path().join("output");

        let pipeline = IndexingPipeline::new(config.clone(), echo());
        let output = pipeline
            .run(&[TextUnit::new("0", "Relationships:\n- Alice -> knows -> Bob")])
            .await
            .unwrap();

        let paths = IndexingPipeline::persist(&output, &config.storage).unwrap();
        assert!(paths.graph_path.exists());
        assert_eq!(artifacts::load_summaries(&paths.summaries_path).unwrap(), output.summaries);
    }

    #[tokio::test]
    async fn test_query_missing_summaries_is_fatal() {
        let dir = TempDir::new().unwrap();
        let llm = echo();
        let pipeline = QueryPipeline::new(&GraphRagConfig::default(), llm.clone());

        let result = pipeline.answer("Who?", &dir.path().join("none.json")).await;
        assert!(matches!(result, Err(GraphRagError::MissingInput(_))));

        let result = pipeline.answer("   ", &dir.path().join("none.json")).await;
        assert!(matches!(result, Err(GraphRagError::EmptyInput(_))));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}
