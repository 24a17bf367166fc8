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

//! Integration tests for indexing and querying

use async_trait::async_trait;
use graphrag_core::knowledge_graph::extractor::ENTITY_EXTRACTION_PROMPT;
use graphrag_core::knowledge_graph::query::NO_ANSWER;
use graphrag_core::{
    artifacts, GraphRagConfig, GraphRagError, IndexingPipeline, LLMClient, LLMError, LLMResponse,
    QueryPipeline, TextUnit,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

const EXAMPLE_BLOCK: &str = "Entities:
- Alice
- Bob

Relationships:
- Alice -> knows -> Bob
";

/// Scripted model that records which kind of call it served
struct CorpusLLM {
    relevant_term: &'static str,
    calls: Mutex<Vec<&'static str>>,
}

impl CorpusLLM {
    fn new(relevant_term: &'static str) -> Arc<Self> {
        Arc::new(Self {
            relevant_term,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn count(&self, kind: &str) -> usize {
        self.calls.lock().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl LLMClient for CorpusLLM {
    async fn generate(&self, instruction: &str, content: &str) -> Result<LLMResponse, LLMError> {
        let reply = if instruction == ENTITY_EXTRACTION_PROMPT {
            self.calls.lock().push("extract");
            match content {
                "Alice met Bob at the conference." => EXAMPLE_BLOCK.to_string(),
                "Carol mentors Dave." => {
                    "Entities:\n- Carol\n- Dave\n\nRelationships:\n- Carol -> mentors -> Dave\n"
                        .to_string()
                }
                _ => "Entities:\n- Nobody\n".to_string(),
            }
        } else if instruction.starts_with("Based on the following entities") {
            self.calls.lock().push("summarize");
            if instruction.contains("- Alice") {
                "Alice and Bob know each other.".to_string()
            } else {
                "Carol mentors Dave.".to_string()
            }
        } else if instruction.starts_with("You are answering") {
            self.calls.lock().push("map");
            if content.contains(self.relevant_term) {
                format!("{} appears in this community.\nScore: 80", self.relevant_term)
            } else {
                "NONE".to_string()
            }
        } else {
            self.calls.lock().push("reduce");
            "Alice knows Bob.".to_string()
        };

        Ok(LLMResponse {
            content: reply,
            model: "corpus".to_string(),
            duration_ms: 1,
        })
    }

    fn model_name(&self) -> &str {
        "corpus"
    }
}

fn config_in(dir: &TempDir) -> GraphRagConfig {
    let mut config = GraphRagConfig::default();
    config.storage.output_dir = dir.path().join("output");
    config.pipeline.leiden.seed = Some(42);
    config
}

/// The canonical block yields exactly Alice -knows- Bob
#[tokio::test]
async fn test_example_block_builds_expected_graph() {
    let dir = TempDir::new().unwrap();
    let llm = CorpusLLM::new("Alice");

    let pipeline = IndexingPipeline::new(config_in(&dir), llm.clone());
    let output = pipeline
        .run(&[TextUnit::new("0", "Alice met Bob at the conference.")])
        .await
        .unwrap();

    assert_eq!(output.graph.nodes(), &["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(output.graph.edge_count(), 1);
    assert_eq!(output.graph.edges()[0].endpoints, (0, 1));
    assert_eq!(output.graph.edges()[0].label(), "knows");
}

/// Index to disk, then answer from the persisted summaries only
#[tokio::test]
async fn test_index_then_query() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let llm = CorpusLLM::new("Alice");

    let units = vec![
        TextUnit::new("0", "Alice met Bob at the conference."),
        TextUnit::new("1", "Carol mentors Dave."),
        TextUnit::new("2", "Nothing of note."),
    ];

    let output = IndexingPipeline::new(config.clone(), llm.clone())
        .run(&units)
        .await
        .unwrap();
    assert_eq!(output.communities.len(), 2);
    assert_eq!(output.stats.blocks_without_relationships, 1);

    let paths = IndexingPipeline::persist(&output, &config.storage).unwrap();
    let gml = std::fs::read_to_string(&paths.graph_path).unwrap();
    assert!(gml.contains("label \"knows\""));
    assert!(gml.contains("label \"mentors\""));

    let records = artifacts::load_summaries(&paths.summaries_path).unwrap();
    assert_eq!(records, output.summaries);
    assert_eq!(records[0].nodes, vec!["Alice", "Bob"]);
    assert_eq!(records[1].summary, "Carol mentors Dave.");

    let answer = QueryPipeline::new(&config, llm.clone())
        .answer("Who does Alice know?", &paths.summaries_path)
        .await
        .unwrap();

    assert_eq!(answer.final_answer, "Alice knows Bob.");
    assert_eq!(answer.partials_used, 1);
    assert_eq!(answer.communities_consulted, 2);
    assert_eq!(llm.count("extract"), 3);
    assert_eq!(llm.count("summarize"), 2);
    assert_eq!(llm.count("map"), 2);
    assert_eq!(llm.count("reduce"), 1);
}

/// No community knows anything: fixed answer, no reduce call
#[tokio::test]
async fn test_query_without_relevant_communities() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let llm = CorpusLLM::new("Zebra");

    let output = IndexingPipeline::new(config.clone(), llm.clone())
        .run(&[TextUnit::new("0", "Alice met Bob at the conference.")])
        .await
        .unwrap();
    let paths = IndexingPipeline::persist(&output, &config.storage).unwrap();

    let answer = QueryPipeline::new(&config, llm.clone())
        .answer("Tell me about zebras", &paths.summaries_path)
        .await
        .unwrap();

    assert_eq!(answer.final_answer, NO_ANSWER);
    assert_eq!(llm.count("reduce"), 0);
}

/// Missing or empty summaries abort before any model call
#[tokio::test]
async fn test_query_setup_errors() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let llm = CorpusLLM::new("Alice");
    let pipeline = QueryPipeline::new(&config, llm.clone());

    let missing = pipeline
        .answer("anything", &config.storage.summaries_path())
        .await;
    assert!(matches!(missing, Err(GraphRagError::MissingInput(_))));

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "[]").unwrap();
    let result = pipeline.answer("anything", &empty).await;
    assert!(matches!(result, Err(GraphRagError::EmptySummaries(_))));

    assert!(llm.calls.lock().is_empty());
    assert!(!config.storage.output_dir.exists());
}
