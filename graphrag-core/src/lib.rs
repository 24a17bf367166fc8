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

//! GraphRAG Core
//!
//! Builds a knowledge graph from text with an LLM, groups it into Leiden
//! communities, summarizes each community, and answers global questions by
//! map-reduce over the summaries.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod knowledge_graph;
pub mod llm;
pub mod pipeline;

pub use config::{
    CommunityOrdering, EdgeMergePolicy, GraphRagConfig, LLMConfig, LeidenSettings, PipelineConfig,
    StorageConfig,
};
pub use error::{GraphRagError, LLMError, PartitionError, Result};
pub use knowledge_graph::{
    Community, CommunityDetector, CommunitySummarizer, CommunitySummaryRecord, KnowledgeGraph,
    QueryAnswer, QueryAnswerer, RelationshipParser, TextUnit, Triple,
};
pub use llm::{build_client, LLMClient, LLMResponse};
pub use pipeline::{
    IndexingOutput, IndexingPipeline, IndexingStats, PersistedArtifacts, QueryPipeline,
};
