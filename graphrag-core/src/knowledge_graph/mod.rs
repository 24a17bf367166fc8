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

//! Knowledge Graph Module
//!
//! GraphRAG indexing and querying:
//! - Triple extraction from text units using LLM
//! - Tolerant parsing of the model's relationship lists
//! - Leiden community detection per connected component
//! - Community summaries and map-reduce global answers
//!
//! ## Architecture
//!
//! ```text
//! Text Units → Extraction → Relationship Parsing → Knowledge Graph
//!                 ↓                                      ↓
//!               (LLM)                            (Leiden Clusters)
//!                                                        ↓
//!                           Global Answer  ←  Community Summaries
//! ```
//!
//! ## Triple Format
//!
//! The model lists relationships as `- <source> -> <relation> -> <target>`:
//! - `- Alice -> knows -> Bob`
//! - `- Acme Corp -> acquired -> Widget Co`

pub mod communities;
pub mod entities;
pub mod extractor;
pub mod graph;
pub mod leiden;
pub mod parser;
pub mod query;
pub mod summarizer;

pub use communities::CommunityDetector;
pub use entities::*;
pub use extractor::{ExtractedBlock, TripleExtractor};
pub use graph::KnowledgeGraph;
pub use leiden::{CommunityPartitioner, ComponentGraph, LeidenClustering};
pub use parser::{LineClass, RelationshipParser};
pub use query::QueryAnswerer;
pub use summarizer::CommunitySummarizer;
