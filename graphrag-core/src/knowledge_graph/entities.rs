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

//! Entity and Relationship Types
//!
//! Defines the core types for the knowledge graph.

use serde::{Deserialize, Serialize};

/// A chunk of the input corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    pub text: String,
}

impl TextUnit {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A (source, relation, target) triple. Every field is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl Triple {
    /// Create a new triple, trimming each field
    ///
    /// Returns `None` when any field is empty after trimming.
    pub fn new(source: &str, relation: &str, target: &str) -> Option<Self> {
        let (source, relation, target) = (source.trim(), relation.trim(), target.trim());
        if source.is_empty() || relation.is_empty() || target.is_empty() {
            return None;
        }

        Some(Self {
            source: source.to_string(),
            relation: relation.to_string(),
            target: target.to_string(),
        })
    }
}

/// A community of nodes produced by one detection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Sequential id in detection order
    pub id: u32,
    /// Member node names in stored order
    pub nodes: Vec<String>,
}

impl Community {
    pub fn new(id: u32, nodes: Vec<String>) -> Self {
        Self { id, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Persisted hand-off between indexing and querying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySummaryRecord {
    pub community_id: u32,
    pub nodes: Vec<String>,
    pub summary: String,
}

/// Result of one global query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub query: String,
    pub final_answer: String,
    /// Non-empty partial answers fed to the reduce call
    #[serde(default)]
    pub partials_used: usize,
    /// Communities asked during the map phase
    #[serde(default)]
    pub communities_consulted: usize,
}

/// Statistics about the knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
}
