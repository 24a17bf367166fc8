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

//! Triple Extraction using LLM
//!
//! Sends every text unit to the model with [`ENTITY_EXTRACTION_PROMPT`] and
//! keeps the raw answer. Parsing happens later, in unit order, so the graph
//! is folded by a single writer no matter how calls interleave.
//!
//! ## Extraction Process
//!
//! 1. Issue one call per unit, at most `max_concurrency` in flight
//! 2. Apply the per-call timeout
//! 3. Replace a failed call with [`EXTRACTION_FAILED`]
//! 4. Yield blocks in unit order

use crate::error::{GraphRagError, Result};
use crate::knowledge_graph::entities::TextUnit;
use crate::llm::{generate_with_timeout, LLMClient};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Instruction sent with every text unit
pub const ENTITY_EXTRACTION_PROMPT: &str = "\
Extract all entities and their relationships from the text.
Respond in the following format, and only this format:

Entities:
- <Entity 1>
- <Entity 2>
...

Relationships:
- <Entity 1> -> <Relationship> -> <Entity 2>
- <Entity 3> -> <Relationship> -> <Entity 4>
...
";

/// Stand-in block for a unit whose call failed. Carries no relationships.
pub const EXTRACTION_FAILED: &str = "Error: Failed to extract elements.";

/// Raw model output for one text unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub unit_id: String,
    pub text: String,
    pub failed: bool,
}

/// Configuration for the triple extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Maximum calls in flight
    pub max_concurrency: usize,
    /// Deadline for a single call
    pub request_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Triple extractor using the LLM capability
pub struct TripleExtractor {
    config: ExtractorConfig,
    llm: Arc<dyn LLMClient>,
}

impl TripleExtractor {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self::with_config(ExtractorConfig::default(), llm)
    }

    pub fn with_config(config: ExtractorConfig, llm: Arc<dyn LLMClient>) -> Self {
        Self { config, llm }
    }

    /// Extract one block per unit, in unit order.
    ///
    /// Fails only when `units` is empty, before any call is made.
    pub async fn extract_all(&self, units: &[TextUnit]) -> Result<Vec<ExtractedBlock>> {
        if units.is_empty() {
            return Err(GraphRagError::EmptyInput("no text units to index".to_string()));
        }

        info!(
            units = units.len(),
            concurrency = self.config.max_concurrency,
            model = self.llm.model_name(),
            "Extracting entities and relationships"
        );

        let blocks: Vec<ExtractedBlock> = stream::iter(units)
            .map(|unit| self.extract_one(unit))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let failed = blocks.iter().filter(|b| b.failed).count();
        info!(
            units = blocks.len(),
            failed,
            "Finished extracting entities and relationships"
        );

        Ok(blocks)
    }

    async fn extract_one(&self, unit: &TextUnit) -> ExtractedBlock {
        match generate_with_timeout(
            self.llm.as_ref(),
            ENTITY_EXTRACTION_PROMPT,
            &unit.text,
            self.config.request_timeout,
        )
        .await
        {
            Ok(text) => {
                debug!(unit = %unit.id, "Unit elements:\n{}", text);
                ExtractedBlock {
                    unit_id: unit.id.clone(),
                    text,
                    failed: false,
                }
            }
            Err(e) => {
                error!(unit = %unit.id, "Extraction failed: {}", e);
                ExtractedBlock {
                    unit_id: unit.id.clone(),
                    text: EXTRACTION_FAILED.to_string(),
                    failed: true,
                }
            }
        }
    }
}
