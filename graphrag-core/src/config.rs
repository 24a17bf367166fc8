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

use crate::error::{GraphRagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// GraphRAG configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GraphRagConfig {
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LLMConfig {
    /// Provider ID ("ollama", "openai", "anthropic")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use for every call (provider default when unset)
    pub model: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible base URL (e.g., a local vLLM server)
    pub openai_base_url: Option<String>,

    /// Anthropic API key
    pub anthropic_api_key: Option<String>,

    /// Ollama base URL (e.g., "http://localhost:11434")
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            openai_api_key: None,
            openai_base_url: None,
            anthropic_api_key: None,
            ollama_base_url: default_ollama_base_url(),
            request_timeout_secs: default_request_timeout(),
            temperature: 0.0,
        }
    }
}

/// How repeated triples for the same node pair are folded into one edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMergePolicy {
    /// Last write wins
    #[default]
    Overwrite,
    /// Keep every distinct label in first-seen order
    Accumulate,
}

/// Order in which detected communities receive their ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityOrdering {
    /// Component insertion order, members in traversal order
    #[default]
    Insertion,
    /// Members sorted by name, communities sorted by their first member
    Lexicographic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum in-flight LLM calls per stage
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub edge_merge_policy: EdgeMergePolicy,

    #[serde(default)]
    pub community_ordering: CommunityOrdering,

    #[serde(default)]
    pub leiden: LeidenSettings,

    /// Partial answers kept for the reduce call
    #[serde(default = "default_max_partial_answers")]
    pub max_partial_answers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            edge_merge_policy: EdgeMergePolicy::default(),
            community_ordering: CommunityOrdering::default(),
            leiden: LeidenSettings::default(),
            max_partial_answers: default_max_partial_answers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeidenSettings {
    /// Resolution parameter (higher = more communities)
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Maximum local-move sweeps per level
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Minimum modularity improvement to continue
    #[serde(default = "default_min_improvement")]
    pub min_improvement: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for LeidenSettings {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            max_iterations: default_max_iterations(),
            min_improvement: default_min_improvement(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory receiving indexing artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_graph_file")]
    pub graph_file: String,

    #[serde(default = "default_summaries_file")]
    pub summaries_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            graph_file: default_graph_file(),
            summaries_file: default_summaries_file(),
        }
    }
}

impl StorageConfig {
    pub fn graph_path(&self) -> PathBuf {
        self.output_dir.join(&self.graph_file)
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.output_dir.join(&self.summaries_file)
    }
}

// Default values
fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_partial_answers() -> usize {
    16
}

fn default_resolution() -> f64 {
    1.0
}

fn default_max_iterations() -> usize {
    100
}

fn default_min_improvement() -> f64 {
    1e-6
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_graph_file() -> String {
    "knowledge_graph.gml".to_string()
}

fn default_summaries_file() -> String {
    "community_summaries.json".to_string()
}

impl GraphRagConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration: defaults, overlaid by the file, overlaid by env
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        Ok(Self::merge_with_env(config))
    }

    /// Apply environment variables on top of `config`
    ///
    /// Supported environment variables:
    /// - GRAPHRAG_LLM_PROVIDER: provider ID (default: ollama)
    /// - GRAPHRAG_LLM_MODEL: model name
    /// - GRAPHRAG_OUTPUT_DIR: artifact directory (default: output)
    /// - GRAPHRAG_MAX_CONCURRENCY: in-flight LLM calls per stage (default: 4)
    /// - GRAPHRAG_REQUEST_TIMEOUT: per-call timeout in seconds (default: 120)
    /// - GRAPHRAG_LEIDEN_SEED: fixed seed for community detection
    /// - OPENAI_API_KEY, OPENAI_BASE_URL, ANTHROPIC_API_KEY, OLLAMA_BASE_URL
    pub fn merge_with_env(mut config: Self) -> Self {
        if let Ok(provider) = std::env::var("GRAPHRAG_LLM_PROVIDER") {
            config.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("GRAPHRAG_LLM_MODEL") {
            config.llm.model = Some(model);
        }

        if let Ok(dir) = std::env::var("GRAPHRAG_OUTPUT_DIR") {
            config.storage.output_dir = PathBuf::from(dir);
        }

        if let Ok(value) = std::env::var("GRAPHRAG_MAX_CONCURRENCY") {
            if let Ok(val) = value.parse() {
                config.pipeline.max_concurrency = val;
            }
        }

        if let Ok(value) = std::env::var("GRAPHRAG_REQUEST_TIMEOUT") {
            if let Ok(val) = value.parse() {
                config.llm.request_timeout_secs = val;
            }
        }

        if let Ok(value) = std::env::var("GRAPHRAG_LEIDEN_SEED") {
            if let Ok(val) = value.parse() {
                config.pipeline.leiden.seed = Some(val);
            }
        }

        // LLM credentials
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai_base_url = Some(url);
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.llm.anthropic_api_key = Some(key);
        }

        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.llm.ollama_base_url = url;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_concurrency == 0 {
            return Err(GraphRagError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        if self.pipeline.leiden.resolution <= 0.0 {
            return Err(GraphRagError::Config(
                "leiden resolution must be positive".to_string(),
            ));
        }

        match self.llm.provider.as_str() {
            "ollama" => {}
            "openai" if self.llm.openai_api_key.is_none() => {
                return Err(GraphRagError::Config(
                    "provider 'openai' selected but OPENAI_API_KEY is not set".to_string(),
                ));
            }
            "anthropic" if self.llm.anthropic_api_key.is_none() => {
                return Err(GraphRagError::Config(
                    "provider 'anthropic' selected but ANTHROPIC_API_KEY is not set".to_string(),
                ));
            }
            "openai" | "anthropic" => {}
            other => {
                return Err(GraphRagError::Config(format!("Unknown provider: {}", other)));
            }
        }

        Ok(())
    }
}
