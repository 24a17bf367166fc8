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

//! Error types
//!
//! Only [`GraphRagError`] aborts a run. LLM and partitioning failures are
//! caught where they happen and turned into per-item sentinels.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal setup errors. Raised before any model call is issued.
#[derive(Debug, Error)]
pub enum GraphRagError {
    #[error("Required input not found: {0}")]
    MissingInput(PathBuf),

    #[error("Input contains no usable items: {0}")]
    EmptyInput(String),

    #[error("Community summaries are empty: {0}")]
    EmptySummaries(PathBuf),

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors from the language-model capability
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a community partitioner on a single component
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Component has no nodes")]
    EmptyComponent,

    #[error("Component has no edges to optimize over")]
    NoEdges,

    #[error("Partition does not cover the component: {0}")]
    InvalidCover(String),
}

pub type Result<T> = std::result::Result<T, GraphRagError>;
