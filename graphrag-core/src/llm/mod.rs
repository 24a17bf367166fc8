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

//! Language-model capability
//!
//! Every stage talks to the model through [`LLMClient::generate`], a single
//! request/response call taking an instruction and the content it applies to.

use crate::config::LLMConfig;
use crate::error::{GraphRagError, LLMError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod providers;
pub use providers::*;

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Trait for the text generator used by every pipeline stage
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Apply `instruction` to `content` and return the generated text.
    /// `content` may be empty when the instruction is self-contained.
    async fn generate(&self, instruction: &str, content: &str) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Call `client` with a per-call deadline
pub async fn generate_with_timeout(
    client: &dyn LLMClient,
    instruction: &str,
    content: &str,
    timeout: Duration,
) -> Result<String, LLMError> {
    match tokio::time::timeout(timeout, client.generate(instruction, content)).await {
        Ok(result) => result.map(|response| response.content),
        Err(_) => Err(LLMError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Split an instruction/content pair into chat messages.
///
/// A self-contained instruction goes out as the only user message.
pub(crate) fn build_messages(instruction: &str, content: &str) -> Vec<ChatMessage> {
    if content.trim().is_empty() {
        return vec![ChatMessage {
            role: "user".to_string(),
            content: instruction.to_string(),
        }];
    }

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: instruction.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: content.to_string(),
        },
    ]
}

/// Build the client selected by `config.provider`
pub fn build_client(config: &LLMConfig) -> Result<Arc<dyn LLMClient>, GraphRagError> {
    let client: Arc<dyn LLMClient> = match config.provider.as_str() {
        "openai" => {
            let key = config.openai_api_key.clone().ok_or_else(|| {
                GraphRagError::Config("OPENAI_API_KEY not set".to_string())
            })?;
            let mut provider = OpenAIProvider::new(key, config.model.clone(), config.temperature);
            if let Some(base_url) = &config.openai_base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        "anthropic" => {
            let key = config.anthropic_api_key.clone().ok_or_else(|| {
                GraphRagError::Config("ANTHROPIC_API_KEY not set".to_string())
            })?;
            Arc::new(AnthropicProvider::new(
                key,
                config.model.clone(),
                config.temperature,
            ))
        }
        "ollama" => Arc::new(OllamaProvider::new(
            config.ollama_base_url.clone(),
            config.model.clone(),
            config.temperature,
        )),
        other => {
            return Err(GraphRagError::Config(format!("Unknown provider: {}", other)));
        }
    };

    info!(
        provider = %config.provider,
        model = client.model_name(),
        "Initialized LLM provider"
    );

    Ok(client)
}
