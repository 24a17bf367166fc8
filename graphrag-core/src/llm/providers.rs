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

use super::{build_messages, ChatMessage, LLMClient, LLMResponse};
use crate::error::LLMError;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

// OpenAI Provider
pub struct OpenAIProvider {
    client: OpenAIClient<OpenAIConfig>,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model: Option<String>, temperature: f32) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.clone());

        Self {
            client: OpenAIClient::with_config(config),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature,
        }
    }

    /// Point the client at an OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(self.api_key.clone())
            .with_api_base(base_url);
        self.client = OpenAIClient::with_config(config);
        self
    }

    fn convert_messages(&self, messages: Vec<ChatMessage>) -> Vec<ChatCompletionRequestMessage> {
        messages
            .into_iter()
            .filter_map(|msg| match msg.role.as_str() {
                "system" => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .ok()
                    .map(ChatCompletionRequestMessage::System),
                "user" => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .ok()
                    .map(ChatCompletionRequestMessage::User),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl LLMClient for OpenAIProvider {
    async fn generate(&self, instruction: &str, content: &str) -> Result<LLMResponse, LLMError> {
        let start = Instant::now();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.convert_messages(build_messages(instruction, content)))
            .temperature(self.temperature)
            .build()
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LLMError::ApiError(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LLMError::InvalidResponse("Missing content".to_string()))?;

        Ok(LLMResponse {
            content,
            model: response.model,
            duration_ms: start.elapsed().as_millis() as u32,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// Anthropic Provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "claude-3-5-haiku-20241022".to_string()),
            temperature,
        }
    }
}

#[async_trait]
impl LLMClient for AnthropicProvider {
    async fn generate(&self, instruction: &str, content: &str) -> Result<LLMResponse, LLMError> {
        let start = Instant::now();

        // Anthropic takes the system prompt as a top-level field
        let messages = build_messages(instruction, content);
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let formatted_messages: Vec<_> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": formatted_messages,
            "max_tokens": 4096,
            "temperature": self.temperature,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::RateLimitExceeded);
            }
            return Err(LLMError::ApiError(error_text));
        }

        let json: serde_json::Value = response.json().await?;

        let content = json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        Ok(LLMResponse {
            content,
            model: json["model"]
                .as_str()
                .unwrap_or(self.model.as_str())
                .to_string(),
            duration_ms: start.elapsed().as_millis() as u32,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// Ollama Provider (Local)
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: Option<String>, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| "qwen2:1.5b-instruct".to_string()),
            temperature,
        }
    }
}

#[async_trait]
impl LLMClient for OllamaProvider {
    async fn generate(&self, instruction: &str, content: &str) -> Result<LLMResponse, LLMError> {
        let start = Instant::now();

        let formatted_messages: Vec<_> = build_messages(instruction, content)
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let body = json!({
            "model": self.model,
            "messages": formatted_messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(LLMError::ApiError(error_text));
        }

        let json: serde_json::Value = response.json().await?;

        let content = json["message"]["content"]
            .as_str()
            .ok_or_else(|| LLMError::InvalidResponse("Missing message content".to_string()))?
            .to_string();

        Ok(LLMResponse {
            content,
            model: json["model"]
                .as_str()
                .unwrap_or(self.model.as_str())
                .to_string(),
            duration_ms: start.elapsed().as_millis() as u32,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
