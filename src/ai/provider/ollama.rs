//! Ollama Local LLM Provider
//!
//! LLM provider for locally-running Ollama models.
//! Returns LlmReply with token usage metrics reported by the runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{LlmProvider, LlmReply, TokenUsage};
use crate::config::LlmConfig;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, Result, TomeError};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3:latest";

/// Ollama Local LLM Provider
pub struct OllamaProvider {
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = Self::validate_endpoint(&api_base)?;

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_base,
            model,
            temperature: config.temperature,
            client,
        })
    }

    /// Validate endpoint URL: http/https only, warn for non-localhost hosts.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            TomeError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(TomeError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<LlmReply> {
        info!(
            "Completing with Ollama (model: {}, temperature: {})",
            self.model, self.temperature
        );

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: self.temperature,
            }),
        };
        let url = format!("{}/api/generate", self.api_base);

        debug!("Sending request to Ollama API");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_connect() {
                TomeError::Llm(LlmError::with_provider(
                    ErrorCategory::Network,
                    format!(
                        "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                        self.api_base
                    ),
                    "ollama",
                ))
            } else {
                e.into()
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status,
                &format!("Ollama API error ({}): {}", status, body),
                "ollama",
            )
            .into());
        }

        let response_body: OllamaResponse = response.json().await?;

        let usage = TokenUsage::new(
            response_body.prompt_eval_count.unwrap_or(0),
            response_body.eval_count.unwrap_or(0),
        );

        Ok(LlmReply {
            text: response_body.response,
            usage,
            model: self.model.clone(),
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        let response = self.client.get(&url).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(tags) = resp.json::<OllamaTagsResponse>().await {
                    let model_available = tags.models.iter().any(|m| {
                        m.name == self.model
                            || m.name.starts_with(&self.model.replace(":latest", ""))
                    });

                    if model_available {
                        info!("Ollama is available with model: {}", self.model);
                        Ok(true)
                    } else {
                        warn!(
                            "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                            self.model, self.model
                        );
                        Ok(false)
                    }
                } else {
                    info!("Ollama is available");
                    Ok(true)
                }
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}. Start with: ollama serve", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
