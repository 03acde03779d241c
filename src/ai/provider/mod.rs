//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for text completion. The pipeline treats a
//! provider as an opaque, potentially slow, potentially failing function from
//! prompt to text; retry/backoff lives here, not in the pipeline stages.
//!
//! All providers return `LlmReply` with token usage metrics for cost
//! observability.

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ai::tokenizer::TokenCounter;
use crate::config::LlmConfig;
use crate::constants::chain;
use crate::types::{Result, TomeError};

// =============================================================================
// LLM Reply with Usage Metrics
// =============================================================================

/// Complete LLM reply: generated text plus usage metrics.
#[derive(Debug, Clone)]
pub struct LlmReply {
    /// Generated text (stages extract their own fenced structured block)
    pub text: String,
    /// Token usage metrics reported by the provider
    pub usage: TokenUsage,
    /// Model that produced the reply
    pub model: String,
}

/// Token usage metrics for cost tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared LLM provider type threaded through the pipeline stages.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// LLM Provider trait for text completion with usage metrics.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt into text.
    ///
    /// One invocation corresponds to exactly one round-trip; retry policy is
    /// applied by `complete_with_retry`.
    async fn complete(&self, prompt: &str) -> Result<LlmReply>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.clone())?)),
        _ => Err(TomeError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            config.provider
        ))),
    }
}

// =============================================================================
// Retry Wrapper
// =============================================================================

/// Complete a prompt with bounded exponential-backoff retry on recoverable
/// failures. Auth, not-found, and validation failures are never retried.
pub async fn complete_with_retry(
    provider: &SharedProvider,
    prompt: &str,
    max_retries: usize,
) -> Result<LlmReply> {
    let estimated_tokens = TokenCounter::default().count(prompt);
    debug!(
        provider = provider.name(),
        model = provider.model(),
        estimated_prompt_tokens = estimated_tokens,
        "Issuing LLM call"
    );

    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(chain::BASE_DELAY_MS))
        .with_max_delay(Duration::from_secs(chain::MAX_DELAY_SECS))
        .with_max_times(max_retries);

    (|| async { provider.complete(prompt).await })
        .retry(backoff)
        .when(|e: &TomeError| e.is_recoverable())
        .notify(|err, dur| {
            warn!("LLM call failed ({}), retrying in {:?}", err, dur);
        })
        .await
}
