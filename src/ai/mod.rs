//! AI Integration Layer
//!
//! LLM collaborator abstraction for tutorial generation: provider trait and
//! HTTP implementations, token estimation, and structured-output validation.

pub mod provider;
pub mod tokenizer;
pub mod validation;

pub use provider::{
    LlmProvider, LlmReply, SharedProvider, TokenUsage, complete_with_retry, create_provider,
};
pub use tokenizer::{TokenCounter, TokenEstimator};
pub use validation::{
    extract_yaml_block, parse_index, parse_yaml_block, require_mapping, require_sequence,
    require_str,
};
