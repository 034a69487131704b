//! Reasoning capability abstraction.
//!
//! The LLM is an external collaborator: an opaque function from a prompt
//! to structured text plus token counts. No retry or backoff logic lives
//! here - retries, if any, belong to the calling layer.

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::types::TokenUsage;

/// One completed reasoning call.
#[derive(Clone, Debug)]
pub struct Completion {
    /// The structured reply text.
    pub text: String,
    /// Token counts reported by the model.
    pub usage: TokenUsage,
}

/// Trait for reasoning model providers.
///
/// Implement this trait to plug in a model backend. One implementation
/// is selected at startup by configuration.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Unique identifier for this provider (e.g., "anthropic").
    fn id(&self) -> &'static str;

    /// Run one reasoning call.
    async fn generate(&self, prompt: &str) -> Result<Completion, AnalysisError>;
}
