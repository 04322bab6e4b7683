//! LlmProvider trait definition.
//!
//! The core abstraction over language-generation backends. Uses native
//! async fn in traits (RPITIT, Rust 2024 edition). Implementations live in
//! huddle-infra (e.g. `GeminiProvider`).

use huddle_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for language-generation backends.
///
/// The bot pipeline consumes whole completions only; an unconfigured
/// backend surfaces as [`LlmError::MissingApiKey`] from `complete` rather
/// than a construction failure, so wiring never depends on configuration.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
