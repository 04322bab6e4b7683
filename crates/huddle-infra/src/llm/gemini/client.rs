//! Gemini client over the Generative Language REST API.
//!
//! Sends `generateContent` requests with the API key in the
//! `x-goog-api-key` header. The key is wrapped in
//! [`secrecy::SecretString`] and never appears in Debug output or logs.
//! An unconfigured key is a normal state: `complete` returns
//! [`LlmError::MissingApiKey`] and the pipeline degrades from there.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use huddle_core::llm::LlmProvider;
use huddle_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::types::{
    GeminiContent, GeminiErrorBody, GeminiRequest, GeminiResponse, GenerationConfig,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini LLM provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new provider. `api_key` may be absent; completion then
    /// fails fast with [`LlmError::MissingApiKey`].
    pub fn new(api_key: Option<SecretString>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create http client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        )
    }

    fn to_gemini_request(request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            system_instruction: Some(GeminiContent::system(request.system.clone())),
            contents: vec![GeminiContent::user(request.user_message.clone())],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let Some(api_key) = &self.api_key else {
            return Err(LlmError::MissingApiKey);
        };

        let response = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&Self::to_gemini_request(request))
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000);

            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GeminiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or(body);

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                400 => LlmError::InvalidRequest(detail),
                status if status >= 500 => LlmError::Overloaded(detail),
                _ => LlmError::Provider { message: detail },
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;

        let text = body.first_text().ok_or_else(|| LlmError::Provider {
            message: "response contained no candidates".to_string(),
        })?;

        Ok(CompletionResponse {
            text,
            model: body.model_version,
        })
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("configured", &self.is_configured())
            .finish()
    }
}
