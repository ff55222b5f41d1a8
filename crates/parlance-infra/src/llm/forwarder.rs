//! CompletionForwarder -- HTTP client for an OpenAI-style chat-completion
//! endpoint.
//!
//! The bearer token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when constructing the Authorization header. It never appears in
//! Debug output or tracing logs.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use parlance_types::chat::ChatRequest;
use parlance_types::error::ForwarderError;

/// Stateless chat-completion forwarder.
///
/// Issues exactly one outbound POST per call: no retries, no streaming, no
/// error normalization beyond propagating the transport failure. Non-2xx
/// responses surface as [`ForwarderError::Endpoint`] with the body
/// preserved verbatim.
pub struct CompletionForwarder {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl CompletionForwarder {
    /// Create a new forwarder.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the chat-completion endpoint
    /// * `api_key` - Bearer token wrapped in SecretString
    pub fn new(endpoint: String, api_key: SecretString) -> Result<Self, ForwarderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // 5 min ceiling for long generations
            .build()
            .map_err(|e| ForwarderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// The endpoint this forwarder posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Forward a chat request and return the parsed response body verbatim.
    pub async fn forward(&self, request: &ChatRequest) -> Result<serde_json::Value, ForwarderError> {
        tracing::debug!(
            model = %request.model,
            turns = request.messages.len(),
            "forwarding completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(request)
            .send()
            .await
            .map_err(|e| ForwarderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForwarderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ForwarderError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ForwarderError::Decode(e.to_string()))
    }
}
