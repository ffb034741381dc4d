//! Backend provider abstraction.
//!
//! A provider is the thing the router invokes once it has picked a backend.
//! Static metadata such as cost and priority is supplied when the backend is
//! registered, not by the provider itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a provider call.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderError {
    /// The request could not be sent (network, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The backend answered with an error.
    #[error("Response Error: {0}")]
    ResponseError(String),

    /// The backend did not answer in time.
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    /// The backend is known to be down.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Request handed to a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Prompt text.
    pub prompt: String,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Free-form tags forwarded to the backend.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderRequest {
    /// Creates a request for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// Minimal request used for health probes.
    pub fn probe() -> Self {
        Self { prompt: "ping".to_string(), max_tokens: Some(1), ..Self::default() }
    }

    /// Sets the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response produced by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text.
    pub content: String,
    /// Tokens consumed by the call (prompt + completion).
    pub tokens_used: u32,
    /// Concrete model that served the request, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A backend that can serve requests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Invokes the backend.
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
