//! Tests for the routing module.

mod probe_test;
mod strategy_test;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use switchboard_abstraction::{Provider, ProviderError, ProviderRequest, ProviderResponse};

/// Provider with scripted behavior.
pub(super) struct MockProvider {
    pub fail: AtomicBool,
    pub delay: Duration,
    pub tokens: u32,
    pub calls: AtomicUsize,
}

impl MockProvider {
    pub fn ok(tokens: u32) -> Self {
        Self { fail: AtomicBool::new(false), delay: Duration::ZERO, tokens, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        let provider = Self::ok(0);
        provider.fail.store(true, Ordering::SeqCst);
        provider
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::ok(1) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::ResponseError("scripted failure".to_string()));
        }
        Ok(ProviderResponse {
            content: format!("echo: {}", request.prompt),
            tokens_used: self.tokens,
            model: None,
        })
    }
}
