use async_trait::async_trait;
use mnema_rs_core::{MemoryError, TokenCounter, tokens::estimate_tokens};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Token counter that answers with the heuristic estimate while counting
/// how many exact-count calls it received.
#[derive(Default)]
pub struct RecordingTokenCounter {
    calls: AtomicUsize,
}

impl RecordingTokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of count calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCounter for RecordingTokenCounter {
    async fn count(&self, text: &str) -> Result<usize, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(estimate_tokens(text))
    }
}

/// Token counter that always fails with a transport error.
pub struct FailingTokenCounter {
    message: String,
}

impl FailingTokenCounter {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl TokenCounter for FailingTokenCounter {
    async fn count(&self, _text: &str) -> Result<usize, MemoryError> {
        Err(MemoryError::Oracle(self.message.clone()))
    }
}
