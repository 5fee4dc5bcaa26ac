//! Token counting collaborators and the coarse size heuristic.

use crate::error::MemoryError;
use async_trait::async_trait;

/// Characters per token assumed by the coarse estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Exact token counting service used by the budget enforcer's final trim.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Count model tokens in `text`.
    async fn count(&self, text: &str) -> Result<usize, MemoryError>;
}

/// Estimate the token cost of `text` at four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Token counter backed by the four-characters-per-token estimate.
///
/// Default for installations without a counting service; the coarse and
/// exact trim phases then agree by construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

#[async_trait]
impl TokenCounter for HeuristicTokenCounter {
    async fn count(&self, text: &str) -> Result<usize, MemoryError> {
        Ok(estimate_tokens(text))
    }
}
