//! Error types for the memory engine.

use thiserror::Error;

/// Errors returned by the memory store and consolidation engine.
///
/// Malformed content never surfaces here; pipeline stages degrade locally
/// and warn. These variants cover collaborator transport failures and
/// configuration errors rejected before any read or write.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// IO error from the file-backed blob store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Persistence collaborator failure.
    #[error("persistence error: {0}")]
    Store(String),
    /// Oracle transport failure.
    #[error("oracle error: {0}")]
    Oracle(String),
    /// A collaborator call exceeded its deadline.
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// Section name outside the fixed set.
    #[error("unknown section: {0}")]
    UnknownSection(String),
    /// Write or consolidation attempted without a concrete section.
    #[error("not processed: no section specified")]
    MissingSection,
    /// Operation attempted without a context identifier.
    #[error("not processed: no context specified")]
    MissingContext,
}
