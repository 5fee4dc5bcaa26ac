//! External oracle contracts for proposals and line repair.

use crate::error::MemoryError;
use crate::section::SectionKind;
use async_trait::async_trait;
use serde_json::Value;

/// Proposes memory modifications for a serialized section.
///
/// The oracle is an external, non-deterministic process. Everything it
/// returns is treated as untrusted input and validated by the
/// consolidation loop before use.
#[async_trait]
pub trait ProposalOracle: Send + Sync {
    /// Propose modifications for `blob`, or `None` when the section needs
    /// no further optimization.
    async fn propose(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
        conversation: &str,
    ) -> Result<Option<Value>, MemoryError>;
}

/// Rewrites malformed lines into well-formed record lines.
#[async_trait]
pub trait ReformatOracle: Send + Sync {
    /// Return newline-joined well-formed lines recovered from
    /// `raw_lines`, or an empty string when nothing was usable.
    async fn reformat(&self, raw_lines: &str) -> Result<String, MemoryError>;
}
