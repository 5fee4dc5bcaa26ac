//! Bounded priority memory store and consolidation engine.
//!
//! This crate persists priority-tagged, timestamped fact lines per
//! (context, section), applies oracle-proposed mutations, and prunes each
//! section to a token budget through an iteration-capped consolidation loop.

pub mod budget;
pub mod consolidate;
pub mod dispatch;
pub mod error;
pub mod modify;
pub mod mutate;
pub mod normalize;
pub mod oracle;
pub mod record;
pub mod section;
pub mod store;
pub mod tokens;

/// Consolidation loop parameters and outcome.
pub use consolidate::{ConsolidateParams, ConsolidationOutcome};
/// Dispatch queue contract and disabled default.
pub use dispatch::{DispatchQueue, NoopDispatchQueue};
/// Memory error type.
pub use error::MemoryError;
/// Modification model and proposal validation.
pub use modify::{Modification, ProposedModification};
/// Oracle contracts.
pub use oracle::{ProposalOracle, ReformatOracle};
/// Record model and line codec types.
pub use record::{MemoryRecord, ParsedLine, RecordOrder};
/// Section names.
pub use section::SectionKind;
/// Store facade, persistence contract, and file-backed default.
pub use store::{BlobStore, FileBlobStore, MemoryStore};
/// Token counting contract and heuristic default.
pub use tokens::{HeuristicTokenCounter, TokenCounter};
