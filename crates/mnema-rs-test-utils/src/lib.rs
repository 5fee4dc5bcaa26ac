//! Test helpers shared across Mnema crates.

pub mod dispatch;
pub mod oracle;
pub mod store;
pub mod tokens;

pub use dispatch::{FailingDispatchQueue, RecordingDispatchQueue};
pub use oracle::{
    FailingReformatOracle, FixedReformatOracle, NeverConvergingOracle, ScriptedProposalOracle,
    SlowProposalOracle,
};
pub use store::MemoryBlobStore;
pub use tokens::{FailingTokenCounter, RecordingTokenCounter};
