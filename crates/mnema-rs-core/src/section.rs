//! Memory section names and per-section ordering rules.

use crate::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named category of memory owned by a single context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    /// Facts the agent keeps about its own identity.
    #[serde(rename = "self-identity")]
    SelfIdentity,
    /// Facts about the user.
    #[serde(rename = "user-facts")]
    UserFacts,
    /// Standing operating directives.
    #[serde(rename = "operating-directives")]
    Directives,
    /// Conversation topics, kept in recency order.
    #[serde(rename = "conversation-topics")]
    Topics,
    /// Aggregate read-only view over all concrete sections.
    #[serde(rename = "all")]
    All,
}

impl SectionKind {
    /// The concrete sections backing the aggregate view.
    pub const CONCRETE: [SectionKind; 4] = [
        SectionKind::SelfIdentity,
        SectionKind::UserFacts,
        SectionKind::Directives,
        SectionKind::Topics,
    ];

    /// Canonical section name.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::SelfIdentity => "self-identity",
            SectionKind::UserFacts => "user-facts",
            SectionKind::Directives => "operating-directives",
            SectionKind::Topics => "conversation-topics",
            SectionKind::All => "all",
        }
    }

    /// Whether this section keeps records in recency order.
    pub fn is_topics(self) -> bool {
        matches!(self, SectionKind::Topics)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = MemoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(MemoryError::MissingSection);
        }
        match value.to_ascii_lowercase().as_str() {
            "self-identity" => Ok(SectionKind::SelfIdentity),
            "user-facts" => Ok(SectionKind::UserFacts),
            "operating-directives" => Ok(SectionKind::Directives),
            "conversation-topics" => Ok(SectionKind::Topics),
            "all" => Ok(SectionKind::All),
            other => Err(MemoryError::UnknownSection(other.to_string())),
        }
    }
}
