use async_trait::async_trait;
use mnema_rs_core::{MemoryError, ProposalOracle, ReformatOracle, SectionKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Proposal oracle that replays a scripted response sequence.
///
/// Each entry is either a proposal payload (`Ok`) or a transport failure
/// message (`Err`). Once the script is exhausted it signals convergence.
pub struct ScriptedProposalOracle {
    responses: Mutex<VecDeque<Result<Option<Value>, String>>>,
    calls: AtomicUsize,
}

impl ScriptedProposalOracle {
    pub fn new(responses: Vec<Result<Option<Value>, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of propose calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProposalOracle for ScriptedProposalOracle {
    async fn propose(
        &self,
        _context: &str,
        _section: SectionKind,
        _blob: &str,
        _conversation: &str,
    ) -> Result<Option<Value>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(MemoryError::Oracle(message)),
            None => Ok(None),
        }
    }
}

/// Proposal oracle that returns the same payload forever.
pub struct NeverConvergingOracle {
    payload: Value,
    calls: AtomicUsize,
}

impl NeverConvergingOracle {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of propose calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProposalOracle for NeverConvergingOracle {
    async fn propose(
        &self,
        _context: &str,
        _section: SectionKind,
        _blob: &str,
        _conversation: &str,
    ) -> Result<Option<Value>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.payload.clone()))
    }
}

/// Proposal oracle that never responds within any deadline.
pub struct SlowProposalOracle {
    delay: Duration,
}

impl SlowProposalOracle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ProposalOracle for SlowProposalOracle {
    async fn propose(
        &self,
        _context: &str,
        _section: SectionKind,
        _blob: &str,
        _conversation: &str,
    ) -> Result<Option<Value>, MemoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(Value::Array(Vec::new())))
    }
}

/// Reformat oracle returning a fixed repaired payload.
pub struct FixedReformatOracle {
    response: String,
}

impl FixedReformatOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    /// An oracle that recovers nothing.
    pub fn empty() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl ReformatOracle for FixedReformatOracle {
    async fn reformat(&self, _raw_lines: &str) -> Result<String, MemoryError> {
        Ok(self.response.clone())
    }
}

/// Reformat oracle that always fails with a transport error.
pub struct FailingReformatOracle {
    message: String,
}

impl FailingReformatOracle {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ReformatOracle for FailingReformatOracle {
    async fn reformat(&self, _raw_lines: &str) -> Result<String, MemoryError> {
        Err(MemoryError::Oracle(self.message.clone()))
    }
}
