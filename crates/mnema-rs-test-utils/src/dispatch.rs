use async_trait::async_trait;
use mnema_rs_core::{DispatchQueue, MemoryError, SectionKind};
use parking_lot::Mutex;

/// Dispatch queue that records every announcement it receives.
#[derive(Default)]
pub struct RecordingDispatchQueue {
    announcements: Mutex<Vec<(String, String)>>,
}

impl RecordingDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The (context, section) pairs announced so far.
    pub fn announcements(&self) -> Vec<(String, String)> {
        self.announcements.lock().clone()
    }
}

#[async_trait]
impl DispatchQueue for RecordingDispatchQueue {
    async fn announce(&self, context: &str, section: SectionKind) -> Result<(), MemoryError> {
        self.announcements
            .lock()
            .push((context.to_string(), section.as_str().to_string()));
        Ok(())
    }
}

/// Dispatch queue that always fails with a transport error.
pub struct FailingDispatchQueue {
    message: String,
}

impl FailingDispatchQueue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DispatchQueue for FailingDispatchQueue {
    async fn announce(&self, _context: &str, _section: SectionKind) -> Result<(), MemoryError> {
        Err(MemoryError::Store(self.message.clone()))
    }
}
