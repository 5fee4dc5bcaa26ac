//! Post-persist dispatch announcements.

use crate::error::MemoryError;
use crate::section::SectionKind;
use async_trait::async_trait;
use log::debug;

/// Downstream queue notified after a section blob is persisted.
///
/// Injected at store construction; there is no process-global client.
/// Announcement failures are logged by the store and never fail the
/// persist that triggered them.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Announce that `(context, section)` has a new persisted blob.
    async fn announce(&self, context: &str, section: SectionKind) -> Result<(), MemoryError>;
}

/// Disabled queue used when no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatchQueue;

#[async_trait]
impl DispatchQueue for NoopDispatchQueue {
    async fn announce(&self, context: &str, section: SectionKind) -> Result<(), MemoryError> {
        debug!("dispatch disabled; dropping announcement (context={context}, section={section})");
        Ok(())
    }
}
