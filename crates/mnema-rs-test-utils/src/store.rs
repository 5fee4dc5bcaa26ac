use async_trait::async_trait;
use mnema_rs_core::{BlobStore, MemoryError, SectionKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory blob store keyed by (context, section).
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(String, String), String>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a section blob.
    pub fn seed(&self, context: &str, section: SectionKind, blob: &str) {
        self.blobs
            .lock()
            .insert(key(context, section), blob.to_string());
    }

    /// Inspect the currently stored blob for a section.
    pub fn get(&self, context: &str, section: SectionKind) -> Option<String> {
        self.blobs.lock().get(&key(context, section)).cloned()
    }

    /// Make all subsequent writes fail with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

fn key(context: &str, section: SectionKind) -> (String, String) {
    (context.to_string(), section.as_str().to_string())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(
        &self,
        context: &str,
        section: SectionKind,
    ) -> Result<Option<String>, MemoryError> {
        Ok(self.get(context, section))
    }

    async fn write(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
    ) -> Result<(), MemoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::Store("writes disabled".to_string()));
        }
        self.seed(context, section, blob);
        Ok(())
    }
}
