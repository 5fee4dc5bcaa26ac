//! Memory store facade and the file-backed persistence default.

use crate::budget;
use crate::consolidate::{self, ConsolidateParams, ConsolidationOutcome};
use crate::dispatch::{DispatchQueue, NoopDispatchQueue};
use crate::error::MemoryError;
use crate::modify::Modification;
use crate::mutate;
use crate::oracle::{ProposalOracle, ReformatOracle};
use crate::record;
use crate::section::SectionKind;
use crate::tokens::{HeuristicTokenCounter, TokenCounter};
use async_trait::async_trait;
use log::{info, warn};
use mnema_rs_config::MnemaConfig;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Persistence collaborator holding one blob per (context, section).
///
/// Writes are last-write-wins for concurrent writers to the same pair.
/// Implementations wanting stronger guarantees may back `write` with a
/// compare-and-swap and surface a lost race as [`MemoryError::Store`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob for `(context, section)`, or `None` if absent.
    async fn read(
        &self,
        context: &str,
        section: SectionKind,
    ) -> Result<Option<String>, MemoryError>;

    /// Replace the blob for `(context, section)`.
    async fn write(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
    ) -> Result<(), MemoryError>;
}

/// File-backed blob store, one file per (context, section).
#[derive(Debug)]
pub struct FileBlobStore {
    /// Root directory for section files.
    root: PathBuf,
    /// Serialize write access to section files.
    write_lock: Mutex<()>,
}

impl FileBlobStore {
    /// Create a new file-backed store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized file blob store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the section file for a context.
    fn section_path(&self, context: &str, section: SectionKind) -> PathBuf {
        self.root
            .join(sanitize_component(context))
            .join(format!("{}.mem", section.as_str()))
    }
}

/// Flatten a context identifier into a single safe path component.
///
/// Context ids come from chat platforms and are not trusted as paths.
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl BlobStore for FileBlobStore {
    /// Read a section file if it exists.
    async fn read(
        &self,
        context: &str,
        section: SectionKind,
    ) -> Result<Option<String>, MemoryError> {
        let path = self.section_path(context, section);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Rewrite a section file atomically via a temp file.
    async fn write(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
    ) -> Result<(), MemoryError> {
        let path = self.section_path(context, section);
        let temp_path = path.with_extension("mem.tmp");
        {
            let _guard = self.write_lock.lock();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&temp_path, blob)?;
            if path.exists() {
                fs::remove_file(&path)?;
            }
            fs::rename(temp_path, path)?;
        }
        Ok(())
    }
}

/// Engine facade: wires collaborators and keeps section invariants on
/// every write path.
pub struct MemoryStore {
    pub(crate) config: MnemaConfig,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) proposals: Arc<dyn ProposalOracle>,
    pub(crate) reformatter: Arc<dyn ReformatOracle>,
    pub(crate) tokens: Arc<dyn TokenCounter>,
    pub(crate) dispatch: Arc<dyn DispatchQueue>,
}

impl MemoryStore {
    /// Construct a store with heuristic token counting and dispatch
    /// disabled; use the `with_*` methods to swap in real collaborators.
    pub fn new(
        config: MnemaConfig,
        blobs: Arc<dyn BlobStore>,
        proposals: Arc<dyn ProposalOracle>,
        reformatter: Arc<dyn ReformatOracle>,
    ) -> Self {
        Self {
            config,
            blobs,
            proposals,
            reformatter,
            tokens: Arc::new(HeuristicTokenCounter),
            dispatch: Arc::new(NoopDispatchQueue),
        }
    }

    /// Replace the exact token counter.
    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replace the dispatch queue announced after each persist.
    pub fn with_dispatch_queue(mut self, dispatch: Arc<dyn DispatchQueue>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Token ceiling configured for a section.
    pub fn budget_for(&self, section: SectionKind) -> usize {
        if section.is_topics() {
            self.config.budget.topics_max_tokens
        } else {
            self.config.budget.max_tokens
        }
    }

    /// Read the blob for a section; the aggregate view joins all concrete
    /// sections in declaration order.
    pub async fn read_section(
        &self,
        context: &str,
        section: SectionKind,
    ) -> Result<String, MemoryError> {
        check_context(context)?;
        if section == SectionKind::All {
            let mut parts = Vec::new();
            for kind in SectionKind::CONCRETE {
                let blob = self.blobs.read(context, kind).await?.unwrap_or_default();
                if !blob.trim().is_empty() {
                    parts.push(blob);
                }
            }
            return Ok(parts.join("\n"));
        }
        Ok(self.blobs.read(context, section).await?.unwrap_or_default())
    }

    /// Persist `blob` after running dedup and budget enforcement, so the
    /// section invariants hold after every store cycle.
    ///
    /// Lines that do not parse as records are preserved verbatim; the
    /// next consolidation's normalize pass repairs or drops them.
    pub async fn save_section(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
    ) -> Result<(), MemoryError> {
        check_context(context)?;
        check_concrete(section)?;
        let enforced = self
            .enforce_blob(blob, self.budget_for(section), section.is_topics())
            .await?;
        self.persist(context, section, &enforced).await
    }

    /// Apply an ordered modification batch to a blob. No persistence, no
    /// dedup, no budget; pair with [`MemoryStore::enforce_budget`].
    pub fn apply_modifications(&self, blob: &str, modifications: &[Modification]) -> String {
        mutate::apply_modifications(blob, modifications)
    }

    /// Bring a blob within `max_tokens` for the given section shape.
    pub async fn enforce_budget(
        &self,
        blob: &str,
        max_tokens: usize,
        topics: bool,
    ) -> Result<String, MemoryError> {
        self.enforce_blob(blob, max_tokens, topics).await
    }

    /// Run the iterative consolidation loop for one section.
    pub async fn consolidate(
        &self,
        params: ConsolidateParams<'_>,
    ) -> Result<ConsolidationOutcome, MemoryError> {
        consolidate::run(self, params).await
    }

    /// Dedup and trim the records in `blob`, serializing them in the
    /// section order and carrying raw lines through untouched.
    pub(crate) async fn enforce_blob(
        &self,
        blob: &str,
        max_tokens: usize,
        topics: bool,
    ) -> Result<String, MemoryError> {
        let (records, raw_lines) = record::split_records(blob);
        let deadline = Duration::from_secs(self.config.consolidation.oracle_timeout_secs);
        let enforced =
            budget::enforce_records(records, max_tokens, topics, self.tokens.as_ref(), deadline)
                .await?;
        let order = if topics {
            record::RecordOrder::RecencyOnly
        } else {
            record::RecordOrder::PriorityThenRecency
        };
        let mut parts = Vec::new();
        let serialized = record::serialize(&enforced, order);
        if !serialized.is_empty() {
            parts.push(serialized);
        }
        parts.extend(raw_lines);
        Ok(parts.join("\n"))
    }

    /// Write a blob and announce it; announcement failures never fail the
    /// persist that triggered them.
    pub(crate) async fn persist(
        &self,
        context: &str,
        section: SectionKind,
        blob: &str,
    ) -> Result<(), MemoryError> {
        self.blobs.write(context, section, blob).await?;
        if let Err(err) = self.dispatch.announce(context, section).await {
            warn!("dispatch announcement failed (context={context}, section={section}): {err}");
        }
        Ok(())
    }
}

/// Reject an empty context identifier before any I/O.
fn check_context(context: &str) -> Result<(), MemoryError> {
    if context.trim().is_empty() {
        return Err(MemoryError::MissingContext);
    }
    Ok(())
}

/// Reject the aggregate view where a concrete section is required.
fn check_concrete(section: SectionKind) -> Result<(), MemoryError> {
    if section == SectionKind::All {
        return Err(MemoryError::MissingSection);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BlobStore, FileBlobStore, sanitize_component};
    use crate::section::SectionKind;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_store_round_trips_a_section_blob() {
        let temp = tempdir().expect("tempdir");
        let store = FileBlobStore::new(temp.path()).expect("store");
        let blob = "1|2024-01-01T00:00:00Z|likes coffee";

        assert_eq!(
            store.read("user-1", SectionKind::UserFacts).await.expect("read"),
            None
        );
        store
            .write("user-1", SectionKind::UserFacts, blob)
            .await
            .expect("write");
        assert_eq!(
            store.read("user-1", SectionKind::UserFacts).await.expect("read"),
            Some(blob.to_string())
        );
    }

    #[tokio::test]
    async fn rewrites_replace_the_previous_blob() {
        let temp = tempdir().expect("tempdir");
        let store = FileBlobStore::new(temp.path()).expect("store");
        store
            .write("user-1", SectionKind::Topics, "first")
            .await
            .expect("write");
        store
            .write("user-1", SectionKind::Topics, "second")
            .await
            .expect("rewrite");
        assert_eq!(
            store.read("user-1", SectionKind::Topics).await.expect("read"),
            Some("second".to_string())
        );
    }

    #[test]
    fn context_ids_flatten_into_one_path_component() {
        assert_eq!(sanitize_component("guild/123#chan"), "guild_123_chan");
        assert_eq!(sanitize_component("user-42"), "user-42");
    }
}
