//! Iterative consolidation loop with a bounded iteration cap.
//!
//! The loop drives read, normalize, propose, validate, apply, enforce,
//! and persist for one (context, section). The proposal oracle is an
//! untrusted, potentially non-converging external process, so the loop
//! always terminates: at the oracle's convergence signal, at a validation
//! failure, or at the iteration cap.

use crate::error::MemoryError;
use crate::modify;
use crate::mutate;
use crate::normalize;
use crate::section::SectionKind;
use crate::store::MemoryStore;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::timeout;

/// Parameters for a single consolidation run.
pub struct ConsolidateParams<'a> {
    /// Owning context identifier.
    pub context: &'a str,
    /// Concrete section to consolidate.
    pub section: SectionKind,
    /// Recent conversation context forwarded to the proposal oracle.
    pub conversation: &'a str,
    /// Override for the configured iteration cap.
    pub max_iterations: Option<u32>,
    /// Cooperative cancellation flag, checked at the top of each
    /// iteration; a cancelled iteration still completes its persist.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ConsolidateParams<'a> {
    /// Parameters using the configured cap, no conversation context, and
    /// no cancellation.
    pub fn new(context: &'a str, section: SectionKind) -> Self {
        Self {
            context,
            section,
            conversation: "",
            max_iterations: None,
            cancel: None,
        }
    }
}

/// Result payload for a consolidation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationOutcome {
    /// Final memory blob: the last successfully persisted state, or the
    /// normalized input when no iteration persisted.
    pub blob: String,
    /// Proposal iterations performed.
    pub iterations: u32,
    /// Total modifications applied across all iterations.
    pub modifications: usize,
}

/// Drive the consolidation cycle for one (context, section).
pub(crate) async fn run(
    store: &MemoryStore,
    params: ConsolidateParams<'_>,
) -> Result<ConsolidationOutcome, MemoryError> {
    let ConsolidateParams {
        context,
        section,
        conversation,
        max_iterations,
        cancel,
    } = params;
    if context.trim().is_empty() {
        return Err(MemoryError::MissingContext);
    }
    if section == SectionKind::All {
        return Err(MemoryError::MissingSection);
    }

    let cap = max_iterations.unwrap_or(store.config.consolidation.max_iterations);
    let deadline = Duration::from_secs(store.config.consolidation.oracle_timeout_secs);

    let raw = store.blobs.read(context, section).await?.unwrap_or_default();
    // normalization runs once at loop start, not every iteration
    let mut blob = normalize::normalize(&raw, store.reformatter.as_ref(), deadline).await;
    let mut iterations = 0u32;
    let mut modifications = 0usize;

    info!("starting consolidation (context={context}, section={section}, cap={cap})");
    while iterations < cap {
        if cancelled(&cancel) {
            info!("consolidation cancelled (context={context}, section={section})");
            break;
        }
        let proposal = match timeout(
            deadline,
            store.proposals.propose(context, section, &blob, conversation),
        )
        .await
        {
            Err(_) => {
                warn!("proposal oracle timed out; stopping (context={context}, section={section})");
                break;
            }
            Ok(Err(err)) => {
                warn!("proposal oracle failed; stopping (context={context}): {err}");
                break;
            }
            Ok(Ok(None)) => {
                debug!("oracle signalled convergence (context={context}, section={section})");
                break;
            }
            Ok(Ok(Some(value))) => value,
        };
        iterations += 1;

        // a non-array payload discards the batch and stops the loop
        let Some(batch) = modify::parse_proposal(&proposal) else {
            break;
        };
        if batch.is_empty() {
            debug!("no valid modifications in proposal; treating as converged");
            break;
        }

        let mutated = mutate::apply_modifications(&blob, &batch);
        let enforced = match store
            .enforce_blob(&mutated, store.budget_for(section), section.is_topics())
            .await
        {
            Ok(enforced) => enforced,
            Err(err) => {
                warn!("budget enforcement failed; stopping at last persisted state: {err}");
                break;
            }
        };
        if let Err(err) = store.persist(context, section, &enforced).await {
            warn!("persist failed; stopping at last persisted state: {err}");
            break;
        }
        blob = enforced;
        modifications += batch.len();
        debug!(
            "consolidation iteration complete (iteration={iterations}, applied={})",
            batch.len()
        );
    }

    info!(
        "consolidation finished (context={context}, section={section}, iterations={iterations}, modifications={modifications})"
    );
    Ok(ConsolidationOutcome {
        blob,
        iterations,
        modifications,
    })
}

/// Check the cooperative cancellation flag.
fn cancelled(cancel: &Option<Arc<AtomicBool>>) -> bool {
    cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}
