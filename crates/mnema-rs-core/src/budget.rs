//! Token budget enforcement: dedup, order, coarse and exact trim.

use crate::error::MemoryError;
use crate::record::{self, MemoryRecord};
use crate::tokens::{TokenCounter, estimate_tokens};
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Bring `records` within `max_tokens`, keeping the most valuable copy of
/// each fact.
///
/// Two-phase trim: a coarse pass on the four-characters-per-token
/// estimate, then an exact pass that re-counts through the collaborator
/// after each single-record drop, so the number of exact-count calls
/// stays bounded. The counter is a network collaborator and runs under
/// `deadline`. Idempotent, and never increases the record count.
pub async fn enforce_records(
    records: Vec<MemoryRecord>,
    max_tokens: usize,
    topics: bool,
    counter: &dyn TokenCounter,
    deadline: Duration,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    let mut records = dedup_records(records, topics);
    if topics {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    } else {
        records.sort_by(|a, b| a.priority.cmp(&b.priority));
    }

    // coarse pass on the estimate
    let mut total: usize = records
        .iter()
        .map(|record| estimate_tokens(&record.content))
        .sum();
    while total > max_tokens {
        let Some(dropped) = records.pop() else {
            break;
        };
        total = total.saturating_sub(estimate_tokens(&dropped.content));
    }

    // exact pass on the serialized section
    while !records.is_empty() {
        let serialized = record::join_records(&records);
        let count = match timeout(deadline, counter.count(&serialized)).await {
            Ok(result) => result?,
            Err(_) => return Err(MemoryError::Timeout("token counter".to_string())),
        };
        if count <= max_tokens {
            break;
        }
        let dropped = records.pop();
        debug!(
            "exact trim dropped record (count={count}, ceiling={max_tokens}, content_len={})",
            dropped.map(|record| record.content.len()).unwrap_or(0)
        );
    }
    Ok(records)
}

/// Collapse duplicate-content records, keeping the most valuable copy.
///
/// Topics keep the latest timestamp; everything else keeps the lowest
/// (highest-importance) priority. Ties keep the first-seen record.
fn dedup_records(records: Vec<MemoryRecord>, topics: bool) -> Vec<MemoryRecord> {
    let mut kept: Vec<MemoryRecord> = Vec::with_capacity(records.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record in records {
        let key = record.content.trim().to_string();
        match seen.get(&key) {
            None => {
                seen.insert(key, kept.len());
                kept.push(record);
            }
            Some(&at) => {
                let replace = if topics {
                    record.timestamp > kept[at].timestamp
                } else {
                    record.priority < kept[at].priority
                };
                if replace {
                    kept[at] = record;
                }
            }
        }
    }
    kept
}
