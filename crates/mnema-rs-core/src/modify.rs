//! Modification model and validation of untrusted oracle proposals.

use crate::record::{MAX_PRIORITY, MIN_PRIORITY};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

/// A single validated mutation applied by the mutation engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Insert a new record stamped with the current time.
    Add {
        content: String,
        priority: Option<u8>,
    },
    /// Rewrite the first record whose content matches `pattern`.
    Change {
        pattern: String,
        newtext: String,
        priority: Option<u8>,
    },
    /// Remove every record whose content matches `pattern`.
    Delete { pattern: String },
}

/// Wire shape of one proposed modification, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposedModification {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub newtext: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

impl Modification {
    /// Validate a proposed modification, returning `None` (with a
    /// warning) when it is malformed.
    pub fn from_proposed(proposed: ProposedModification) -> Option<Self> {
        let priority = proposed.priority.map(clamp_proposed_priority);
        let pattern = proposed.pattern.unwrap_or_default();
        let newtext = proposed.newtext.unwrap_or_default();
        match proposed.kind.as_str() {
            "add" => {
                if newtext.trim().is_empty() {
                    warn!("dropping add modification with empty content");
                    return None;
                }
                Some(Modification::Add {
                    content: newtext.trim().to_string(),
                    priority,
                })
            }
            "change" => {
                if pattern.trim().is_empty() {
                    warn!("dropping change modification with empty pattern");
                    return None;
                }
                if newtext.trim().is_empty() {
                    warn!("dropping change modification with empty newtext");
                    return None;
                }
                Some(Modification::Change {
                    pattern,
                    newtext,
                    priority,
                })
            }
            "delete" => {
                if pattern.trim().is_empty() {
                    warn!("dropping delete modification with empty pattern");
                    return None;
                }
                Some(Modification::Delete { pattern })
            }
            other => {
                warn!("dropping modification with unknown type: {other}");
                None
            }
        }
    }
}

/// Validate a whole proposal payload.
///
/// Returns `None` when the payload is not a JSON array, in which case the
/// batch is discarded. Individually malformed entries are dropped with
/// warnings and the remaining valid modifications are returned in order.
pub fn parse_proposal(value: &Value) -> Option<Vec<Modification>> {
    let Some(items) = value.as_array() else {
        warn!("discarding proposal: payload is not an array");
        return None;
    };
    let modifications = items
        .iter()
        .filter_map(|item| {
            match serde_json::from_value::<ProposedModification>(item.clone()) {
                Ok(proposed) => Modification::from_proposed(proposed),
                Err(err) => {
                    warn!("dropping unparseable modification: {err}");
                    None
                }
            }
        })
        .collect();
    Some(modifications)
}

/// Clamp an oracle-supplied priority into the supported 1..=5 range.
fn clamp_proposed_priority(value: i64) -> u8 {
    value.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8
}

#[cfg(test)]
mod tests {
    use super::{Modification, parse_proposal};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn non_array_payload_discards_the_batch() {
        assert_eq!(parse_proposal(&json!({"type": "add"})), None);
        assert_eq!(parse_proposal(&json!("add everything")), None);
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let payload = json!([
            {"type": "add", "newtext": "drinks espresso", "priority": 2},
            {"type": "add"},
            {"type": "change", "pattern": "", "newtext": "x"},
            {"type": "delete", "pattern": "stale"},
            {"type": "merge", "pattern": "a"},
            "not an object",
        ]);
        let batch = parse_proposal(&payload).expect("array payload");
        assert_eq!(
            batch,
            vec![
                Modification::Add {
                    content: "drinks espresso".to_string(),
                    priority: Some(2),
                },
                Modification::Delete {
                    pattern: "stale".to_string(),
                },
            ]
        );
    }

    #[test]
    fn add_content_comes_from_newtext() {
        let batch = parse_proposal(&json!([{"type": "add", "newtext": "  new fact  "}]))
            .expect("array payload");
        assert_eq!(
            batch,
            vec![Modification::Add {
                content: "new fact".to_string(),
                priority: None,
            }]
        );
    }

    #[test]
    fn priorities_are_clamped_into_range() {
        let batch = parse_proposal(&json!([
            {"type": "add", "newtext": "a", "priority": 0},
            {"type": "add", "newtext": "b", "priority": 99},
        ]))
        .expect("array payload");
        let priorities: Vec<_> = batch
            .iter()
            .map(|modification| match modification {
                Modification::Add { priority, .. } => priority.unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(priorities, vec![1, 5]);
    }
}
