//! Blob normalization: local dialect migration and oracle line repair.

use crate::oracle::ReformatOracle;
use crate::record::{self, MemoryRecord, ParsedLine, RecordOrder};
use log::{debug, warn};
use std::time::Duration;
use tokio::time::timeout;

/// Normalize `blob` into well-formed records ordered newest-first.
///
/// Legacy bracket-dialect lines (`[P3] text`) are converted locally; all
/// other malformed lines go to the reformatting oracle. Never fails:
/// lines the oracle cannot repair are dropped with a warning so
/// normalization cannot block forward progress.
pub async fn normalize(blob: &str, oracle: &dyn ReformatOracle, deadline: Duration) -> String {
    let mut records = Vec::new();
    let mut raw_lines = Vec::new();
    for line in record::parse(blob) {
        match line {
            ParsedLine::Record(parsed) => records.push(parsed),
            ParsedLine::Raw(raw) => match record::parse_bracket_line(&raw) {
                Some((priority, text)) => {
                    records.push(MemoryRecord::new(text, Some(priority)));
                }
                None => raw_lines.push(raw),
            },
        }
    }

    if !raw_lines.is_empty() {
        match timeout(deadline, oracle.reformat(&raw_lines.join("\n"))).await {
            Ok(Ok(reformatted)) => {
                let mut repaired = 0usize;
                for line in record::parse(&reformatted) {
                    if let ParsedLine::Record(parsed) = line {
                        records.push(parsed);
                        repaired += 1;
                    }
                }
                debug!(
                    "reformatting oracle repaired {repaired} of {} raw lines",
                    raw_lines.len()
                );
            }
            Ok(Err(err)) => {
                warn!(
                    "reformatting oracle failed; dropping {} raw lines: {err}",
                    raw_lines.len()
                );
            }
            Err(_) => {
                warn!(
                    "reformatting oracle timed out; dropping {} raw lines",
                    raw_lines.len()
                );
            }
        }
    }

    record::serialize(&records, RecordOrder::RecencyOnly)
}
