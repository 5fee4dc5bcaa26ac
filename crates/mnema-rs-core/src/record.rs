//! Record model and the pipe-delimited line codec.
//!
//! A persisted section blob is a newline-joined sequence of
//! `priority|timestamp|content` lines. Parsing is pure and never fails:
//! lines that do not match the three-part shape are surfaced as raw lines
//! for the normalizer to repair, not as errors.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Highest-importance priority.
pub const MIN_PRIORITY: u8 = 1;
/// Lowest-importance priority.
pub const MAX_PRIORITY: u8 = 5;
/// Priority assumed when a record or modification does not carry one.
pub const DEFAULT_PRIORITY: u8 = 3;

/// One priority-tagged, timestamped fact line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Importance, 1 (highest) to 5 (lowest).
    pub priority: u8,
    /// Creation or last-rewrite instant.
    pub timestamp: DateTime<Utc>,
    /// Fact text; the deduplication key is this field verbatim (trimmed).
    pub content: String,
}

impl MemoryRecord {
    /// Create a record stamped with the current time.
    pub fn new(content: impl Into<String>, priority: Option<u8>) -> Self {
        Self {
            priority: clamp_priority(u64::from(priority.unwrap_or(DEFAULT_PRIORITY))),
            timestamp: Utc::now(),
            content: content.into().trim().to_string(),
        }
    }

    /// Serialized line form.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}",
            self.priority,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.content
        )
    }
}

/// One parsed blob line: a well-formed record or a raw line needing repair.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A well-formed record.
    Record(MemoryRecord),
    /// A line that failed the three-part shape check.
    Raw(String),
}

/// Sort order used when serializing a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    /// Highest importance first, newest first within equal priority.
    #[default]
    PriorityThenRecency,
    /// Newest first regardless of priority (topics sections).
    RecencyOnly,
}

/// Split a blob into classified lines, preserving input order.
pub fn parse(blob: &str) -> Vec<ParsedLine> {
    blob.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match parse_line(line) {
            Some(record) => ParsedLine::Record(record),
            None => ParsedLine::Raw(line.to_string()),
        })
        .collect()
}

/// Split a blob into its well-formed records and its raw lines.
pub fn split_records(blob: &str) -> (Vec<MemoryRecord>, Vec<String>) {
    let mut records = Vec::new();
    let mut raw_lines = Vec::new();
    for line in parse(blob) {
        match line {
            ParsedLine::Record(record) => records.push(record),
            ParsedLine::Raw(raw) => raw_lines.push(raw),
        }
    }
    (records, raw_lines)
}

/// Serialize records in the requested order.
pub fn serialize(records: &[MemoryRecord], order: RecordOrder) -> String {
    let mut sorted = records.to_vec();
    sort_records(&mut sorted, order);
    join_records(&sorted)
}

/// Stable in-place sort by the requested order.
pub fn sort_records(records: &mut [MemoryRecord], order: RecordOrder) {
    match order {
        RecordOrder::PriorityThenRecency => records.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.timestamp.cmp(&a.timestamp))
        }),
        RecordOrder::RecencyOnly => records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
    }
}

/// Join records into a blob without reordering.
pub fn join_records(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(MemoryRecord::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join classified lines back into a blob without reordering.
pub fn join_lines(lines: &[ParsedLine]) -> String {
    lines
        .iter()
        .map(|line| match line {
            ParsedLine::Record(record) => record.to_line(),
            ParsedLine::Raw(raw) => raw.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a legacy bracket-dialect line (`[P3] text` or `[3] text`).
///
/// Migration source format only; nothing serializes back to it.
pub fn parse_bracket_line(line: &str) -> Option<(u8, &str)> {
    let rest = line.trim().strip_prefix('[')?;
    let (annotation, text) = rest.split_once(']')?;
    let digits = annotation
        .strip_prefix(['P', 'p'])
        .unwrap_or(annotation)
        .trim();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let priority: u64 = digits.parse().ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((clamp_priority(priority), text))
}

/// Content with any leading bracketed-priority annotation and surrounding
/// whitespace stripped, as used for pattern matching.
pub fn strip_priority_annotation(content: &str) -> &str {
    match parse_bracket_line(content) {
        Some((_, text)) => text,
        None => content.trim(),
    }
}

/// Parse one `priority|timestamp|content` line.
fn parse_line(line: &str) -> Option<MemoryRecord> {
    let mut parts = line.splitn(3, '|');
    let priority = parts.next()?;
    let timestamp = parts.next()?;
    let content = parts.next()?.trim();
    if priority.is_empty() || !priority.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    if content.is_empty() {
        return None;
    }
    let priority: u64 = priority.parse().ok()?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
        .ok()?
        .with_timezone(&Utc);
    Some(MemoryRecord {
        priority: clamp_priority(priority),
        timestamp,
        content: content.to_string(),
    })
}

/// Clamp a parsed priority into the supported 1..=5 range.
fn clamp_priority(priority: u64) -> u8 {
    priority.clamp(u64::from(MIN_PRIORITY), u64::from(MAX_PRIORITY)) as u8
}
