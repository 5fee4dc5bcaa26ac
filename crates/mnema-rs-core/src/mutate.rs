//! Ordered application of modifications to a section blob.

use crate::modify::Modification;
use crate::record::{self, MemoryRecord, ParsedLine};
use log::{debug, warn};
use regex::{Regex, RegexBuilder};

/// Upper bound on compiled pattern size. Patterns are oracle-authored and
/// untrusted; matching itself is linear-time, so program size is the one
/// resource left to bound.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Apply `modifications` to `blob` strictly in the order given.
///
/// Later modifications observe the effects of earlier ones. File order is
/// preserved: `Change` rewrites in place, `Add` appends, `Delete` removes.
/// The result is neither deduplicated nor budget-checked; callers run the
/// budget enforcer afterwards.
pub fn apply_modifications(blob: &str, modifications: &[Modification]) -> String {
    let mut lines = record::parse(blob);
    for modification in modifications {
        match modification {
            Modification::Add { content, priority } => {
                lines.push(ParsedLine::Record(MemoryRecord::new(
                    content.clone(),
                    *priority,
                )));
            }
            Modification::Change {
                pattern,
                newtext,
                priority,
            } => {
                let Some(regex) = compile_pattern(pattern) else {
                    continue;
                };
                change_first(&mut lines, &regex, newtext, *priority);
            }
            Modification::Delete { pattern } => {
                let Some(regex) = compile_pattern(pattern) else {
                    continue;
                };
                delete_all(&mut lines, &regex);
            }
        }
    }
    lines.retain(|line| match line {
        ParsedLine::Record(record) => !record.content.is_empty(),
        ParsedLine::Raw(raw) => !raw.is_empty(),
    });
    record::join_lines(&lines)
}

/// Compile an oracle-supplied pattern: case-insensitive, unanchored.
///
/// A pattern that fails to compile skips its single modification with a
/// warning; it never aborts the batch.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!("skipping modification with invalid pattern {pattern:?}: {err}");
            None
        }
    }
}

/// Rewrite the first matching record in place, expanding `$N` capture
/// references from the pattern into the replacement text.
fn change_first(lines: &mut [ParsedLine], regex: &Regex, newtext: &str, priority: Option<u8>) {
    for line in lines.iter_mut() {
        let ParsedLine::Record(found) = line else {
            continue;
        };
        let target = record::strip_priority_annotation(&found.content);
        let Some(captures) = regex.captures(target) else {
            continue;
        };
        let mut content = String::new();
        captures.expand(newtext, &mut content);
        debug!(
            "rewriting record (pattern={:?}, content_len={})",
            regex.as_str(),
            content.len()
        );
        *found = MemoryRecord::new(content, Some(priority.unwrap_or(found.priority)));
        return;
    }
}

/// Remove every record whose content matches.
fn delete_all(lines: &mut Vec<ParsedLine>, regex: &Regex) {
    lines.retain(|line| match line {
        ParsedLine::Record(record) => {
            !regex.is_match(record::strip_priority_annotation(&record.content))
        }
        ParsedLine::Raw(_) => true,
    });
}
