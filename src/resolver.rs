//! Turns document text and a cursor into completion candidates or a hover target.

use std::sync::OnceLock;

use regex::Regex;

use crate::fuzzy::Fuzzy;
use crate::model::{CompletionCandidate, Position, RecordKind, RecordRef, Snapshot, Span};

/// Quoted partial identifier ending at the cursor.
fn trigger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"][A-Za-z0-9_-]+$"#).unwrap())
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]+").unwrap())
}

pub struct CompletionResolver {
    fuzzy: Fuzzy,
    eligibility_lines: usize,
}

impl CompletionResolver {
    pub fn new(fuzzy: Fuzzy, eligibility_lines: usize) -> Self {
        Self {
            fuzzy,
            eligibility_lines,
        }
    }

    /// Ranked candidates for the quoted token before `position`, or nothing
    /// when the document or cursor context does not qualify.
    pub fn complete(
        &self,
        snapshot: &Snapshot,
        text: &str,
        position: Position,
    ) -> Vec<CompletionCandidate> {
        if !is_eligible(text, self.eligibility_lines) {
            return Vec::new();
        }

        let Some(line) = line_at(text, position.line) else {
            return Vec::new();
        };
        let prefix = &line[..byte_offset(line, position.character)];
        let Some(query) = trigger_token(prefix) else {
            return Vec::new();
        };

        let candidates = snapshot.records(candidate_kind(line));
        tracing::debug!(
            "Completing {:?} against {} candidates",
            query,
            candidates.len()
        );

        self.fuzzy
            .search(&candidates, query)
            .into_iter()
            .map(|hit| {
                let record = candidates[hit.index];
                CompletionCandidate {
                    key: record.key().to_string(),
                    kind: record.kind(),
                }
            })
            .collect()
    }
}

/// Whether the first `lines` lines mention experiments or deciders.
pub fn is_eligible(text: &str, lines: usize) -> bool {
    text.lines().take(lines).any(|line| {
        let lower = line.to_lowercase();
        lower.contains("experiment") || lower.contains("decider")
    })
}

/// The identifier typed after an opening quote, without the quote.
pub fn trigger_token(prefix: &str) -> Option<&str> {
    trigger_re()
        .find(prefix)
        .map(|m| m.as_str().trim_start_matches(['\'', '"']))
}

/// Deciders if the line mentions one, else experiments if it mentions one, else both.
pub fn candidate_kind(line: &str) -> Option<RecordKind> {
    let lower = line.to_lowercase();
    if lower.contains("decider") {
        Some(RecordKind::Decider)
    } else if lower.contains("experiment") {
        Some(RecordKind::Experiment)
    } else {
        None
    }
}

/// The record whose key is exactly the word under the cursor.
pub fn hover_target<'a>(
    snapshot: &'a Snapshot,
    text: &str,
    position: Position,
) -> Option<(RecordRef<'a>, Span)> {
    let (word, span) = word_at(text, position)?;
    let record = snapshot.find(word)?;
    Some((record, span))
}

/// Identifier-like word touching `position`, with its span.
pub fn word_at(text: &str, position: Position) -> Option<(&str, Span)> {
    let line = line_at(text, position.line)?;
    let cursor = byte_offset(line, position.character);

    let word = word_re()
        .find_iter(line)
        .find(|m| m.start() <= cursor && cursor <= m.end())?;

    Some((
        word.as_str(),
        Span {
            line: position.line,
            start: utf16_len(&line[..word.start()]),
            end: utf16_len(&line[..word.end()]),
        },
    ))
}

fn line_at(text: &str, line: usize) -> Option<&str> {
    text.lines().nth(line)
}

/// Byte offset of a UTF-16 column, clamped to the line end.
fn byte_offset(line: &str, character: usize) -> usize {
    let mut units = 0;
    for (offset, c) in line.char_indices() {
        if units >= character {
            return offset;
        }
        units += c.len_utf16();
    }
    line.len()
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}
