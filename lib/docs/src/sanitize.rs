//! Pure text sanitizers for diagram and markdown output.
//!
//! - [`sanitize_identifier`]: node identifiers, allowlist `[A-Za-z0-9_]`
//! - [`sanitize_label`]: diagram labels, grammar-significant characters
//!   replaced by Mermaid entity codes
//! - [`escape_markdown`]: free text placed in markdown tables
//!
//! [`IdAllocator`] keeps identifiers unique within one diagram.

use std::collections::HashSet;

/// Words the diagram grammar treats as keywords when used as a bare id.
const RESERVED_IDENTIFIERS: &[&str] = &[
    "end",
    "graph",
    "flowchart",
    "subgraph",
    "direction",
    "style",
    "linkstyle",
    "classdef",
    "class",
    "click",
    "call",
    "href",
];

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
///
/// An empty input yields `_` so the result is always a usable identifier.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    if raw.is_empty() {
        return "_".to_string();
    }
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Makes text safe to place inside a quoted diagram label.
///
/// Pipes, angle brackets, braces, both quote kinds, `#` and backticks are
/// replaced by entity codes; line breaks and tabs become spaces. Nothing else
/// changes, so labels stay readable.
#[must_use]
pub fn sanitize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '#' => out.push_str("#35;"),
            '|' => out.push_str("#124;"),
            '<' => out.push_str("#lt;"),
            '>' => out.push_str("#gt;"),
            '{' => out.push_str("#123;"),
            '}' => out.push_str("#125;"),
            '"' => out.push_str("#quot;"),
            '\'' => out.push_str("#39;"),
            '`' => out.push_str("#96;"),
            '\r' | '\n' | '\t' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Escapes free text for a markdown table cell.
///
/// Backslash, pipe, emphasis and code markers, and link brackets are
/// backslash-escaped; `&`, `<`, `>` become HTML entities; line breaks become
/// spaces.
#[must_use]
pub fn escape_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' | '|' | '*' | '_' | '`' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' | '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Truncates to at most `max_chars` characters, marking the cut with `...`.
#[must_use]
pub fn truncate_preview(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let kept: String = raw.chars().take(max_chars).collect();
    format!("{kept}...")
}

/// Hands out identifiers that are unique within one diagram.
///
/// When two names sanitize to the same identifier, or an identifier is a
/// reserved word, `_2`, `_3`, ... is appended until it is free.
#[derive(Debug, Default)]
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an identifier derived from `raw`.
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = sanitize_identifier(raw);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) || is_reserved(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

fn is_reserved(candidate: &str) -> bool {
    RESERVED_IDENTIFIERS
        .iter()
        .any(|word| word.eq_ignore_ascii_case(candidate))
}
