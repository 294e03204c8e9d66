//! Document-level highlight output for a rendering surface.
//!
//! The rendering surface usually wants flat style runs in document offsets rather than
//! per-line tokens. [`highlight_intervals`] produces those runs; the surface maps each
//! [`TokenKind`] to a color through its own theme, keyed on [`TokenKind::scope`].

use crate::session::SessionTokenizer;
use crate::token::{LineTokens, TokenKind};

/// A styled run in document char offsets (half-open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    /// Start char offset.
    pub start: usize,
    /// End char offset (exclusive).
    pub end: usize,
    /// Classification of the run.
    pub kind: TokenKind,
}

impl Interval {
    /// Create a new interval with `[start, end)` offsets.
    pub fn new(start: usize, end: usize, kind: TokenKind) -> Self {
        Self { start, end, kind }
    }

    /// Check if the interval contains a specific position.
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for an empty interval.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Flatten a session's tokens into document-level intervals.
///
/// Plain [`TokenKind::Text`] runs are omitted (hosts render them with the default style) and
/// adjacent runs of the same kind are merged. Offsets count the LF between lines as one char.
pub fn highlight_intervals(session: &SessionTokenizer) -> Vec<Interval> {
    let mut intervals = Vec::new();
    let mut line_start = 0usize;

    for line in 0..session.line_count() {
        let Some(tokens) = session.line_tokens(line) else {
            continue;
        };
        push_line_intervals(&mut intervals, line_start, &tokens);

        let line_len = session
            .line_text(line)
            .map(|t| t.chars().count())
            .unwrap_or_default();
        line_start += line_len + 1;
    }

    intervals
}

/// Append the intervals of one line whose first char is at document offset `line_start`.
pub fn push_line_intervals(out: &mut Vec<Interval>, line_start: usize, tokens: &LineTokens) {
    for token in tokens.tokens() {
        if token.kind == TokenKind::Text {
            continue;
        }
        let start = line_start + token.start;
        let end = start + token.len;

        if let Some(last) = out.last_mut()
            && last.kind == token.kind
            && last.end == start
        {
            last.end = end;
            continue;
        }
        out.push(Interval::new(start, end, token.kind));
    }
}
