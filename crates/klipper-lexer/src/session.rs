//! Incremental, per-document tokenization.
//!
//! A [`SessionTokenizer`] keeps the text, start state and tokens of every line of one
//! document. Each edit re-lexes the edited line with its recorded start state and moves on
//! to the next line only while the end state disagrees with what that line was previously
//! started with. An edit that leaves the end state alone costs a single line.

use crate::grammar::{Grammar, StateId};
use crate::line_ending::{LineEnding, split_lines};
use crate::token::LineTokens;
use crate::tokenizer::tokenize_line;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Contract violations of the session API.
///
/// These are caller bugs, not tokenization outcomes. When one is returned the session is left
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A line index at or past the end of the document.
    #[error("line {line} out of range (document has {line_count} lines)")]
    LineOutOfRange {
        /// The offending index.
        line: usize,
        /// Lines in the document.
        line_count: usize,
    },
    /// A line range that does not fit in the document.
    #[error("lines {start}..{start}+{count} out of range (document has {line_count} lines)")]
    RangeOutOfBounds {
        /// First line of the range.
        start: usize,
        /// Number of lines in the range.
        count: usize,
        /// Lines in the document.
        line_count: usize,
    },
    /// Line text must not contain `\n` or `\r`.
    #[error("text for line {line} contains a line terminator")]
    LineTerminator {
        /// Index the text was meant for.
        line: usize,
    },
}

/// What an edit did to the token stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenChanges {
    /// Lines that were re-tokenized, in post-edit indices.
    pub relexed: Range<usize>,
    /// Lines whose displayed tokens changed (new lines, edited text, or new classification).
    pub changed_lines: Vec<usize>,
}

impl TokenChanges {
    /// Number of lines re-tokenized by the edit.
    pub fn relexed_count(&self) -> usize {
        self.relexed.len()
    }

    /// Returns `true` if nothing needs to be redrawn.
    pub fn is_empty(&self) -> bool {
        self.changed_lines.is_empty()
    }
}

#[derive(Debug, Clone)]
struct LineEntry {
    text: String,
    start_state: StateId,
    tokens: Arc<LineTokens>,
}

impl LineEntry {
    fn pending(text: String, start_state: StateId) -> Self {
        Self {
            text,
            start_state,
            tokens: Arc::new(LineTokens::new(Vec::new(), start_state)),
        }
    }
}

/// Tokenizer state for one open document.
///
/// Sessions are independent: each document owns its own, and the only shared piece is the
/// read-only [`Grammar`]. Token results are handed out as `Arc<LineTokens>`, so a reader can
/// keep a previous result while the session computes a new one.
#[derive(Debug, Clone)]
pub struct SessionTokenizer {
    grammar: Arc<Grammar>,
    lines: Vec<LineEntry>,
    line_ending: LineEnding,
}

impl SessionTokenizer {
    /// Create a session holding a single empty line.
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self::from_text(grammar, "")
    }

    /// Create a session for `text` and tokenize it completely.
    pub fn from_text(grammar: Arc<Grammar>, text: &str) -> Self {
        let mut session = Self {
            grammar,
            lines: Vec::new(),
            line_ending: LineEnding::Lf,
        };
        session.set_text(text);
        session
    }

    /// Replace the whole document and tokenize it from scratch.
    ///
    /// The line ending convention of `text` is remembered for [`Self::text_with_line_ending`].
    pub fn set_text(&mut self, text: &str) -> TokenChanges {
        let initial = self.grammar.initial_state();
        self.line_ending = LineEnding::detect_in_text(text);
        self.lines = split_lines(text)
            .into_iter()
            .map(|line| LineEntry::pending(line, initial))
            .collect();

        let count = self.lines.len();
        let changes = self.relex_from(0, 0..count);
        tracing::debug!(lines = count, "session text replaced");
        changes
    }

    /// The grammar this session tokenizes with.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Number of lines in the document.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of a line.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(|l| l.text.as_str())
    }

    /// Tokens of a line.
    pub fn line_tokens(&self, line: usize) -> Option<Arc<LineTokens>> {
        self.lines.get(line).map(|l| l.tokens.clone())
    }

    /// State in effect at the start of a line.
    pub fn start_state(&self, line: usize) -> Option<StateId> {
        self.lines.get(line).map(|l| l.start_state)
    }

    /// Start state of every line, in order.
    pub fn lex_states(&self) -> Vec<StateId> {
        self.lines.iter().map(|l| l.start_state).collect()
    }

    /// State after the last line (the initial state for an empty document).
    pub fn end_state(&self) -> StateId {
        self.lines
            .last()
            .map(|l| l.tokens.end_state())
            .unwrap_or_else(|| self.grammar.initial_state())
    }

    /// The document text joined with LF.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Line ending detected by the last [`Self::set_text`].
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// The document text joined with its original line ending.
    pub fn text_with_line_ending(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(self.line_ending.as_str())
    }

    /// Replace the text of one line and re-lex as far as the state change reaches.
    pub fn on_line_changed(
        &mut self,
        line: usize,
        text: impl Into<String>,
    ) -> Result<TokenChanges, SessionError> {
        let text = text.into();
        let line_count = self.lines.len();
        if line >= line_count {
            return Err(SessionError::LineOutOfRange { line, line_count });
        }
        if has_line_terminator(&text) {
            return Err(SessionError::LineTerminator { line });
        }

        let entry = &mut self.lines[line];
        let text_changed = entry.text != text;
        entry.text = text;

        let forced = if text_changed { line..line + 1 } else { line..line };
        let changes = self.relex_from(line, forced);
        tracing::debug!(
            line,
            relexed = changes.relexed_count(),
            changed = changes.changed_lines.len(),
            "line changed"
        );
        Ok(changes)
    }

    /// Insert lines before index `at` (`at == line_count` appends).
    pub fn on_lines_inserted<I, S>(
        &mut self,
        at: usize,
        lines: I,
    ) -> Result<TokenChanges, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let line_count = self.lines.len();
        if at > line_count {
            return Err(SessionError::LineOutOfRange { line: at, line_count });
        }

        let texts: Vec<String> = lines.into_iter().map(Into::into).collect();
        if let Some(offset) = texts.iter().position(|t| has_line_terminator(t)) {
            return Err(SessionError::LineTerminator { line: at + offset });
        }
        if texts.is_empty() {
            return Ok(TokenChanges {
                relexed: at..at,
                changed_lines: Vec::new(),
            });
        }

        let start = self.state_before(at);
        let count = texts.len();
        self.lines.splice(
            at..at,
            texts.into_iter().map(|t| LineEntry::pending(t, start)),
        );

        let changes = self.relex_from(at, at..at + count);
        tracing::debug!(
            at,
            count,
            relexed = changes.relexed_count(),
            "lines inserted"
        );
        Ok(changes)
    }

    /// Remove `count` lines starting at `at`.
    ///
    /// A document always has at least one line: removing every line leaves a single empty one.
    pub fn on_lines_removed(
        &mut self,
        at: usize,
        count: usize,
    ) -> Result<TokenChanges, SessionError> {
        let line_count = self.lines.len();
        if at.checked_add(count).is_none_or(|end| end > line_count) {
            return Err(SessionError::RangeOutOfBounds {
                start: at,
                count,
                line_count,
            });
        }
        if count == 0 {
            return Ok(TokenChanges {
                relexed: at..at,
                changed_lines: Vec::new(),
            });
        }

        self.lines.drain(at..at + count);
        if self.lines.is_empty() {
            let initial = self.grammar.initial_state();
            self.lines.push(LineEntry::pending(String::new(), initial));
            let changes = self.relex_from(0, 0..1);
            tracing::debug!(count, "all lines removed");
            return Ok(changes);
        }
        if at >= self.lines.len() {
            return Ok(TokenChanges {
                relexed: at..at,
                changed_lines: Vec::new(),
            });
        }

        self.lines[at].start_state = self.state_before(at);
        let changes = self.relex_from(at, at..at);
        tracing::debug!(
            at,
            count,
            relexed = changes.relexed_count(),
            "lines removed"
        );
        Ok(changes)
    }

    fn state_before(&self, line: usize) -> StateId {
        match line.checked_sub(1).and_then(|prev| self.lines.get(prev)) {
            Some(prev) => prev.tokens.end_state(),
            None => self.grammar.initial_state(),
        }
    }

    /// Re-lex from `first` until a line's end state matches the next line's recorded start
    /// state. Lines in `forced` are always re-lexed and always reported as changed.
    fn relex_from(&mut self, first: usize, forced: Range<usize>) -> TokenChanges {
        let mut changed_lines = Vec::new();
        let mut line = first;

        while line < self.lines.len() {
            let entry = &mut self.lines[line];
            let tokens = tokenize_line(&entry.text, entry.start_state, &self.grammar);
            let end_state = tokens.end_state();
            if forced.contains(&line) || entry.tokens.tokens() != tokens.tokens() {
                changed_lines.push(line);
            }
            entry.tokens = Arc::new(tokens);
            line += 1;

            let Some(next) = self.lines.get_mut(line) else {
                break;
            };
            if next.start_state == end_state && !forced.contains(&line) {
                break;
            }
            if next.start_state != end_state {
                tracing::trace!(
                    line,
                    from = self.grammar.state_name(next.start_state),
                    to = self.grammar.state_name(end_state),
                    "start state changed, cascading"
                );
            }
            next.start_state = end_state;
        }

        TokenChanges {
            relexed: first..line,
            changed_lines,
        }
    }
}

fn has_line_terminator(text: &str) -> bool {
    text.contains(['\n', '\r'])
}
