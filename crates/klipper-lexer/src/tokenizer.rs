//! Line tokenizer.
//!
//! Rules of the current state are tried in declared order at the cursor and the first one
//! that matches wins, even if a later rule would match more text. When nothing matches, the
//! state's fallback consumes a single char. Consecutive fallback chars are merged into one
//! token, so the output stays compact without changing the partition.

use crate::grammar::{Grammar, StateId};
use crate::line_ending::split_lines;
use crate::token::{LineTokens, Token, TokenKind};

/// Tokenize one line (no line terminator) starting in `start`.
///
/// The returned tokens cover `text` exactly and the end state is the state the following
/// line starts in. The function is pure: the same inputs always give the same result.
///
/// # Panics
///
/// Panics if `start` was not produced by `grammar`.
pub fn tokenize_line(text: &str, start: StateId, grammar: &Grammar) -> LineTokens {
    let mut out = TokenSink::new(text);
    let mut state = start;
    let mut pos = 0usize;

    while pos < text.len() {
        let current = grammar.state_unchecked(state);
        let found = current
            .rules()
            .iter()
            .find_map(|rule| rule.match_at(text, pos).map(|m| (rule, m)));

        match found {
            Some((rule, m)) => {
                let mut cursor = pos;
                for (s, e, kind) in m.captures {
                    out.push(rule.kind(), cursor, s);
                    out.push(kind, s, e);
                    cursor = e;
                }
                out.push(rule.kind(), cursor, m.end);
                pos = m.end;

                if let Some(next) = rule.next() {
                    state = next;
                }
            }
            None => {
                let ch_len = text[pos..].chars().next().map_or(1, char::len_utf8);
                out.push_fallback(current.fallback(), pos, pos + ch_len);
                pos += ch_len;
            }
        }
    }

    if let Some(next) = grammar.state_unchecked(state).end_of_line() {
        state = next;
    }

    LineTokens::new(out.finish(), state)
}

/// Tokenize a sequence of lines, threading each line's end state into the next.
pub fn tokenize_lines<'a, I>(lines: I, grammar: &Grammar) -> Vec<LineTokens>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = grammar.initial_state();
    lines
        .into_iter()
        .map(|line| {
            let tokens = tokenize_line(line, state, grammar);
            state = tokens.end_state();
            tokens
        })
        .collect()
}

/// Split `text` into lines (normalizing CRLF/CR) and tokenize all of them.
pub fn tokenize_document(text: &str, grammar: &Grammar) -> Vec<LineTokens> {
    let lines = split_lines(text);
    tokenize_lines(lines.iter().map(String::as_str), grammar)
}

/// Collects tokens while translating byte offsets into char offsets.
struct TokenSink<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    col: usize,
    last_fallback: bool,
}

impl<'a> TokenSink<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: Vec::new(),
            col: 0,
            last_fallback: false,
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let len = self.text[start..end].chars().count();
        self.tokens.push(Token::new(kind, self.col, len));
        self.col += len;
        self.last_fallback = false;
    }

    fn push_fallback(&mut self, kind: TokenKind, start: usize, end: usize) {
        let len = self.text[start..end].chars().count();
        if self.last_fallback
            && let Some(last) = self.tokens.last_mut()
            && last.kind == kind
        {
            last.len += len;
        } else {
            self.tokens.push(Token::new(kind, self.col, len));
        }
        self.col += len;
        self.last_fallback = true;
    }

    fn finish(self) -> Vec<Token> {
        self.tokens
    }
}
