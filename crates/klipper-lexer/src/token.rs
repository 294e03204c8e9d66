//! Token vocabulary and per-line tokenization results.
//!
//! Token kinds are semantic labels only. Mapping a kind to a color is the job of the
//! rendering surface; [`TokenKind::scope`] gives a stable dotted name to key a theme on.

use crate::grammar::StateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of classifications a grammar may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// Full-line or trailing comment.
    Comment,
    /// Section header such as `[stepper_x]`, including its brackets.
    Section,
    /// The path inside an `[include ...]` header.
    IncludePath,
    /// Configuration key (left of the separator).
    Key,
    /// Key/value separator (`:` or `=`).
    Operator,
    /// Pin-style identifier such as `PB10`, `!PA3` or `ebb:PB3`.
    PinReference,
    /// Numeric literal, optionally signed and fractional.
    Number,
    /// `true`, `false`, `yes`, `no`, `on` or `off`.
    Boolean,
    /// Single or double quoted string.
    String,
    /// `{...}`, `{{...}}` or `{%...%}` template interpolation.
    VariableInterpolation,
    /// G-code style command such as `G28` or `M104`.
    CommandMnemonic,
    /// Value text no specific rule recognized.
    ValueText,
    /// Plain text (whitespace, unrecognized text outside values).
    Text,
}

impl TokenKind {
    /// Every kind, in declaration order.
    pub const ALL: [TokenKind; 13] = [
        TokenKind::Comment,
        TokenKind::Section,
        TokenKind::IncludePath,
        TokenKind::Key,
        TokenKind::Operator,
        TokenKind::PinReference,
        TokenKind::Number,
        TokenKind::Boolean,
        TokenKind::String,
        TokenKind::VariableInterpolation,
        TokenKind::CommandMnemonic,
        TokenKind::ValueText,
        TokenKind::Text,
    ];

    /// The kebab-case name used in grammar files (`"pin-reference"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::Section => "section",
            TokenKind::IncludePath => "include-path",
            TokenKind::Key => "key",
            TokenKind::Operator => "operator",
            TokenKind::PinReference => "pin-reference",
            TokenKind::Number => "number",
            TokenKind::Boolean => "boolean",
            TokenKind::String => "string",
            TokenKind::VariableInterpolation => "variable-interpolation",
            TokenKind::CommandMnemonic => "command-mnemonic",
            TokenKind::ValueText => "value-text",
            TokenKind::Text => "text",
        }
    }

    /// Look a kind up by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// A dotted scope name suitable as a theme lookup key.
    ///
    /// Themes can match on prefixes (`constant`, `string`, ...), so related kinds share one.
    pub fn scope(self) -> &'static str {
        match self {
            TokenKind::Comment => "comment.line",
            TokenKind::Section => "entity.name.section",
            TokenKind::IncludePath => "string.unquoted.include-path",
            TokenKind::Key => "variable.other.key",
            TokenKind::Operator => "keyword.operator",
            TokenKind::PinReference => "constant.other.pin",
            TokenKind::Number => "constant.numeric",
            TokenKind::Boolean => "constant.language.boolean",
            TokenKind::String => "string.quoted",
            TokenKind::VariableInterpolation => "variable.interpolation",
            TokenKind::CommandMnemonic => "support.function.command",
            TokenKind::ValueText => "string.value",
            TokenKind::Text => "text",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified span of a single line.
///
/// `start` and `len` are in chars (Unicode scalar values), relative to the line start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    /// Classification of the span.
    pub kind: TokenKind,
    /// Char offset of the first char of the span.
    pub start: usize,
    /// Span length in chars (never zero).
    pub len: usize,
}

impl Token {
    /// Create a token covering `[start, start + len)`.
    pub fn new(kind: TokenKind, start: usize, len: usize) -> Self {
        Self { kind, start, len }
    }

    /// Exclusive end char offset.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// The result of tokenizing one line: its tokens plus the state in effect after it.
///
/// Results are never mutated once built; re-lexing a line produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTokens {
    tokens: Vec<Token>,
    end_state: StateId,
}

impl LineTokens {
    pub(crate) fn new(tokens: Vec<Token>, end_state: StateId) -> Self {
        Self { tokens, end_state }
    }

    /// Tokens in line order. They partition the line exactly.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// State the next line starts in.
    pub fn end_state(&self) -> StateId {
        self.end_state
    }

    /// Number of chars covered by the tokens.
    pub fn char_len(&self) -> usize {
        self.tokens.last().map(Token::end).unwrap_or(0)
    }

    /// Pair each token with its text, given the line the tokens were produced from.
    ///
    /// Tokens reaching past the end of `line` are clamped.
    pub fn segments<'a>(&self, line: &'a str) -> Vec<(TokenKind, &'a str)> {
        let offsets: Vec<usize> = line
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(line.len()))
            .collect();
        let byte_at = |char_offset: usize| offsets.get(char_offset).copied().unwrap_or(line.len());

        self.tokens
            .iter()
            .map(|t| (t.kind, &line[byte_at(t.start)..byte_at(t.end())]))
            .collect()
    }
}
