#![warn(missing_docs)]
//! `klipper-lexer` - state-machine tokenizer for Klipper printer configuration files.
//!
//! A [`Grammar`] is a table of named states, each an ordered list of regex rules with an
//! optional end-of-line transition and a fallback kind. [`tokenize_line`] lexes one line from
//! a start state and reports the state the line ends in. [`SessionTokenizer`] keeps one
//! document's per-line results and, after an edit, re-lexes only the changed lines plus the
//! lines whose start state actually changed.
//!
//! ```no_run
//! use klipper_lexer::{Grammar, SessionTokenizer};
//! use std::sync::Arc;
//!
//! let grammar = Arc::new(Grammar::klipper()?);
//! let mut session = SessionTokenizer::from_text(grammar, "[mcu]\nserial: /dev/ttyACM0\n");
//! let changes = session.on_line_changed(1, "serial: /dev/ttyUSB0")?;
//! assert_eq!(changes.relexed_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod grammar;
pub mod highlight;
pub mod line_ending;
pub mod session;
pub mod token;

mod tokenizer;

pub use grammar::{Grammar, GrammarError, StateId};
pub use highlight::{Interval, highlight_intervals};
pub use line_ending::{LineEnding, normalize_line_endings, split_lines};
pub use session::{SessionError, SessionTokenizer, TokenChanges};
pub use token::{LineTokens, Token, TokenKind};
pub use tokenizer::{tokenize_document, tokenize_line, tokenize_lines};
