//! Grammar definitions: loading, validation and the built-in Klipper grammar.
//!
//! A grammar is a YAML state table. Each state lists its rules in priority order:
//!
//! ```yaml
//! initial: start
//! variables:
//!   ident: '[A-Za-z_][A-Za-z0-9_]*'
//! states:
//!   start:
//!     - match: '^{{ident}}(?=[=:])'   # Oniguruma syntax, anchored at the cursor
//!       kind: key
//!       next: after-key
//!     - fallback: text               # required, last, exactly once
//!   after-key:
//!     - match: '[=:]'
//!       kind: operator
//!       next: value
//!     - end-of-line: start
//!     - fallback: text
//!   value:
//!     - include: numbers             # splice another state's match rules
//!     - end-of-line: start           # zero-width transition at end of line
//!     - fallback: value-text
//!   numbers:
//!     - match: '\d+'
//!       kind: number
//!     - fallback: value-text
//! ```

mod compiler;
mod definition;
mod error;
mod klipper;

pub use compiler::{Grammar, Rule, State, StateId};
pub use definition::{
    EndOfLineRule, FallbackRule, GrammarDefinition, IncludeRule, MatchRule, RawRule,
};
pub use error::GrammarError;
pub use klipper::KLIPPER_GRAMMAR_YAML;
