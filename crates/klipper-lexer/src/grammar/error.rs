use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced while loading or validating a grammar.
///
/// All of these are construction-time defects: a grammar that compiles can tokenize any input.
pub enum GrammarError {
    #[error("YAML parse error: {0}")]
    /// YAML parsing failed.
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    /// Reading a grammar file failed.
    Io(#[from] std::io::Error),

    #[error("grammar defines no states")]
    /// The state table is empty.
    Empty,

    #[error("grammar defines {0} states, more than a state id can address")]
    /// State ids are 16-bit; larger tables are rejected.
    TooManyStates(usize),

    #[error("initial state '{0}' is not defined")]
    /// The designated initial state does not exist.
    UnknownInitialState(String),

    #[error("state '{state}' refers to undefined state '{target}'")]
    /// A `next`, `end-of-line` or `include` target does not exist.
    UnknownState {
        /// State containing the reference.
        state: String,
        /// The missing state name.
        target: String,
    },

    #[error("state '{0}' has no fallback rule")]
    /// Every state needs a fallback so tokenization always makes progress.
    MissingFallback(String),

    #[error("state '{0}' has more than one fallback rule")]
    /// At most one fallback is allowed per state.
    DuplicateFallback(String),

    #[error("state '{0}' has rules after its fallback rule")]
    /// The fallback must be the last entry of a state.
    FallbackNotLast(String),

    #[error("state '{0}' has more than one end-of-line rule")]
    /// At most one end-of-line transition is allowed per state.
    DuplicateEndOfLine(String),

    #[error("include cycle detected involving state '{0}'")]
    /// `include` entries formed a cycle.
    IncludeCycle(String),

    #[error("rule '{pattern}' in state '{state}' can match empty input")]
    /// A rule that matches zero chars would never advance the cursor.
    ZeroLengthMatch {
        /// State containing the rule.
        state: String,
        /// The expanded pattern source.
        pattern: String,
    },

    #[error("rule '{pattern}' in state '{state}' has no capture group {group}")]
    /// A `captures` entry names a group the pattern does not define.
    UnknownCaptureGroup {
        /// State containing the rule.
        state: String,
        /// The expanded pattern source.
        pattern: String,
        /// The missing group index.
        group: usize,
    },

    #[error("unknown variable '{0}'")]
    /// A `{{name}}` reference has no definition.
    UnknownVariable(String),

    #[error("circular variable reference '{0}'")]
    /// Variable expansion loop detected.
    CircularVariableReference(String),

    #[error("regex compile error for pattern '{pattern}': {message}")]
    /// A pattern failed to compile.
    RegexCompile {
        /// The pattern source.
        pattern: String,
        /// The compiler error message.
        message: String,
    },
}
