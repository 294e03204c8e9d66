use crate::grammar::compiler::Grammar;
use crate::grammar::error::GrammarError;

/// Source of the built-in Klipper configuration grammar.
pub const KLIPPER_GRAMMAR_YAML: &str = include_str!("../../grammars/klipper.yaml");

impl Grammar {
    /// Compile the built-in Klipper configuration grammar.
    ///
    /// Compiling takes a moment; build it once and share it behind an `Arc`.
    pub fn klipper() -> Result<Self, GrammarError> {
        Self::from_yaml_str(KLIPPER_GRAMMAR_YAML)
    }
}
