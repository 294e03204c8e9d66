use crate::token::TokenKind;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Deserialize)]
/// Raw YAML grammar definition, before validation.
pub struct GrammarDefinition {
    #[serde(default)]
    /// Optional human-readable name.
    pub name: Option<String>,

    #[serde(default = "default_initial")]
    /// State in effect at the start of the document (defaults to `start`).
    pub initial: String,

    #[serde(default)]
    /// Variables used for `{{name}}` substitution in `match` patterns.
    pub variables: HashMap<String, String>,

    /// Ordered rule lists keyed by state name.
    pub states: BTreeMap<String, Vec<RawRule>>,
}

fn default_initial() -> String {
    "start".to_string()
}

impl GrammarDefinition {
    /// Parse a definition from YAML text without compiling it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[derive(Debug, Clone)]
/// A single entry in a state's rule list.
pub enum RawRule {
    /// A pattern rule.
    Match(MatchRule),
    /// Splice another state's pattern rules in place.
    Include(IncludeRule),
    /// Zero-width transition taken once the cursor reaches the end of the line.
    EndOfLine(EndOfLineRule),
    /// The state's default kind for text no rule matches.
    Fallback(FallbackRule),
}

impl<'de> Deserialize<'de> for RawRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Value::Mapping(map) = &value else {
            return Err(serde::de::Error::custom("state rules must be YAML mappings"));
        };

        let has_key = |k: &str| map.contains_key(Value::String(k.to_string()));

        if has_key("match") {
            let rule: MatchRule = serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
            return Ok(Self::Match(rule));
        }

        if has_key("include") {
            let rule: IncludeRule =
                serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
            return Ok(Self::Include(rule));
        }

        if has_key("end-of-line") {
            let rule: EndOfLineRule =
                serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
            return Ok(Self::EndOfLine(rule));
        }

        if has_key("fallback") {
            let rule: FallbackRule =
                serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
            return Ok(Self::Fallback(rule));
        }

        Err(serde::de::Error::custom(
            "rule must have one of `match`, `include`, `end-of-line` or `fallback`",
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
/// A `match:` rule.
pub struct MatchRule {
    #[serde(rename = "match")]
    /// Pattern source (Oniguruma syntax, variables not yet substituted).
    pub regex: String,

    /// Kind emitted for the matched text not covered by a capture.
    pub kind: TokenKind,

    #[serde(default)]
    /// State to switch to after the match.
    pub next: Option<String>,

    #[serde(default)]
    /// Kinds for individual capture groups.
    pub captures: BTreeMap<usize, TokenKind>,

    #[serde(default)]
    /// Optional comment (ignored).
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// An `include:` entry.
pub struct IncludeRule {
    /// Name of the state whose match rules are spliced in.
    pub include: String,
}

#[derive(Debug, Clone, Deserialize)]
/// An `end-of-line:` entry.
pub struct EndOfLineRule {
    #[serde(rename = "end-of-line")]
    /// Target state.
    pub next: String,
}

#[derive(Debug, Clone, Deserialize)]
/// A `fallback:` entry.
pub struct FallbackRule {
    /// Kind emitted for unmatched chars.
    pub fallback: TokenKind,
}
