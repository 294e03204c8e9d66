use crate::grammar::definition::{GrammarDefinition, MatchRule, RawRule};
use crate::grammar::error::GrammarError;
use crate::token::TokenKind;
use onig::{Region, SearchOptions};
use regex::Regex as RustRegex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Opaque handle of a state in a compiled [`Grammar`].
///
/// Ids are dense indices into the grammar's state table and are only meaningful for the
/// grammar that produced them. Use [`Grammar::state_name`] to get the name back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u16);

impl StateId {
    /// `None` when `index` does not fit the id width.
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index).ok().map(Self)
    }

    /// Position of this state in the grammar's state table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compiled pattern rule.
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    regex: Arc<onig::Regex>,
    kind: TokenKind,
    captures: Vec<(usize, TokenKind)>,
    next: Option<StateId>,
}

/// Where a rule matched, in bytes relative to the line start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleMatch {
    pub end: usize,
    /// Capture spans `(start, end, kind)` in ascending, non-overlapping order.
    pub captures: Vec<(usize, usize, TokenKind)>,
}

impl Rule {
    /// Pattern source after variable substitution.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Kind emitted for the part of a match no capture covers.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Per-group kinds, ordered by group index.
    pub fn captures(&self) -> &[(usize, TokenKind)] {
        &self.captures
    }

    /// State switched to after this rule matches.
    pub fn next(&self) -> Option<StateId> {
        self.next
    }

    /// Try the rule at byte offset `at` of `line`. Zero-length matches are not matches.
    pub(crate) fn match_at(&self, line: &str, at: usize) -> Option<RuleMatch> {
        let mut region = Region::new();
        let len = self.regex.match_with_options(
            line,
            at,
            SearchOptions::SEARCH_OPTION_NONE,
            Some(&mut region),
        )?;
        if len == 0 {
            return None;
        }
        let end = at + len;

        let mut captures = Vec::new();
        if !self.captures.is_empty() {
            let mut spans: Vec<(usize, usize, TokenKind)> = self
                .captures
                .iter()
                .filter_map(|&(group, kind)| {
                    let (s, e) = region.pos(group)?;
                    (s < e && s >= at && e <= end).then_some((s, e, kind))
                })
                .collect();
            spans.sort_by_key(|&(s, _, _)| s);

            // Nested or overlapping groups: the earlier span wins.
            let mut cursor = at;
            for (s, e, kind) in spans {
                if s >= cursor {
                    captures.push((s, e, kind));
                    cursor = e;
                }
            }
        }

        Some(RuleMatch { end, captures })
    }
}

/// A compiled state: ordered rules, a mandatory fallback and an optional end-of-line transition.
#[derive(Debug, Clone)]
pub struct State {
    name: String,
    rules: Vec<Rule>,
    fallback: TokenKind,
    end_of_line: Option<StateId>,
}

impl State {
    /// The state's name in the grammar definition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pattern rules in priority order (includes already expanded).
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Kind emitted, one char at a time, when no rule matches.
    pub fn fallback(&self) -> TokenKind {
        self.fallback
    }

    /// State taken when the cursor reaches the end of a line, if any.
    pub fn end_of_line(&self) -> Option<StateId> {
        self.end_of_line
    }
}

/// A validated, immutable state table.
///
/// Construction checks that every state has exactly one fallback in last position, that
/// every referenced state exists, and that no rule can match empty input. A `Grammar` is
/// `Send + Sync` and meant to be shared behind an [`Arc`].
#[derive(Debug, Clone)]
pub struct Grammar {
    name: Option<String>,
    states: Vec<State>,
    initial: StateId,
}

impl Grammar {
    /// Parse and compile a grammar from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GrammarError> {
        let definition = GrammarDefinition::from_yaml_str(yaml)?;
        Self::from_definition(definition)
    }

    /// Read, parse and compile a grammar file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Compile a parsed definition.
    #[tracing::instrument(level = "debug", skip_all, fields(name = definition.name.as_deref()))]
    pub fn from_definition(definition: GrammarDefinition) -> Result<Self, GrammarError> {
        if definition.states.is_empty() {
            return Err(GrammarError::Empty);
        }

        let var_ref = RustRegex::new(VARIABLE_REF).map_err(|e| GrammarError::RegexCompile {
            pattern: VARIABLE_REF.to_string(),
            message: e.to_string(),
        })?;
        let variables = realize_variables(&definition.variables, &var_ref)?;

        let state_count = definition.states.len();
        let ids = definition
            .states
            .keys()
            .enumerate()
            .map(|(i, name)| {
                StateId::from_index(i)
                    .map(|id| (name.as_str(), id))
                    .ok_or(GrammarError::TooManyStates(state_count))
            })
            .collect::<Result<HashMap<&str, StateId>, _>>()?;

        let initial = *ids
            .get(definition.initial.as_str())
            .ok_or_else(|| GrammarError::UnknownInitialState(definition.initial.clone()))?;

        let compiler = StateCompiler {
            definition: &definition,
            ids: &ids,
            variables: &variables,
            var_ref: &var_ref,
        };

        let mut states = Vec::with_capacity(definition.states.len());
        for name in definition.states.keys() {
            states.push(compiler.compile_state(name)?);
        }

        let grammar = Self {
            name: definition.name.clone(),
            states,
            initial,
        };

        let unreachable = grammar.unreachable_states();
        if !unreachable.is_empty() {
            tracing::debug!(?unreachable, "grammar has unreachable states");
        }
        tracing::debug!(
            states = grammar.states.len(),
            initial = grammar.state_name(initial),
            "grammar compiled"
        );
        Ok(grammar)
    }

    /// Optional human-readable name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The state the first line of a document starts in.
    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    /// Look a state up by name.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .and_then(StateId::from_index)
    }

    /// Name of a state.
    ///
    /// Ids from a different grammar may be out of range; they map to `"<unknown>"`.
    pub fn state_name(&self, id: StateId) -> &str {
        self.states
            .get(id.index())
            .map(|s| s.name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Get a state by id.
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// All states, indexed by [`StateId::index`].
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub(crate) fn state_unchecked(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    fn unreachable_states(&self) -> Vec<&str> {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![self.initial];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            let state = &self.states[id.index()];
            stack.extend(state.rules.iter().filter_map(Rule::next));
            stack.extend(state.end_of_line);
        }
        self.states
            .iter()
            .zip(seen)
            .filter(|(_, reached)| !reached)
            .map(|(s, _)| s.name.as_str())
            .collect()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} states, initial '{}')",
            self.name.as_deref().unwrap_or("<unnamed grammar>"),
            self.states.len(),
            self.state_name(self.initial)
        )
    }
}

struct StateCompiler<'a> {
    definition: &'a GrammarDefinition,
    ids: &'a HashMap<&'a str, StateId>,
    variables: &'a HashMap<String, String>,
    var_ref: &'a RustRegex,
}

impl StateCompiler<'_> {
    fn compile_state(&self, name: &str) -> Result<State, GrammarError> {
        let entries = &self.definition.states[name];

        let mut rules = Vec::new();
        let mut fallback = None;
        let mut end_of_line = None;

        for entry in entries {
            if fallback.is_some() {
                return Err(match entry {
                    RawRule::Fallback(_) => GrammarError::DuplicateFallback(name.to_string()),
                    _ => GrammarError::FallbackNotLast(name.to_string()),
                });
            }
            match entry {
                RawRule::Match(m) => rules.push(self.compile_rule(name, m)?),
                RawRule::Include(i) => {
                    let mut visiting = HashSet::from([name.to_string()]);
                    self.expand_include(name, &i.include, &mut rules, &mut visiting)?;
                }
                RawRule::EndOfLine(e) => {
                    if end_of_line.is_some() {
                        return Err(GrammarError::DuplicateEndOfLine(name.to_string()));
                    }
                    end_of_line = Some(self.resolve(name, &e.next)?);
                }
                RawRule::Fallback(f) => fallback = Some(f.fallback),
            }
        }

        let fallback = fallback.ok_or_else(|| GrammarError::MissingFallback(name.to_string()))?;

        Ok(State {
            name: name.to_string(),
            rules,
            fallback,
            end_of_line,
        })
    }

    /// Splice the match rules of `target` (recursively) into `out`.
    ///
    /// Fallback and end-of-line entries of included states are ignored: they belong to the
    /// including state.
    fn expand_include(
        &self,
        state: &str,
        target: &str,
        out: &mut Vec<Rule>,
        visiting: &mut HashSet<String>,
    ) -> Result<(), GrammarError> {
        let Some(entries) = self.definition.states.get(target) else {
            return Err(GrammarError::UnknownState {
                state: state.to_string(),
                target: target.to_string(),
            });
        };
        if !visiting.insert(target.to_string()) {
            return Err(GrammarError::IncludeCycle(target.to_string()));
        }

        for entry in entries {
            match entry {
                RawRule::Match(m) => out.push(self.compile_rule(target, m)?),
                RawRule::Include(i) => self.expand_include(target, &i.include, out, visiting)?,
                RawRule::EndOfLine(_) | RawRule::Fallback(_) => {}
            }
        }

        visiting.remove(target);
        Ok(())
    }

    fn compile_rule(&self, state: &str, rule: &MatchRule) -> Result<Rule, GrammarError> {
        let source = substitute_variables(&rule.regex, self.variables, self.var_ref)?;
        let regex = onig::Regex::new(&source).map_err(|e| GrammarError::RegexCompile {
            pattern: source.clone(),
            message: e.to_string(),
        })?;

        if can_match_empty(&regex) {
            return Err(GrammarError::ZeroLengthMatch {
                state: state.to_string(),
                pattern: source,
            });
        }

        let group_count = regex.captures_len();
        let mut captures = Vec::with_capacity(rule.captures.len());
        for (&group, &kind) in &rule.captures {
            if group == 0 || group > group_count {
                return Err(GrammarError::UnknownCaptureGroup {
                    state: state.to_string(),
                    pattern: source,
                    group,
                });
            }
            captures.push((group, kind));
        }

        let next = rule
            .next
            .as_deref()
            .map(|target| self.resolve(state, target))
            .transpose()?;

        Ok(Rule {
            source,
            regex: Arc::new(regex),
            kind: rule.kind,
            captures,
            next,
        })
    }

    fn resolve(&self, state: &str, target: &str) -> Result<StateId, GrammarError> {
        self.ids
            .get(target)
            .copied()
            .ok_or_else(|| GrammarError::UnknownState {
                state: state.to_string(),
                target: target.to_string(),
            })
    }
}

// Inputs a zero-width pattern would typically accept. Every printable ASCII char is tried
// on its own as well, and each probe is tried at every offset so lookbehinds see text.
// Lookarounds needing longer context than these can slip through; `Rule::match_at` still
// refuses empty matches.
const EMPTY_MATCH_PROBES: &[&str] = &[
    "", "\t", "  ", "a:", "x=", " #", " ;", "//", "{{", "}}", "{%", "%}", "key: value",
    "key = value", "[section]", "PA1", "!PB2", "G28", "0.5", "/dev/ttyUSB0", "{x}", "\"q\"",
];

fn can_match_empty(regex: &onig::Regex) -> bool {
    let singles = (b' '..=b'~').map(|b| char::from(b).to_string());
    EMPTY_MATCH_PROBES
        .iter()
        .map(|probe| probe.to_string())
        .chain(singles)
        .any(|probe| {
            (0..=probe.len())
                .filter(|&at| probe.is_char_boundary(at))
                .any(|at| {
                    regex.match_with_options(&probe, at, SearchOptions::SEARCH_OPTION_NONE, None)
                        == Some(0)
                })
        })
}

// Only {{[A-Za-z0-9_]+}} is a variable reference; other braces are left alone.
const VARIABLE_REF: &str = r"\{\{([A-Za-z0-9_]+)\}\}";

fn realize_variables(
    vars: &HashMap<String, String>,
    var_ref: &RustRegex,
) -> Result<HashMap<String, String>, GrammarError> {
    let mut realized = HashMap::new();
    let mut visiting = HashSet::<String>::new();

    for key in vars.keys() {
        realize_one_variable(key, vars, var_ref, &mut realized, &mut visiting)?;
    }

    Ok(realized)
}

fn realize_one_variable(
    key: &str,
    vars: &HashMap<String, String>,
    var_ref: &RustRegex,
    realized: &mut HashMap<String, String>,
    visiting: &mut HashSet<String>,
) -> Result<String, GrammarError> {
    if let Some(val) = realized.get(key) {
        return Ok(val.clone());
    }
    if !visiting.insert(key.to_string()) {
        return Err(GrammarError::CircularVariableReference(key.to_string()));
    }

    let raw = vars
        .get(key)
        .ok_or_else(|| GrammarError::UnknownVariable(key.to_string()))?;

    let mut out = String::new();
    let mut last = 0usize;
    for (m_start, m_end, name) in variable_refs(raw, var_ref) {
        out.push_str(&raw[last..m_start]);
        out.push_str(&realize_one_variable(&name, vars, var_ref, realized, visiting)?);
        last = m_end;
    }
    out.push_str(&raw[last..]);

    visiting.remove(key);
    realized.insert(key.to_string(), out.clone());
    Ok(out)
}

fn substitute_variables(
    text: &str,
    vars: &HashMap<String, String>,
    var_ref: &RustRegex,
) -> Result<String, GrammarError> {
    let mut out = String::new();
    let mut last = 0usize;
    for (m_start, m_end, name) in variable_refs(text, var_ref) {
        out.push_str(&text[last..m_start]);
        let value = vars
            .get(&name)
            .ok_or_else(|| GrammarError::UnknownVariable(name.clone()))?;
        out.push_str(value);
        last = m_end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn variable_refs(text: &str, var_ref: &RustRegex) -> Vec<(usize, usize, String)> {
    var_ref
        .captures_iter(text)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let name = cap.get(1)?.as_str().to_string();
            Some((m.start(), m.end(), name))
        })
        .collect()
}
