// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Lexer generator.
//!
//! [LexerGen] collects the rules, lexer states, macros and flags, then [builds](LexerGen::build)
//! a [Lexer]. The generator is never modified by a build, so a failed build can be fixed by
//! adding the missing elements and building again.


use std::collections::BTreeMap;
use bitflags::bitflags;
use indexmap::IndexSet;
use thiserror::Error;
use crate::byteset::ByteGroups;
use crate::dfa::DfaBuilder;
use crate::lexer::{Lexer, StateChange, Terminal};
use crate::log::{BufLog, Logger};
use crate::nfa::{Accept, Fragment, Nfa};
use crate::regexgen::{PatternError, PatternErrorKind, Regex, RegexParser};
use crate::{CollectJoin, LexStateId, TokenId, EOI, SKIP};

/// Index of a rule, in declaration order.
pub type RuleId = u32;

/// Handle of the initial lexer state, which always exists.
pub const INITIAL: LexStateId = 0;
pub const INITIAL_NAME: &str = "INITIAL";

/// Pattern of the implicit rule added by [LexFlags::SKIP_WS].
const WHITESPACE_PATTERN: &str = "[ \\t\\n\\r\\f\\v]+";

bitflags! {
    /// Lexer generator options.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LexFlags: u32 {
        /// case-insensitive matching of the ASCII letters
        const ICASE = 1;
        /// `.` doesn't match `\n`
        const DOT_NOT_LF = 2;
        /// `.` matches neither `\r` nor `\n`
        const DOT_NOT_CRLF = 4;
        /// adds a rule skipping whitespace in all states, with the lowest priority
        const SKIP_WS = 8;
        /// allows rules matching an empty string
        const MATCH_ZERO_LEN = 16;
    }
}

// ---------------------------------------------------------------------------------------------
// Errors

#[derive(Clone, Debug, PartialEq, Error)]
pub enum LexerGenError {
    #[error("token ID {0} is reserved for the end of input")]
    ReservedTokenId(TokenId),
    #[error("lexer state '{0}' is already defined")]
    DuplicateState(String),
    #[error("invalid lexer state name '{0}'")]
    InvalidStateName(String),
    #[error("macro '{0}' is already defined")]
    DuplicateMacro(String),
    #[error("invalid macro name '{0}'")]
    InvalidMacroName(String),
    #[error("rule {rule} refers to the unknown lexer state '{state}'")]
    UnknownState { rule: RuleId, state: String },
    #[error("rule {rule}: {error}")]
    Pattern { rule: RuleId, #[source] error: PatternError },
    #[error("rule {rule} can match an empty string (MATCH_ZERO_LEN is not set)")]
    ZeroLength { rule: RuleId },
}

// ---------------------------------------------------------------------------------------------
// Rules

/// Reference to a lexer state, by handle or by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StateRef {
    Id(LexStateId),
    Name(String),
}

impl From<LexStateId> for StateRef {
    fn from(id: LexStateId) -> Self {
        StateRef::Id(id)
    }
}

impl From<&str> for StateRef {
    fn from(name: &str) -> Self {
        StateRef::Name(name.to_string())
    }
}

impl From<String> for StateRef {
    fn from(name: String) -> Self {
        StateRef::Name(name)
    }
}

/// States in which a rule is active.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleScope {
    States(Vec<StateRef>),
    All,
}

impl RuleScope {
    /// Parses a scope: `*` for all states, or a comma-separated list of state names.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "*" => RuleScope::All,
            list => RuleScope::States(list.split(',').map(|name| StateRef::from(name.trim())).collect()),
        }
    }
}

/// Lexer state after a match of a rule.
#[derive(Clone, Debug, PartialEq)]
pub enum Dest {
    /// the state in which the rule matched
    Stay,
    Goto(StateRef),
    /// pushes the state in which the rule matched, then goes to the new state
    Push(StateRef),
    /// returns to the state on the top of the stack
    Pop,
}

impl Dest {
    /// Parses a destination: `.` (stay), `<` (pop), `>NAME` (push), or `NAME` (go to).
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "." => Dest::Stay,
            "<" => Dest::Pop,
            name => match name.strip_prefix('>') {
                Some(pushed) => Dest::Push(StateRef::from(pushed.trim())),
                None => Dest::Goto(StateRef::from(name)),
            },
        }
    }
}

/// Lexer rule.
///
/// ```
/// use lexalr::lexergen::{Dest, LexRule};
/// let rule = LexRule::new("\\\"", 3).in_state("INITIAL").dest(Dest::Push("STRING".into()));
/// let comment = LexRule::range("/\\*", "\\*/", 4).user_data(12);
/// let enter = LexRule::skip("<<").in_all_states().dest(Dest::Goto("HEREDOC".into()));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LexRule {
    pub pattern: String,
    /// end pattern of a range rule
    pub end: Option<String>,
    pub token: TokenId,
    pub user_data: usize,
    pub scope: RuleScope,
    pub dest: Dest,
}

impl LexRule {
    /// Rule returning `token`, active in `INITIAL`.
    pub fn new<T: Into<String>>(pattern: T, token: TokenId) -> Self {
        LexRule { pattern: pattern.into(), end: None, token, user_data: 0, scope: RuleScope::States(vec![StateRef::Id(INITIAL)]), dest: Dest::Stay }
    }

    /// Rule matching from `start` until the first match of `end`.
    pub fn range<T: Into<String>>(start: T, end: T, token: TokenId) -> Self {
        let mut rule = LexRule::new(start, token);
        rule.end = Some(end.into());
        rule
    }

    /// Rule whose matches are dropped.
    pub fn skip<T: Into<String>>(pattern: T) -> Self {
        LexRule::new(pattern, SKIP)
    }

    pub fn user_data(mut self, user_data: usize) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn in_state<S: Into<StateRef>>(mut self, state: S) -> Self {
        self.scope = RuleScope::States(vec![state.into()]);
        self
    }

    pub fn in_states<I: IntoIterator<Item = S>, S: Into<StateRef>>(mut self, states: I) -> Self {
        self.scope = RuleScope::States(states.into_iter().map(|s| s.into()).collect());
        self
    }

    pub fn in_all_states(mut self) -> Self {
        self.scope = RuleScope::All;
        self
    }

    pub fn scope(mut self, scope: RuleScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn dest(mut self, dest: Dest) -> Self {
        self.dest = dest;
        self
    }
}

// ---------------------------------------------------------------------------------------------
// Generator

/// Rule whose patterns and states are resolved.
struct ResolvedRule {
    start: Regex,
    end: Option<Regex>,
    states: Vec<LexStateId>,
    change: StateChange,
}

/// Lexer generator.
///
/// ```
/// use lexalr::lexergen::LexerGen;
///
/// let mut lexgen = LexerGen::new();
/// lexgen.push("if", 1).unwrap();
/// lexgen.push("[a-z]+", 2).unwrap();
/// lexgen.push("\\s+", lexalr::SKIP).unwrap();
/// let lexer = lexgen.build().unwrap();
/// let ids = lexer.consume("if iffy").map(|t| t.id).collect::<Vec<_>>();
/// assert_eq!(ids, vec![1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct LexerGen {
    rules: Vec<LexRule>,
    states: IndexSet<String>,
    macros: BTreeMap<String, String>,
    flags: LexFlags,
}

impl Default for LexerGen {
    fn default() -> Self {
        LexerGen::new()
    }
}

impl LexerGen {
    pub fn new() -> Self {
        LexerGen {
            rules: Vec::new(),
            states: IndexSet::from([INITIAL_NAME.to_string()]),
            macros: BTreeMap::new(),
            flags: LexFlags::empty(),
        }
    }

    pub fn flags(&self) -> LexFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: LexFlags) {
        self.flags = flags;
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[LexRule] {
        &self.rules
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Adds a rule returning `token` in `INITIAL`.
    pub fn push(&mut self, pattern: &str, token: TokenId) -> Result<RuleId, LexerGenError> {
        self.push_rule(LexRule::new(pattern, token))
    }

    /// Adds a range rule returning `token` in `INITIAL`.
    pub fn push_range(&mut self, start: &str, end: &str, token: TokenId) -> Result<RuleId, LexerGenError> {
        self.push_rule(LexRule::range(start, end, token))
    }

    /// Adds a rule and returns its index.
    pub fn push_rule(&mut self, rule: LexRule) -> Result<RuleId, LexerGenError> {
        if rule.token == EOI {
            return Err(LexerGenError::ReservedTokenId(rule.token));
        }
        self.rules.push(rule);
        Ok((self.rules.len() - 1) as RuleId)
    }

    /// Declares a new lexer state and returns its handle.
    pub fn push_state(&mut self, name: &str) -> Result<LexStateId, LexerGenError> {
        let valid = name.bytes().enumerate().all(|(i, b)| b.is_ascii_alphabetic() || b == b'_' || (i > 0 && b.is_ascii_digit()));
        if name.is_empty() || !valid {
            return Err(LexerGenError::InvalidStateName(name.to_string()));
        }
        if self.states.contains(name) {
            return Err(LexerGenError::DuplicateState(name.to_string()));
        }
        self.states.insert(name.to_string());
        Ok((self.states.len() - 1) as LexStateId)
    }

    pub fn state_id(&self, name: &str) -> Option<LexStateId> {
        self.states.get_index_of(name).map(|id| id as LexStateId)
    }

    pub fn state_name(&self, state: LexStateId) -> Option<&str> {
        self.states.get_index(state as usize).map(|s| s.as_str())
    }

    /// Defines a macro, which can be used in the patterns as `{name}`.
    pub fn insert_macro(&mut self, name: &str, regex: &str) -> Result<(), LexerGenError> {
        let valid = name.bytes().enumerate().all(|(i, b)| b.is_ascii_alphabetic() || b == b'_' || (i > 0 && (b.is_ascii_digit() || b == b'-')));
        if name.is_empty() || !valid {
            return Err(LexerGenError::InvalidMacroName(name.to_string()));
        }
        if self.macros.contains_key(name) {
            return Err(LexerGenError::DuplicateMacro(name.to_string()));
        }
        self.macros.insert(name.to_string(), regex.to_string());
        Ok(())
    }

    fn resolve_state(&self, rule: RuleId, state: &StateRef) -> Result<LexStateId, LexerGenError> {
        match state {
            StateRef::Id(id) if (*id as usize) < self.states.len() => Ok(*id),
            StateRef::Id(id) => Err(LexerGenError::UnknownState { rule, state: format!("#{id}") }),
            StateRef::Name(name) => self.state_id(name)
                .ok_or_else(|| LexerGenError::UnknownState { rule, state: name.clone() }),
        }
    }

    fn resolve_rule(&self, id: RuleId, rule: &LexRule, parser: &RegexParser) -> Result<ResolvedRule, LexerGenError> {
        let pattern_error = |error: PatternError| LexerGenError::Pattern { rule: id, error };
        let start = parser.parse(&rule.pattern).map_err(pattern_error)?;
        let end = match &rule.end {
            Some(end) => {
                if start.eol {
                    let error = PatternError::new(rule.pattern.len() - 1, PatternErrorKind::MisplacedAnchor('$'));
                    return Err(pattern_error(error));
                }
                let end = parser.parse(end).map_err(pattern_error)?;
                if end.bol {
                    return Err(pattern_error(PatternError::new(0, PatternErrorKind::MisplacedAnchor('^'))));
                }
                Some(end)
            }
            None => None,
        };
        let nullable = start.is_nullable() && end.as_ref().map(|e| e.is_nullable()).unwrap_or(true);
        if nullable && !self.flags.contains(LexFlags::MATCH_ZERO_LEN) {
            return Err(LexerGenError::ZeroLength { rule: id });
        }
        let states = match &rule.scope {
            RuleScope::All => (0..self.states.len() as LexStateId).collect(),
            RuleScope::States(states) => {
                let mut resolved = Vec::new();
                for state in states {
                    let state = self.resolve_state(id, state)?;
                    if !resolved.contains(&state) {
                        resolved.push(state);
                    }
                }
                resolved
            }
        };
        let change = match &rule.dest {
            Dest::Stay => StateChange::Stay,
            Dest::Goto(s) => StateChange::Goto(self.resolve_state(id, s)?),
            Dest::Push(s) => StateChange::Push(self.resolve_state(id, s)?),
            Dest::Pop => StateChange::Pop,
        };
        Ok(ResolvedRule { start, end, states, change })
    }

    /// Compiles the rules into a [Lexer].
    ///
    /// The build fails if a pattern is invalid, if a rule refers to an unknown state, or if a
    /// rule can match an empty string while [LexFlags::MATCH_ZERO_LEN] is not set.
    pub fn build(&self) -> Result<Lexer, LexerGenError> {
        let mut log = BufLog::new();
        let parser = RegexParser::new(self.flags, &self.macros);
        let mut rules = Vec::<LexRule>::new();
        let mut resolved = Vec::<ResolvedRule>::new();
        for (id, rule) in self.rules.iter().enumerate() {
            resolved.push(self.resolve_rule(id as RuleId, rule, &parser)?);
            rules.push(rule.clone());
        }
        if self.flags.contains(LexFlags::SKIP_WS) {
            let ws = LexRule::skip(WHITESPACE_PATTERN).in_all_states();
            resolved.push(self.resolve_rule(rules.len() as RuleId, &ws, &parser)?);
            rules.push(ws);
        }
        if rules.is_empty() {
            log.add_warning("no lexer rules: every byte of the input will be an invalid token");
        }

        // NFA: two start states for each lexer state, [not at the start of a line, at the start of a line]
        let mut nfa = Nfa::new();
        let starts = (0..self.states.len()).map(|_| [nfa.add_state(), nfa.add_state()]).to_vec();
        for (id, rule) in resolved.iter().enumerate() {
            let mut frag = nfa.add_node(&rule.start.node);
            let eol = match &rule.end {
                Some(end) => {
                    let until = nfa.add_until(&end.node);
                    nfa.add_eps(frag.end, until.start);
                    frag = Fragment { start: frag.start, end: until.end };
                    end.eol
                }
                None => rule.start.eol,
            };
            nfa.set_accept(frag.end, Accept { rule: id as RuleId, eol });
            for &state in &rule.states {
                let [not_bol, bol] = starts[state as usize];
                if !rule.start.bol {
                    nfa.add_eps(not_bol, frag.start);
                }
                nfa.add_eps(bol, frag.start);
            }
        }
        log::debug!("lexer NFA: {} states", nfa.len());

        let groups = ByteGroups::new(nfa.transition_sets());
        let flat_starts = starts.iter().flatten().copied().to_vec();
        let dfa = DfaBuilder::new(&nfa, &groups).build(&flat_starts);
        let initial_states = dfa.initial_states.chunks(2).map(|c| [c[0], c[1]]).to_vec();

        // diagnostics
        let accepted = dfa.accepted_rules();
        for (id, rule) in self.rules.iter().enumerate() {
            if !accepted.contains(&(id as RuleId)) {
                log.add_warning(format!("rule {id} ('{}') is never matched: it is shadowed by earlier rules", rule.pattern));
            }
        }
        for (state, name) in self.states.iter().enumerate().skip(1) {
            let entered = resolved.iter().any(|r| matches!(r.change, StateChange::Goto(s) | StateChange::Push(s) if s as usize == state));
            if !entered {
                log.add_warning(format!("lexer state '{name}' is never entered"));
            }
        }
        log.add_note(format!("lexer: {} rules, {} lexer states, {} DFA states, {} byte groups",
                             rules.len(), self.states.len(), dfa.nbr_states, groups.nbr_groups()));

        let terminals = rules.iter().zip(&resolved)
            .map(|(rule, r)| Terminal { token: rule.token, user_data: rule.user_data, change: r.change })
            .to_vec();
        Ok(Lexer {
            byte_to_group: groups.into_table(),
            dfa,
            initial_states,
            terminals,
            state_names: self.states.iter().cloned().collect(),
            flags: self.flags,
            log,
        })
    }
}
