// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

pub(crate) mod tests;

use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::ops::Range;
use crate::byteset::GroupId;
use crate::dfa::Dfa;
use crate::lexergen::{LexFlags, RuleId, INITIAL};
use crate::log::{BufLog, LogReader};
use crate::{escape_bytes, LexStateId, StateId, TokenId, EOI, INVALID};

// ---------------------------------------------------------------------------------------------
// Types used in lexer

/// Lexer state change performed after a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub enum StateChange {
    /// stays in the current state
    #[default]
    Stay,
    /// switches to another state
    Goto(LexStateId),
    /// pushes the current state on the stack and switches to another state
    Push(LexStateId),
    /// pops the state from the stack, or returns to `INITIAL` if the stack is empty
    Pop,
}

impl Display for StateChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StateChange::Stay => write!(f, "."),
            StateChange::Goto(s) => write!(f, "{s}"),
            StateChange::Push(s) => write!(f, ">{s}"),
            StateChange::Pop => write!(f, "<"),
        }
    }
}

/// Terminal instructions of a rule: the token returned, if any, the user data, and the state change.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Terminal {
    pub token: TokenId,
    pub user_data: usize,
    pub change: StateChange,
}

impl Terminal {
    #[inline]
    pub fn is_skip(&self) -> bool {
        self.token < 0
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_skip() { write!(f, "<skip")?; } else { write!(f, "<end:{}", self.token)?; }
        if self.user_data != 0 { write!(f, ",data {}", self.user_data)?; }
        if self.change != StateChange::Stay { write!(f, ",state {}", self.change)?; }
        write!(f, ">")
    }
}

/// Token extracted from an input by a [Cursor].
#[derive(Clone, Debug, PartialEq)]
pub struct Token<'a> {
    pub id: TokenId,
    pub user_data: usize,
    /// position of the lexeme in the input
    pub span: Range<usize>,
    /// lexer state after the match
    pub state: LexStateId,
    pub lexeme: &'a [u8],
}

impl<'a> Token<'a> {
    #[inline]
    pub fn is_eoi(&self) -> bool {
        self.id == EOI
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.id == INVALID
    }

    /// Returns the lexeme, replacing the invalid UTF-8 sequences if necessary.
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.lexeme)
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:\"{}\" @{}-{}", self.id, escape_bytes(self.lexeme), self.span.start, self.span.end)
    }
}

// ---------------------------------------------------------------------------------------------
// Table-based lexer

/// Lexical analyzer built by [LexerGen](crate::lexergen::LexerGen).
///
/// The lexer is immutable; each call to [consume()](Lexer::consume) creates an independent
/// [Cursor] over an input, so the same lexer can scan several inputs at the same time.
#[derive(Clone, Debug)]
pub struct Lexer {
    pub(crate) byte_to_group: Vec<GroupId>,
    pub(crate) dfa: Dfa,
    /// DFA initial state of each lexer state, when not at the start of a line and at the start of a line
    pub(crate) initial_states: Vec<[StateId; 2]>,
    /// terminal of each rule
    pub(crate) terminals: Vec<Terminal>,
    pub(crate) state_names: Vec<String>,
    pub(crate) flags: LexFlags,
    pub(crate) log: BufLog,
}

impl Lexer {
    /// Attaches a new cursor to `input`, in the `INITIAL` state.
    pub fn consume<'l, 'a, T: AsRef<[u8]> + ?Sized>(&'l self, input: &'a T) -> Cursor<'l, 'a> {
        Cursor::new(self, input.as_ref(), INITIAL)
    }

    /// Attaches a new cursor to `input`, in the lexer state `state`.
    pub fn consume_in<'l, 'a, T: AsRef<[u8]> + ?Sized>(&'l self, input: &'a T, state: LexStateId) -> Cursor<'l, 'a> {
        Cursor::new(self, input.as_ref(), state)
    }

    pub fn flags(&self) -> LexFlags {
        self.flags
    }

    pub fn num_states(&self) -> usize {
        self.state_names.len()
    }

    pub fn num_rules(&self) -> usize {
        self.terminals.len()
    }

    pub fn num_dfa_states(&self) -> usize {
        self.dfa.nbr_states
    }

    pub fn state_id(&self, name: &str) -> Option<LexStateId> {
        self.state_names.iter().position(|n| n == name).map(|id| id as LexStateId)
    }

    pub fn state_name(&self, state: LexStateId) -> Option<&str> {
        self.state_names.get(state as usize).map(|s| s.as_str())
    }

    pub fn terminal(&self, rule: RuleId) -> Option<&Terminal> {
        self.terminals.get(rule as usize)
    }

    /// Returns the rule accepted in the DFA state `node` for a match ending at `pos`.
    #[inline]
    fn accepting(&self, node: StateId, input: &[u8], pos: usize) -> Option<RuleId> {
        let accept = self.dfa.accept_table[node];
        let eol_accept = self.dfa.eol_accept_table[node];
        if eol_accept.is_some() && (pos == input.len() || input[pos] == b'\n') {
            eol_accept
        } else {
            accept
        }
    }

    /// Finds the longest match from `start` in the lexer state `state`, and returns the rule and
    /// the end position of the match. Among matches of the same length, the earliest rule wins.
    ///
    /// An unknown lexer state matches nothing.
    pub fn longest_match(&self, input: &[u8], start: usize, state: LexStateId) -> Option<(RuleId, usize)> {
        let bol = start == 0 || input[start - 1] == b'\n';
        let mut node = self.initial_states.get(state as usize)?[bol as usize];
        let mut last = None;
        let mut pos = start;
        loop {
            if let Some(rule) = self.accepting(node, input, pos) {
                last = Some((rule, pos));
            }
            if pos == input.len() {
                break;
            }
            node = self.dfa.next(node, self.byte_to_group[input[pos] as usize]);
            if self.dfa.is_dead(node) {
                break;
            }
            pos += 1;
        }
        last
    }
}

impl LogReader for Lexer {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

// ---------------------------------------------------------------------------------------------
// Cursor

/// Scanning position in an input. The tokens are extracted one by one with
/// [advance()](Cursor::advance), or with the [Iterator] implementation, which stops before
/// the end-of-input token.
#[derive(Clone, Debug)]
pub struct Cursor<'l, 'a> {
    lexer: &'l Lexer,
    input: &'a [u8],
    pos: usize,
    state: LexStateId,
    stack: Vec<LexStateId>,
    /// position of the last zero-length match and the states in which it occurred
    zero_len_pos: usize,
    zero_len_states: Vec<LexStateId>,
    ended: bool,
}

impl<'l, 'a> Cursor<'l, 'a> {
    fn new(lexer: &'l Lexer, input: &'a [u8], state: LexStateId) -> Self {
        Cursor { lexer, input, pos: 0, state, stack: Vec::new(), zero_len_pos: 0, zero_len_states: Vec::new(), ended: false }
    }

    pub fn lexer(&self) -> &'l Lexer {
        self.lexer
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn state(&self) -> LexStateId {
        self.state
    }

    /// Changes the current lexer state.
    pub fn set_state(&mut self, state: LexStateId) {
        self.state = state;
    }

    pub fn state_stack(&self) -> &[LexStateId] {
        &self.stack
    }

    /// Starts the scan in `state` instead of the current state.
    pub fn with_state(mut self, state: LexStateId) -> Self {
        self.state = state;
        self
    }

    fn apply(&mut self, change: StateChange) {
        match change {
            StateChange::Stay => {}
            StateChange::Goto(s) => self.state = s,
            StateChange::Push(s) => {
                self.stack.push(self.state);
                self.state = s;
            }
            StateChange::Pop => self.state = self.stack.pop().unwrap_or(INITIAL),
        }
    }

    /// Checks if a zero-length match is allowed at the current position and state, which is
    /// only once.
    fn allow_zero_len(&mut self) -> bool {
        if self.zero_len_pos != self.pos {
            self.zero_len_pos = self.pos;
            self.zero_len_states.clear();
        }
        if self.zero_len_states.contains(&self.state) {
            false
        } else {
            self.zero_len_states.push(self.state);
            true
        }
    }

    fn token(&self, id: TokenId, user_data: usize, span: Range<usize>) -> Token<'a> {
        let input = self.input;
        Token { id, user_data, lexeme: &input[span.clone()], span, state: self.state }
    }

    /// Scans the next token.
    ///
    /// * Matches of skip rules are consumed but never returned.
    /// * A byte that no rule matches is returned as a one-byte [INVALID] token.
    /// * At the end of the input, the [EOI] token is returned, with an empty span.
    pub fn advance(&mut self) -> Token<'a> {
        loop {
            let start = self.pos;
            if start >= self.input.len() {
                return self.token(EOI, 0, self.input.len()..self.input.len());
            }
            let matched = self.lexer.longest_match(self.input, start, self.state)
                .filter(|&(_, end)| end > start || self.allow_zero_len());
            let Some((rule, end)) = matched else {
                log::trace!("no match at position {start} in lexer state {}", self.state);
                self.pos = start + 1;
                return self.token(INVALID, 0, start..start + 1);
            };
            let lexer = self.lexer;
            let terminal = &lexer.terminals[rule as usize];
            self.apply(terminal.change);
            self.pos = end;
            if !terminal.is_skip() {
                return self.token(terminal.token, terminal.user_data, start..end);
            }
        }
    }
}

impl<'a> Iterator for Cursor<'_, 'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ended {
            return None;
        }
        let token = self.advance();
        if token.is_eoi() {
            self.ended = true;
            None
        } else {
            Some(token)
        }
    }
}
