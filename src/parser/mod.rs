// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! LALR(1) parser runtime.


use std::fmt::{Display, Formatter};
use std::ops::Range;
use thiserror::Error;
use crate::grammar::{Production, Symbol};
use crate::lexer::{Lexer, Token};
use crate::log::{BufLog, LogReader};
use crate::parsergen::ParseTables;
use crate::symbol_table::SymbolTable;
use crate::{CollectJoin, ProdId, StateId, TokenId, VarId, EOI};

// ---------------------------------------------------------------------------------------------
// Tables

/// Kind of a parsing error, with the host-facing numeric values.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ErrorKind {
    /// the token isn't expected in the current state
    #[default]
    Syntax = 0,
    /// two non-associative operators of the same level follow each other
    NonAssociative = 1,
    /// the token ID isn't a terminal of the grammar
    UnknownToken = 2,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::NonAssociative => "non-associative operator",
            ErrorKind::UnknownToken => "unknown token",
        })
    }
}

/// Kind of an [Action], with the host-facing numeric values.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ActionKind {
    Error = 0,
    Shift = 1,
    Reduce = 2,
    Goto = 3,
    Accept = 4,
}

/// Entry of the parsing tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Shift(StateId),
    Reduce(ProdId),
    Goto(StateId),
    Accept,
    Error(ErrorKind),
}

impl Default for Action {
    fn default() -> Self {
        Action::Error(ErrorKind::Syntax)
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Shift(_) => ActionKind::Shift,
            Action::Reduce(_) => ActionKind::Reduce,
            Action::Goto(_) => ActionKind::Goto,
            Action::Accept => ActionKind::Accept,
            Action::Error(_) => ActionKind::Error,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Shift(s) => write!(f, "shift {s}"),
            Action::Reduce(p) => write!(f, "reduce {p}"),
            Action::Goto(s) => write!(f, "goto {s}"),
            Action::Accept => write!(f, "accept"),
            Action::Error(kind) => write!(f, "error ({kind})"),
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Errors

/// Rejection of an input by the parser.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind} on token {token} at position {}", .span.start)]
pub struct ParseError {
    pub kind: ErrorKind,
    /// parser state in which the error occurred
    pub state: StateId,
    pub token: TokenId,
    /// position of the token in the input
    pub span: Range<usize>,
    /// terminals that would have been accepted in this state
    pub expected: Vec<TokenId>,
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("unknown symbol '{0}'")]
pub struct UnknownSymbolError(pub String);

// ---------------------------------------------------------------------------------------------
// Listener

/// Receives the parsing events and builds the semantic values.
///
/// ```
/// use lexalr::grammar::GrammarBuilder;
/// use lexalr::lexer::Token;
/// use lexalr::parser::ParseListener;
/// use lexalr::{ProdId, VarId};
///
/// /// Counts the tokens below each node.
/// struct Counter;
///
/// impl ParseListener for Counter {
///     type Value = usize;
///
///     fn shift(&mut self, _token: &Token) -> usize {
///         1
///     }
///
///     fn reduce(&mut self, _prod: ProdId, _lhs: VarId, values: Vec<usize>) -> usize {
///         values.iter().sum()
///     }
/// }
///
/// let mut grammar = GrammarBuilder::new();
/// grammar.add_production("list", "list 'x' | %empty").unwrap();
/// let parser = grammar.build().unwrap();
/// let x = parser.token_id("'x'").unwrap();
/// let tokens = (0..3).map(|i| Token { id: x, user_data: 0, span: i..i + 1, state: 0, lexeme: b"x" });
/// assert_eq!(parser.parse_with(tokens, &mut Counter), Ok(3));
/// ```
pub trait ParseListener {
    type Value;

    /// Called when a token is shifted.
    fn shift(&mut self, token: &Token) -> Self::Value;

    /// Called when a production is reduced, with the values of its right-hand side symbols.
    fn reduce(&mut self, prod: ProdId, lhs: VarId, values: Vec<Self::Value>) -> Self::Value;

    /// Called when the input is accepted.
    fn accept(&mut self) {}
}

/// Listener that builds no value.
impl ParseListener for () {
    type Value = ();

    fn shift(&mut self, _token: &Token) -> Self::Value {}

    fn reduce(&mut self, _prod: ProdId, _lhs: VarId, _values: Vec<Self::Value>) -> Self::Value {}
}

// ---------------------------------------------------------------------------------------------
// Parser

/// Table-driven LALR(1) parser built by [GrammarBuilder](crate::grammar::GrammarBuilder).
///
/// The parser is immutable. Each parse creates its own stack, so the same parser can parse
/// several inputs at the same time.
#[derive(Clone, Debug)]
pub struct Parser {
    symbols: SymbolTable,
    prods: Vec<Production>,
    tables: ParseTables,
    log: BufLog,
}

impl Parser {
    pub fn new(symbols: SymbolTable, prods: Vec<Production>, tables: ParseTables, log: BufLog) -> Self {
        Parser { symbols, prods, tables, log }
    }

    pub fn get_symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn num_states(&self) -> usize {
        self.tables.num_states
    }

    pub fn num_productions(&self) -> usize {
        self.prods.len()
    }

    pub fn production(&self, prod: ProdId) -> Option<&Production> {
        self.prods.get(prod as usize)
    }

    /// Returns the ID of a terminal.
    pub fn token_id(&self, name: &str) -> Result<TokenId, UnknownSymbolError> {
        self.symbols.find_terminal(name).ok_or_else(|| UnknownSymbolError(name.to_string()))
    }

    /// Returns the ID of a nonterminal.
    pub fn var_id(&self, name: &str) -> Result<VarId, UnknownSymbolError> {
        self.symbols.find_nonterminal(name).ok_or_else(|| UnknownSymbolError(name.to_string()))
    }

    /// Returns the action in `state` when the next token is `token`.
    pub fn action(&self, state: StateId, token: TokenId) -> Action {
        self.tables.action(state, token)
    }

    /// Returns the state reached from `state` after the reduction of a production of `var`,
    /// or an error.
    pub fn goto(&self, state: StateId, var: VarId) -> Action {
        self.tables.goto(state, var)
    }

    /// Returns the terminals that have a valid action in `state`.
    pub fn expected(&self, state: StateId) -> Vec<TokenId> {
        (0..self.tables.num_t as TokenId)
            .filter(|&t| !matches!(self.action(state, t), Action::Error(_)))
            .collect()
    }

    /// Checks if the tokens of `input` form a sentence of the grammar.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(&self, lexer: &Lexer, input: &T) -> Result<(), ParseError> {
        self.parse_tokens(lexer.consume(input))
    }

    /// Checks if a sequence of tokens forms a sentence of the grammar. The end of the
    /// sequence is the end of the input.
    pub fn parse_tokens<'a, I: IntoIterator<Item = Token<'a>>>(&self, tokens: I) -> Result<(), ParseError> {
        self.parse_with(tokens, &mut ())
    }

    /// Parses a sequence of tokens and returns the value of the start symbol built by the
    /// listener.
    pub fn parse_with<'a, I, L>(&self, tokens: I, listener: &mut L) -> Result<L::Value, ParseError>
    where
        I: IntoIterator<Item = Token<'a>>,
        L: ParseListener + ?Sized,
    {
        let mut tokens = tokens.into_iter();
        let mut end = 0;
        let mut next_token = |end: &mut usize| {
            let token = tokens.next().unwrap_or(Token { id: EOI, user_data: 0, span: *end..*end, state: 0, lexeme: &[] });
            *end = token.span.end;
            token
        };
        let mut states: Vec<StateId> = vec![0];
        let mut values = Vec::<L::Value>::new();
        let mut token = next_token(&mut end);
        loop {
            let state = states.last().copied().unwrap_or_default();
            let action = self.action(state, token.id);
            log::trace!("state {state}, token {}: {action}", self.token_name(token.id));
            match action {
                Action::Shift(target) => {
                    values.push(listener.shift(&token));
                    states.push(target);
                    token = next_token(&mut end);
                }
                Action::Reduce(prod) => {
                    let Production { lhs, rhs, .. } = &self.prods[prod as usize];
                    let n = rhs.len();
                    states.truncate(states.len() - n);
                    let args = values.split_off(values.len() - n);
                    values.push(listener.reduce(prod, *lhs, args));
                    let top = states.last().copied().unwrap_or_default();
                    match self.goto(top, *lhs) {
                        Action::Goto(target) => states.push(target),
                        _ => return Err(self.error(ErrorKind::Syntax, top, &token)),
                    }
                }
                Action::Accept => {
                    listener.accept();
                    return values.pop().ok_or_else(|| self.error(ErrorKind::Syntax, state, &token));
                }
                Action::Goto(_) => return Err(self.error(ErrorKind::Syntax, state, &token)),
                Action::Error(kind) => return Err(self.error(kind, state, &token)),
            }
        }
    }

    fn error(&self, kind: ErrorKind, state: StateId, token: &Token) -> ParseError {
        log::debug!("{kind} in state {state} on token {}", self.token_name(token.id));
        ParseError { kind, state, token: token.id, span: token.span.clone(), expected: self.expected(state) }
    }

    fn token_name(&self, token: TokenId) -> String {
        self.symbols.get_t_name(token).map(|s| s.to_string()).unwrap_or_else(|| format!("#{token}"))
    }

    /// Returns the tables in a readable form, one state per line.
    pub fn tables_to_str(&self) -> String {
        (0..self.tables.num_states).map(|state| {
            let actions = (0..self.tables.num_t as TokenId)
                .filter_map(|t| match self.action(state, t) {
                    Action::Error(ErrorKind::Syntax) => None,
                    action => Some(format!("{}: {action}", self.token_name(t))),
                });
            let gotos = (0..self.symbols.get_num_nt() as VarId)
                .filter_map(|v| match self.goto(state, v) {
                    Action::Goto(target) => Some(format!("{}: goto {target}", Symbol::NT(v).to_str(Some(&self.symbols)))),
                    _ => None,
                });
            format!("{state:3}: {}", actions.chain(gotos).join(", "))
        }).join("\n")
    }
}

impl LogReader for Parser {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}
