// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Open/sealed wrappers for dynamic bindings.
//!
//! [HostLexer] and [HostParser] hold either a builder that is still open, or the artifact it
//! built. Mutations are only allowed while open and scanning/parsing only once sealed; the
//! violations are reported as [HostError::Sealed] and [HostError::NotSealed].
//!
//! ```
//! use lexalr::host::{HostLexer, HostParser, Verdict};
//!
//! let mut parser = HostParser::new();
//! parser.declare_token("NUM").unwrap();
//! parser.set_left("'+'").unwrap();
//! parser.add_production("expr", "expr '+' expr | NUM").unwrap();
//! parser.build().unwrap();
//!
//! let mut lexer = HostLexer::new();
//! lexer.push("[0-9]+", parser.token_id("NUM").unwrap(), 0).unwrap();
//! lexer.push("\\+", parser.token_id("'+'").unwrap(), 0).unwrap();
//! lexer.set_flags(HostLexer::FLAG_SKIP_WS).unwrap();
//! lexer.build().unwrap();
//!
//! assert_eq!(parser.parse("1 + 2", &lexer).unwrap(), Verdict::Accepted);
//! assert!(matches!(parser.parse("1 +", &lexer).unwrap(), Verdict::Rejected(_)));
//! ```

use thiserror::Error;
use crate::grammar::{GrammarBuilder, GrammarError};
use crate::lexer::{Cursor, Lexer};
use crate::lexergen::{Dest, LexFlags, LexRule, LexerGen, LexerGenError, RuleId, RuleScope};
use crate::parser::{ParseError, Parser, UnknownSymbolError};
use crate::{LexStateId, ProdId, TokenId, EOI, SKIP};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum HostError {
    #[error("the state machine is sealed")]
    Sealed,
    #[error("the state machine is not built")]
    NotSealed,
    #[error(transparent)]
    LexerGen(#[from] LexerGenError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    UnknownSymbol(#[from] UnknownSymbolError),
}

/// Result of a parse.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(ParseError),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Clone, Debug)]
enum Stage<B, A> {
    Open(B),
    Sealed(A),
}

impl<B, A> Stage<B, A> {
    fn open(&mut self) -> Result<&mut B, HostError> {
        match self {
            Stage::Open(builder) => Ok(builder),
            Stage::Sealed(_) => Err(HostError::Sealed),
        }
    }

    fn sealed(&self) -> Result<&A, HostError> {
        match self {
            Stage::Open(_) => Err(HostError::NotSealed),
            Stage::Sealed(artifact) => Ok(artifact),
        }
    }

    fn is_sealed(&self) -> bool {
        matches!(self, Stage::Sealed(_))
    }
}

// ---------------------------------------------------------------------------------------------
// Lexer

/// Lexer generator that becomes a lexer once built.
///
/// The source states of the rules are given as `"*"` for all the states or as a comma-separated
/// list of names. The destination states are `"."` to stay in the same state, `">NAME"` to push
/// the current state and go to NAME, `"<"` to pop the state, or a state name.
#[derive(Clone, Debug)]
pub struct HostLexer {
    stage: Stage<LexerGen, Lexer>,
}

impl Default for HostLexer {
    fn default() -> Self {
        HostLexer::new()
    }
}

impl HostLexer {
    pub const FLAG_ICASE: u32 = LexFlags::ICASE.bits();
    pub const FLAG_DOT_NOT_LF: u32 = LexFlags::DOT_NOT_LF.bits();
    pub const FLAG_DOT_NOT_CRLF: u32 = LexFlags::DOT_NOT_CRLF.bits();
    pub const FLAG_SKIP_WS: u32 = LexFlags::SKIP_WS.bits();
    pub const FLAG_MATCH_ZERO_LEN: u32 = LexFlags::MATCH_ZERO_LEN.bits();

    pub fn new() -> Self {
        HostLexer { stage: Stage::Open(LexerGen::new()) }
    }

    pub fn is_sealed(&self) -> bool {
        self.stage.is_sealed()
    }

    /// Token ID of the end of input.
    pub fn eoi() -> TokenId {
        EOI
    }

    /// Token ID of the rules whose matches are dropped.
    pub fn skip() -> TokenId {
        SKIP
    }

    fn push_rule(&mut self, rule: LexRule) -> Result<RuleId, HostError> {
        Ok(self.stage.open()?.push_rule(rule)?)
    }

    /// Adds a rule in `INITIAL`.
    pub fn push(&mut self, regex: &str, id: TokenId, user_data: usize) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::new(regex, id).user_data(user_data))
    }

    /// Adds a range rule in `INITIAL`, which matches from `start` to the first `end`.
    pub fn push_range(&mut self, start: &str, end: &str, id: TokenId, user_data: usize) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::range(start, end, id).user_data(user_data))
    }

    /// Adds a rule that only changes the lexer state: its matches are dropped.
    pub fn push_skip_in(&mut self, states: &str, regex: &str, new_state: &str) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::skip(regex).scope(RuleScope::parse(states)).dest(Dest::parse(new_state)))
    }

    /// Adds a range rule that only changes the lexer state: its matches are dropped.
    pub fn push_range_skip_in(&mut self, states: &str, start: &str, end: &str, new_state: &str) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::range(start, end, SKIP).scope(RuleScope::parse(states)).dest(Dest::parse(new_state)))
    }

    pub fn push_in(&mut self, states: &str, regex: &str, id: TokenId, new_state: &str, user_data: usize) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::new(regex, id)
            .user_data(user_data)
            .scope(RuleScope::parse(states))
            .dest(Dest::parse(new_state)))
    }

    pub fn push_range_in(
        &mut self, states: &str, start: &str, end: &str, id: TokenId, new_state: &str, user_data: usize,
    ) -> Result<RuleId, HostError> {
        self.push_rule(LexRule::range(start, end, id)
            .user_data(user_data)
            .scope(RuleScope::parse(states))
            .dest(Dest::parse(new_state)))
    }

    /// Declares a lexer state and returns its handle.
    pub fn push_state(&mut self, name: &str) -> Result<LexStateId, HostError> {
        Ok(self.stage.open()?.push_state(name)?)
    }

    pub fn state_id(&self, name: &str) -> Option<LexStateId> {
        match &self.stage {
            Stage::Open(lexgen) => lexgen.state_id(name),
            Stage::Sealed(lexer) => lexer.state_id(name),
        }
    }

    /// Sets the flags; the unknown bits are ignored.
    pub fn set_flags(&mut self, flags: u32) -> Result<(), HostError> {
        self.stage.open()?.set_flags(LexFlags::from_bits_truncate(flags));
        Ok(())
    }

    pub fn flags(&self) -> u32 {
        match &self.stage {
            Stage::Open(lexgen) => lexgen.flags().bits(),
            Stage::Sealed(lexer) => lexer.flags().bits(),
        }
    }

    /// Builds the lexer. If the build fails, the generator stays open and unchanged.
    pub fn build(&mut self) -> Result<(), HostError> {
        let lexer = match &self.stage {
            Stage::Open(lexgen) => lexgen.build()?,
            Stage::Sealed(_) => return Err(HostError::Sealed),
        };
        self.stage = Stage::Sealed(lexer);
        Ok(())
    }

    pub fn lexer(&self) -> Result<&Lexer, HostError> {
        self.stage.sealed()
    }

    /// Starts scanning `input` in `INITIAL`.
    pub fn consume<'l, 'a, T: AsRef<[u8]> + ?Sized>(&'l self, input: &'a T) -> Result<Cursor<'l, 'a>, HostError> {
        Ok(self.stage.sealed()?.consume(input))
    }
}

// ---------------------------------------------------------------------------------------------
// Parser

/// Grammar builder that becomes a parser once built.
#[derive(Clone, Debug)]
pub struct HostParser {
    stage: Stage<GrammarBuilder, Parser>,
}

impl Default for HostParser {
    fn default() -> Self {
        HostParser::new()
    }
}

impl HostParser {
    pub fn new() -> Self {
        HostParser { stage: Stage::Open(GrammarBuilder::new()) }
    }

    pub fn is_sealed(&self) -> bool {
        self.stage.is_sealed()
    }

    pub fn declare_token(&mut self, names: &str) -> Result<(), HostError> {
        Ok(self.stage.open()?.declare_token(names)?)
    }

    pub fn set_left(&mut self, names: &str) -> Result<(), HostError> {
        Ok(self.stage.open()?.set_left(names)?)
    }

    pub fn set_right(&mut self, names: &str) -> Result<(), HostError> {
        Ok(self.stage.open()?.set_right(names)?)
    }

    pub fn set_nonassoc(&mut self, names: &str) -> Result<(), HostError> {
        Ok(self.stage.open()?.set_nonassoc(names)?)
    }

    pub fn set_precedence(&mut self, names: &str) -> Result<(), HostError> {
        Ok(self.stage.open()?.set_precedence(names)?)
    }

    /// Adds the productions of `lhs` and returns the index of the first one.
    pub fn add_production(&mut self, lhs: &str, rhs: &str) -> Result<ProdId, HostError> {
        Ok(self.stage.open()?.add_production(lhs, rhs)?)
    }

    /// Builds the parser. If the build fails, the grammar stays open and unchanged.
    pub fn build(&mut self) -> Result<(), HostError> {
        let parser = match &self.stage {
            Stage::Open(builder) => builder.build()?,
            Stage::Sealed(_) => return Err(HostError::Sealed),
        };
        self.stage = Stage::Sealed(parser);
        Ok(())
    }

    pub fn parser(&self) -> Result<&Parser, HostError> {
        self.stage.sealed()
    }

    /// Returns the ID of a token, which is known before the build if it has been declared.
    pub fn token_id(&self, name: &str) -> Result<TokenId, HostError> {
        match &self.stage {
            Stage::Open(builder) => builder.token_id(name).ok_or_else(|| UnknownSymbolError(name.to_string()).into()),
            Stage::Sealed(parser) => Ok(parser.token_id(name)?),
        }
    }

    /// Parses `input` with the tokens of `lexer`. Both must be built.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(&self, input: &T, lexer: &HostLexer) -> Result<Verdict, HostError> {
        let parser = self.stage.sealed()?;
        let lexer = lexer.lexer()?;
        Ok(match parser.parse(lexer, input) {
            Ok(()) => Verdict::Accepted,
            Err(e) => Verdict::Rejected(e),
        })
    }
}
