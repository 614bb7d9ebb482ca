// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Lexer and parser generator.
//!
//! * [`lexergen::LexerGen`] compiles regular-expression rules, optionally split into lexer
//!   states (start conditions), into a [`lexer::Lexer`] DFA. A [`lexer::Cursor`] scans an input
//!   with longest-match semantics and yields [`lexer::Token`]s.
//! * [`grammar::GrammarBuilder`] collects tokens, precedence declarations and productions, and
//!   builds an LALR(1) [`parser::Parser`] whose conflicts are resolved by precedence and
//!   associativity.
//! * [`host`] wraps both builders in a runtime-checked open/sealed lifecycle for dynamic bindings.
//!
//! ```
//! use lexalr::lexergen::LexerGen;
//! use lexalr::grammar::GrammarBuilder;
//!
//! let mut grammar = GrammarBuilder::new();
//! grammar.declare_token("NUM").unwrap();
//! grammar.set_left("'+'").unwrap();
//! grammar.set_left("'*'").unwrap();
//! grammar.add_production("expr", "expr '+' expr | expr '*' expr | NUM").unwrap();
//! let parser = grammar.build().unwrap();
//!
//! let mut lexgen = LexerGen::new();
//! lexgen.push("[0-9]+", parser.token_id("NUM").unwrap()).unwrap();
//! lexgen.push("\\+", parser.token_id("'+'").unwrap()).unwrap();
//! lexgen.push("\\*", parser.token_id("'*'").unwrap()).unwrap();
//! lexgen.push("[ \\t]+", lexalr::SKIP).unwrap();
//! let lexer = lexgen.build().unwrap();
//!
//! assert!(parser.parse(&lexer, "1 + 2 * 3").is_ok());
//! assert!(parser.parse(&lexer, "1 + * 3").is_err());
//! ```

mod macros;
pub mod log;
pub mod byteset;
pub mod regexgen;
pub mod nfa;
pub mod dfa;
pub mod lexergen;
pub mod lexer;
pub mod symbol_table;
pub mod grammar;
pub mod parsergen;
pub mod parser;
pub mod host;

// package name & version
pub const LEXALR_PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const LEXALR_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// ID of a token, as returned by the lexer and expected by the parser.
///
/// * `0` is the end-of-input token ([`EOI`]),
/// * negative values are skipped by the lexer ([`SKIP`]),
/// * [`INVALID`] is returned for input bytes that no rule matches.
pub type TokenId = i32;
/// ID of a nonterminal
pub type VarId = u16;
/// ID of a grammar production, in declaration order
pub type ProdId = u32;
/// Handle of a lexer state (start condition). [`lexergen::INITIAL`] is always 0.
pub type LexStateId = u16;
/// Index of a DFA node or of an LALR state
pub type StateId = usize;

/// End of input
pub const EOI: TokenId = 0;
/// Default ID of the rules whose matches are dropped
pub const SKIP: TokenId = -1;
/// ID of the one-byte tokens that no lexer rule recognizes
pub const INVALID: TokenId = TokenId::MAX;

// ---------------------------------------------------------------------------------------------
// General helper traits and functions

pub trait CollectJoin {
    fn join(&mut self, separator: &str) -> String
        where Self: Iterator,
              <Self as Iterator>::Item: ToString
    {
        self.map(|x| x.to_string()).collect::<Vec<_>>().join(separator)
    }

    fn to_vec(self) -> Vec<<Self as Iterator>::Item>
        where Self: Iterator + Sized
    {
        self.collect::<Vec<_>>()
    }
}

impl<I: Iterator> CollectJoin for I {}

pub fn escape_byte(b: u8) -> String {
    match b {
        b'\n' => "\\n".to_string(),
        b'\r' => "\\r".to_string(),
        b'\t' => "\\t".to_string(),
        b'\\' => "\\\\".to_string(),
        b'"' => "\\\"".to_string(),
        0x20..=0x7e => (b as char).to_string(),
        _ => format!("\\x{b:02x}"),
    }
}

pub fn escape_bytes(s: &[u8]) -> String {
    s.iter().map(|&b| escape_byte(b)).collect::<String>()
}

/// Splits a list of names separated by spaces, tabs or newlines.
pub(crate) fn split_names(names: &str) -> impl Iterator<Item = &str> {
    names.split_ascii_whitespace()
}

#[cfg(test)]
mod libtests {
    use super::*;

    #[test]
    fn escapes() {
        let tests = vec![
            (b"abc".to_vec(), "abc"),
            (b"a\nb".to_vec(), "a\\nb"),
            (vec![b'"', 0, 0xff], "\\\"\\x00\\xff"),
        ];
        for (test_id, (input, expected)) in tests.into_iter().enumerate() {
            assert_eq!(escape_bytes(&input), expected, "test {test_id} failed");
        }
    }

    #[test]
    fn collect_join() {
        assert_eq!([1, 2, 3].iter().join(", "), "1, 2, 3");
        assert_eq!(split_names(" A  B\tC\n").to_vec(), vec!["A", "B", "C"]);
    }
}
