// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};
use indexmap::{IndexMap, IndexSet};
use crate::grammar::Symbol;
use crate::{TokenId, VarId, EOI};

/// Name of the end-of-input terminal.
pub const EOI_NAME: &str = "$end";

/// Associativity of a terminal with a declared precedence.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Assoc {
    /// precedence level only (`set_precedence`)
    None,
    Left,
    Right,
    NonAssoc,
}

impl Display for Assoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            Assoc::None => "precedence",
            Assoc::Left => "left",
            Assoc::Right => "right",
            Assoc::NonAssoc => "nonassoc",
        })
    }
}

/// Precedence of a terminal or a production. Higher levels bind tighter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Prec {
    pub level: u16,
    pub assoc: Assoc,
}

/// Stores the names of the terminal and nonterminal symbols of a grammar.
///
/// Terminal 0 is always the end of input, so the terminal IDs are the token IDs
/// returned by the lexer. The nonterminal IDs follow the order in which they first appear
/// on the left-hand side of a production.
///
/// ```ignore
/// t[0] = ("$end", None)
/// t[1] = ("NUM", None)
/// t[2] = ("'+'", Some(Prec { level: 1, assoc: Assoc::Left }))
/// nt[0] = "expr"
/// ```
#[derive(Clone, Debug)]
pub struct SymbolTable {
    t: IndexMap<String, Option<Prec>>,  // terminal names and optional precedence
    nt: IndexSet<String>,               // nonterminal names
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            t: IndexMap::from([(EOI_NAME.to_string(), None)]),
            nt: IndexSet::new(),
        }
    }

    /// Adds a terminal if it doesn't exist yet, and returns its ID.
    pub fn add_terminal<T: Into<String>>(&mut self, name: T) -> TokenId {
        let (index, _) = self.t.insert_full(name.into(), None);
        index as TokenId
    }

    pub fn find_terminal(&self, name: &str) -> Option<TokenId> {
        self.t.get_index_of(name).map(|i| i as TokenId)
    }

    pub fn get_t_name(&self, token: TokenId) -> Option<&str> {
        usize::try_from(token).ok().and_then(|i| self.t.get_index(i)).map(|(name, _)| name.as_str())
    }

    pub fn get_num_t(&self) -> usize {
        self.t.len()
    }

    pub fn set_prec(&mut self, token: TokenId, prec: Prec) {
        if let Some((_, p)) = usize::try_from(token).ok().and_then(|i| self.t.get_index_mut(i)) {
            *p = Some(prec);
        }
    }

    pub fn get_prec(&self, token: TokenId) -> Option<Prec> {
        usize::try_from(token).ok().and_then(|i| self.t.get_index(i)).and_then(|(_, p)| *p)
    }

    /// Iterates over all the terminals except the end of input.
    pub fn terminals(&self) -> impl Iterator<Item = (TokenId, &str)> {
        self.t.keys().enumerate().skip(1).map(|(i, name)| (i as TokenId, name.as_str()))
    }

    /// Adds a nonterminal if it doesn't exist yet, and returns its ID.
    pub fn add_nonterminal<T: Into<String>>(&mut self, name: T) -> VarId {
        let (index, _) = self.nt.insert_full(name.into());
        index as VarId
    }

    pub fn find_nonterminal(&self, name: &str) -> Option<VarId> {
        self.nt.get_index_of(name).map(|i| i as VarId)
    }

    pub fn get_nt_name(&self, var: VarId) -> Option<&str> {
        self.nt.get_index(var as usize).map(|s| s.as_str())
    }

    pub fn get_num_nt(&self) -> usize {
        self.nt.len()
    }

    /// Returns the name of a symbol, or a placeholder if it isn't in the table.
    pub fn symbol_name(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::T(EOI) => EOI_NAME.to_string(),
            Symbol::T(t) => self.get_t_name(t).map(|s| s.to_string()).unwrap_or_else(|| format!("T({t})")),
            Symbol::NT(v) => self.get_nt_name(v).map(|s| s.to_string()).unwrap_or_else(|| format!("NT({v})")),
        }
    }
}
