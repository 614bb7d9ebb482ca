// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Grammar definition.
//!
//! [GrammarBuilder] collects the tokens, their precedence and associativity, and the
//! productions. [build()](GrammarBuilder::build) resolves the names into a [Grammar],
//! checks its structure, then generates the LALR(1) [Parser].
//!
//! The right-hand side of a production is a list of symbol names separated by spaces:
//!
//! * identifiers are tokens if they're declared as such, nonterminals otherwise,
//! * quoted literals like `'+'` are tokens, declared implicitly,
//! * `|` separates alternatives,
//! * `%empty` (or nothing) is the empty alternative,
//! * `%prec NAME` gives the alternative the precedence of the token `NAME`.

pub(crate) mod tests;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use indexmap::IndexMap;
use thiserror::Error;
use crate::log::{BufLog, LogReader, Logger};
use crate::parser::Parser;
use crate::parsergen::ParserGen;
use crate::symbol_table::{Assoc, Prec, SymbolTable};
use crate::{split_names, CollectJoin, ProdId, TokenId, VarId};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Symbol {
    T(TokenId),     // terminal
    NT(VarId),      // nonterminal
}

impl Symbol {
    pub fn is_t(&self) -> bool {
        matches!(self, Symbol::T(_))
    }

    pub fn is_nt(&self) -> bool {
        matches!(self, Symbol::NT(_))
    }

    pub fn to_str(&self, symbol_table: Option<&SymbolTable>) -> String {
        match symbol_table {
            Some(table) => table.symbol_name(*self),
            None => self.to_string(),
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::T(t) => write!(f, ":{t}"),
            Symbol::NT(v) => write!(f, "{v}"),
        }
    }
}

/// Production `lhs -> rhs`, with the precedence used to resolve shift/reduce conflicts.
#[derive(Clone, PartialEq, Debug)]
pub struct Production {
    pub lhs: VarId,
    pub rhs: Vec<Symbol>,
    pub prec: Option<Prec>,
}

impl Production {
    pub fn to_str(&self, symbol_table: Option<&SymbolTable>) -> String {
        let rhs = if self.rhs.is_empty() {
            "%empty".to_string()
        } else {
            self.rhs.iter().map(|s| s.to_str(symbol_table)).join(" ")
        };
        format!("{} -> {rhs}", Symbol::NT(self.lhs).to_str(symbol_table))
    }
}

// ---------------------------------------------------------------------------------------------
// Errors

#[derive(Clone, Debug, PartialEq, Error)]
pub enum GrammarError {
    #[error("invalid symbol name '{0}'")]
    InvalidName(String),
    #[error("precedence of token '{0}' is already defined")]
    PrecedenceRedeclared(String),
    #[error("syntax error in the production of '{lhs}': {msg}")]
    RhsSyntax { lhs: String, msg: String },
    #[error("no production")]
    NoProductions,
    #[error("token '{0}' is used as the left-hand side of a production")]
    TokenAsLhs(String),
    #[error("undeclared symbol '{name}' in production {prod}")]
    UndeclaredSymbol { name: String, prod: ProdId },
    #[error("%prec refers to the unknown token '{name}' in production {prod}")]
    UnknownPrecToken { name: String, prod: ProdId },
    #[error("nonterminal '{0}' is unreachable from the start symbol")]
    UnreachableNonterminal(String),
    #[error("start symbol '{0}' doesn't derive any finite string of tokens")]
    UnproductiveStart(String),
}

// ---------------------------------------------------------------------------------------------
// Builder

fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

fn is_literal(name: &str) -> bool {
    name.len() >= 3 && name.starts_with('\'') && name.ends_with('\'')
}

fn check_token_name(name: &str) -> Result<(), GrammarError> {
    if is_identifier(name) || is_literal(name) {
        Ok(())
    } else {
        Err(GrammarError::InvalidName(name.to_string()))
    }
}

#[derive(Clone, Debug)]
struct RawProduction {
    lhs: String,
    rhs: Vec<String>,
    prec: Option<String>,
}

/// Collects the elements of a grammar. The first production's left-hand side is the start
/// symbol.
///
/// ```
/// use lexalr::grammar::GrammarBuilder;
///
/// let mut grammar = GrammarBuilder::new();
/// grammar.declare_token("NUM").unwrap();
/// grammar.set_left("'+' '-'").unwrap();
/// grammar.set_right("'^'").unwrap();
/// grammar.set_precedence("NEG").unwrap();
/// grammar.add_production("expr", "expr '+' expr | expr '-' expr | expr '^' expr").unwrap();
/// grammar.add_production("expr", "'-' expr %prec NEG | NUM").unwrap();
/// let parser = grammar.build().unwrap();
/// assert_eq!(parser.token_id("NUM"), Ok(1));
/// ```
#[derive(Clone, Debug, Default)]
pub struct GrammarBuilder {
    /// tokens in declaration order, the token ID being the index + 1
    tokens: IndexMap<String, Option<Prec>>,
    num_levels: u16,
    prods: Vec<RawProduction>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder::default()
    }

    pub fn num_productions(&self) -> usize {
        self.prods.len()
    }

    /// Returns the ID of a declared token.
    pub fn token_id(&self, name: &str) -> Option<TokenId> {
        self.tokens.get_index_of(name).map(|i| i as TokenId + 1)
    }

    /// Declares the tokens of a space-separated list of names.
    pub fn declare_token(&mut self, names: &str) -> Result<(), GrammarError> {
        let names = split_names(names).to_vec();
        for name in &names {
            check_token_name(name)?;
        }
        for name in names {
            self.tokens.entry(name.to_string()).or_insert(None);
        }
        Ok(())
    }

    /// Declares left-associative tokens, with a new precedence level that is higher than all
    /// the previous ones.
    pub fn set_left(&mut self, names: &str) -> Result<(), GrammarError> {
        self.set_prec(names, Assoc::Left)
    }

    /// Declares right-associative tokens, with a new precedence level.
    pub fn set_right(&mut self, names: &str) -> Result<(), GrammarError> {
        self.set_prec(names, Assoc::Right)
    }

    /// Declares non-associative tokens, with a new precedence level. Two of these tokens in a
    /// row, like `a < b < c`, is an error.
    pub fn set_nonassoc(&mut self, names: &str) -> Result<(), GrammarError> {
        self.set_prec(names, Assoc::NonAssoc)
    }

    /// Declares tokens with a new precedence level and no associativity.
    pub fn set_precedence(&mut self, names: &str) -> Result<(), GrammarError> {
        self.set_prec(names, Assoc::None)
    }

    fn set_prec(&mut self, names: &str, assoc: Assoc) -> Result<(), GrammarError> {
        let names = split_names(names).to_vec();
        for name in &names {
            check_token_name(name)?;
            if matches!(self.tokens.get(*name), Some(Some(_))) {
                return Err(GrammarError::PrecedenceRedeclared(name.to_string()));
            }
        }
        if names.is_empty() {
            return Ok(());
        }
        self.num_levels += 1;
        let prec = Prec { level: self.num_levels, assoc };
        for name in names {
            self.tokens.insert(name.to_string(), Some(prec));
        }
        Ok(())
    }

    /// Adds the productions `lhs -> rhs` and returns the index of the first one.
    ///
    /// ```
    /// # use lexalr::grammar::GrammarBuilder;
    /// let mut grammar = GrammarBuilder::new();
    /// assert_eq!(grammar.add_production("list", "list ',' item | item"), Ok(0));
    /// assert_eq!(grammar.add_production("item", "ID | %empty"), Ok(2));
    /// ```
    pub fn add_production(&mut self, lhs: &str, rhs: &str) -> Result<ProdId, GrammarError> {
        if !is_identifier(lhs) {
            return Err(GrammarError::InvalidName(lhs.to_string()));
        }
        let syntax = |msg: &str| GrammarError::RhsSyntax { lhs: lhs.to_string(), msg: msg.to_string() };
        let mut alternatives = Vec::new();
        let mut current = RawProduction { lhs: lhs.to_string(), rhs: Vec::new(), prec: None };
        let mut empty = false;
        let mut names = split_names(rhs);
        while let Some(name) = names.next() {
            match name {
                "|" => {
                    alternatives.push(std::mem::replace(&mut current, RawProduction { lhs: lhs.to_string(), rhs: Vec::new(), prec: None }));
                    empty = false;
                }
                "%empty" => {
                    if !current.rhs.is_empty() {
                        return Err(syntax("%empty in a non-empty alternative"));
                    }
                    empty = true;
                }
                "%prec" => {
                    let Some(prec) = names.next() else {
                        return Err(syntax("missing token after %prec"));
                    };
                    if current.prec.is_some() {
                        return Err(syntax("several %prec in one alternative"));
                    }
                    check_token_name(prec)?;
                    current.prec = Some(prec.to_string());
                }
                _ if name.starts_with('%') => return Err(syntax(&format!("unknown directive {name}"))),
                _ => {
                    if empty {
                        return Err(syntax("%empty in a non-empty alternative"));
                    }
                    check_token_name(name)?;
                    current.rhs.push(name.to_string());
                }
            }
        }
        alternatives.push(current);
        for name in alternatives.iter().flat_map(|p| p.rhs.iter().chain(&p.prec)) {
            if is_literal(name) {
                self.tokens.entry(name.clone()).or_insert(None);
            }
        }
        let first = self.prods.len() as ProdId;
        self.prods.extend(alternatives);
        Ok(first)
    }

    /// Resolves the names and checks the structure of the grammar.
    pub fn to_grammar(&self) -> Result<Grammar, GrammarError> {
        if self.prods.is_empty() {
            return Err(GrammarError::NoProductions);
        }
        let mut log = BufLog::new();
        let mut symbols = SymbolTable::new();
        for (name, prec) in &self.tokens {
            let t = symbols.add_terminal(name.as_str());
            if let Some(prec) = prec {
                symbols.set_prec(t, *prec);
            }
        }
        for raw in &self.prods {
            if self.tokens.contains_key(&raw.lhs) {
                return Err(GrammarError::TokenAsLhs(raw.lhs.clone()));
            }
            symbols.add_nonterminal(raw.lhs.as_str());
        }
        let mut prods = Vec::new();
        for (id, raw) in self.prods.iter().enumerate() {
            let prod = id as ProdId;
            let mut rhs = Vec::new();
            for name in &raw.rhs {
                let symbol = match (symbols.find_terminal(name), symbols.find_nonterminal(name)) {
                    (Some(t), _) => Symbol::T(t),
                    (None, Some(v)) => Symbol::NT(v),
                    (None, None) => return Err(GrammarError::UndeclaredSymbol { name: name.clone(), prod }),
                };
                rhs.push(symbol);
            }
            let prec = match &raw.prec {
                Some(name) => {
                    let t = symbols.find_terminal(name)
                        .ok_or_else(|| GrammarError::UnknownPrecToken { name: name.clone(), prod })?;
                    let prec = symbols.get_prec(t);
                    if prec.is_none() {
                        log.add_warning(format!("%prec {name} in production {prod}: the token has no precedence"));
                    }
                    prec
                }
                None => rhs.iter().rev()
                    .find_map(|s| if let Symbol::T(t) = s { symbols.get_prec(*t) } else { None }),
            };
            let lhs = symbols.find_nonterminal(&raw.lhs).unwrap_or_default();
            prods.push(Production { lhs, rhs, prec });
        }
        Grammar::new(symbols, prods, log)
    }

    /// Builds the LALR(1) parser. The builder isn't modified, so it can be completed and
    /// built again if an error occurs.
    pub fn build(&self) -> Result<Parser, GrammarError> {
        let grammar = self.to_grammar()?;
        let mut parsergen = ParserGen::new(&grammar);
        let tables = parsergen.build();
        let parsergen_log = parsergen.give_log();
        let Grammar { symbols, prods, mut log, .. } = grammar;
        log.extend(parsergen_log);
        Ok(Parser::new(symbols, prods, tables, log))
    }
}

// ---------------------------------------------------------------------------------------------
// Resolved grammar

/// Grammar whose symbols are resolved, with the FIRST sets of the nonterminals.
#[derive(Clone, Debug)]
pub struct Grammar {
    symbols: SymbolTable,
    prods: Vec<Production>,
    /// productions of each nonterminal
    prods_by_lhs: Vec<Vec<ProdId>>,
    nullable: Vec<bool>,
    first: Vec<BTreeSet<TokenId>>,
    log: BufLog,
}

impl Grammar {
    /// Creates a grammar from resolved productions. The start symbol is the left-hand side
    /// of the first production.
    pub fn new(symbols: SymbolTable, prods: Vec<Production>, log: BufLog) -> Result<Self, GrammarError> {
        if prods.is_empty() {
            return Err(GrammarError::NoProductions);
        }
        let num_nt = symbols.get_num_nt();
        let mut prods_by_lhs = vec![Vec::new(); num_nt];
        for (id, prod) in prods.iter().enumerate() {
            prods_by_lhs[prod.lhs as usize].push(id as ProdId);
        }
        let mut grammar = Grammar { symbols, prods, prods_by_lhs, nullable: vec![false; num_nt], first: vec![BTreeSet::new(); num_nt], log };
        grammar.check_symbols()?;
        grammar.calc_first();
        Ok(grammar)
    }

    pub fn get_symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn get_start(&self) -> VarId {
        self.prods[0].lhs
    }

    pub fn get_num_t(&self) -> usize {
        self.symbols.get_num_t()
    }

    pub fn get_num_nt(&self) -> usize {
        self.symbols.get_num_nt()
    }

    pub fn productions(&self) -> &[Production] {
        &self.prods
    }

    pub fn production(&self, prod: ProdId) -> Option<&Production> {
        self.prods.get(prod as usize)
    }

    pub fn get_prods_of(&self, var: VarId) -> &[ProdId] {
        &self.prods_by_lhs[var as usize]
    }

    pub fn is_nullable(&self, var: VarId) -> bool {
        self.nullable[var as usize]
    }

    pub fn get_first(&self, var: VarId) -> &BTreeSet<TokenId> {
        &self.first[var as usize]
    }

    /// Returns the FIRST set of a sequence of symbols, and whether the sequence derives the
    /// empty string.
    pub fn first_of_seq(&self, seq: &[Symbol]) -> (BTreeSet<TokenId>, bool) {
        seq_first(seq, &self.nullable, &self.first)
    }

    /// Checks that all the nonterminals are reachable from the start symbol and that the start
    /// symbol is productive. The unproductive nonterminals and the unused tokens are reported
    /// in the log.
    fn check_symbols(&mut self) -> Result<(), GrammarError> {
        let num_nt = self.get_num_nt();
        let mut reachable = vec![false; num_nt];
        let mut used_t = BTreeSet::new();
        let mut stack = vec![self.get_start()];
        while let Some(var) = stack.pop() {
            if !reachable[var as usize] {
                reachable[var as usize] = true;
                for &p in &self.prods_by_lhs[var as usize] {
                    for symbol in &self.prods[p as usize].rhs {
                        match symbol {
                            Symbol::T(t) => { used_t.insert(*t); }
                            Symbol::NT(v) => stack.push(*v),
                        }
                    }
                }
            }
        }
        if let Some(var) = reachable.iter().position(|r| !r) {
            return Err(GrammarError::UnreachableNonterminal(self.symbols.symbol_name(Symbol::NT(var as VarId))));
        }

        let mut productive = vec![false; num_nt];
        let mut change = true;
        while change {
            change = false;
            for prod in &self.prods {
                if !productive[prod.lhs as usize] && prod.rhs.iter().all(|s| match s {
                    Symbol::T(_) => true,
                    Symbol::NT(v) => productive[*v as usize],
                }) {
                    productive[prod.lhs as usize] = true;
                    change = true;
                }
            }
        }
        let start = self.get_start();
        if !productive[start as usize] {
            return Err(GrammarError::UnproductiveStart(self.symbols.symbol_name(Symbol::NT(start))));
        }
        let unproductive = (0..num_nt).filter(|&v| !productive[v])
            .map(|v| self.symbols.symbol_name(Symbol::NT(v as VarId)))
            .to_vec();
        if !unproductive.is_empty() {
            self.log.add_warning(format!("unproductive nonterminals: {}", unproductive.join(", ")));
        }
        let unused_t = self.symbols.terminals()
            .filter_map(|(t, name)| if used_t.contains(&t) { None } else { Some(name.to_string()) })
            .to_vec();
        if !unused_t.is_empty() {
            self.log.add_warning(format!("unused tokens: {}", unused_t.join(", ")));
        }
        Ok(())
    }

    fn calc_first(&mut self) {
        let mut change = true;
        while change {
            change = false;
            for prod in &self.prods {
                let (first, nullable) = seq_first(&prod.rhs, &self.nullable, &self.first);
                let var = prod.lhs as usize;
                if nullable && !self.nullable[var] {
                    self.nullable[var] = true;
                    change = true;
                }
                let num_items = self.first[var].len();
                self.first[var].extend(first);
                change |= self.first[var].len() != num_items;
            }
        }
        log::trace!("FIRST: {}", (0..self.get_num_nt())
            .map(|v| format!("{} = {{{}}}{}", self.symbols.symbol_name(Symbol::NT(v as VarId)),
                             self.first[v].iter().map(|t| self.symbols.symbol_name(Symbol::T(*t))).join(" "),
                             if self.nullable[v] { " nullable" } else { "" }))
            .join(", "));
    }
}

fn seq_first(seq: &[Symbol], nullable: &[bool], first: &[BTreeSet<TokenId>]) -> (BTreeSet<TokenId>, bool) {
    let mut result = BTreeSet::new();
    for symbol in seq {
        match symbol {
            Symbol::T(t) => {
                result.insert(*t);
                return (result, false);
            }
            Symbol::NT(v) => {
                result.extend(first[*v as usize].iter().copied());
                if !nullable[*v as usize] {
                    return (result, false);
                }
            }
        }
    }
    (result, true)
}

impl LogReader for Grammar {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}
