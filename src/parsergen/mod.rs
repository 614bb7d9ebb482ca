// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! LALR(1) table generation.
//!
//! The LR(0) automaton is built first, then the lookaheads of its kernel items are computed
//! by spontaneous generation and propagation: the closure of each kernel item is computed
//! with a dummy lookahead, which propagates wherever it appears in the closure.
//!
//! The production `$accept -> start` is added to the grammar; its completed item accepts
//! the input at the end.

pub(crate) mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use crate::grammar::{Grammar, Production, Symbol};
use crate::log::{BufLog, LogReader, Logger};
use crate::parser::{Action, ErrorKind};
use crate::symbol_table::Assoc;
use crate::{CollectJoin, ProdId, StateId, TokenId, VarId, EOI};

/// LR(0) item: a production with a dot in its right-hand side. The production index is
/// [`ParserGen::accept_prod`] for the augmented production.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LrItem {
    pub prod: usize,
    pub dot: usize,
}

impl LrItem {
    fn advance(&self) -> LrItem {
        LrItem { prod: self.prod, dot: self.dot + 1 }
    }
}

impl Display for LrItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.prod, self.dot)
    }
}

/// Action and goto tables of an LALR(1) parser.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseTables {
    pub num_states: usize,
    pub num_t: usize,
    pub num_nt: usize,
    /// `actions[state * num_t + token]`
    pub actions: Vec<Action>,
    /// `gotos[state * num_nt + var]`
    pub gotos: Vec<Option<StateId>>,
}

impl ParseTables {
    pub fn action(&self, state: StateId, token: TokenId) -> Action {
        match usize::try_from(token) {
            Ok(t) if state < self.num_states && t < self.num_t => self.actions[state * self.num_t + t],
            _ => Action::Error(ErrorKind::UnknownToken),
        }
    }

    pub fn goto(&self, state: StateId, var: VarId) -> Action {
        if state < self.num_states && (var as usize) < self.num_nt {
            if let Some(target) = self.gotos[state * self.num_nt + var as usize] {
                return Action::Goto(target);
            }
        }
        Action::Error(ErrorKind::Syntax)
    }
}

pub struct ParserGen<'g> {
    grammar: &'g Grammar,
    /// right-hand side of the augmented production
    accept_rhs: [Symbol; 1],
    /// kernel items of each state, sorted
    kernels: Vec<Vec<LrItem>>,
    transitions: Vec<BTreeMap<Symbol, StateId>>,
    /// lookaheads of each kernel item
    lookaheads: Vec<Vec<BTreeSet<TokenId>>>,
    log: BufLog,
}

impl<'g> ParserGen<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        ParserGen {
            grammar,
            accept_rhs: [Symbol::NT(grammar.get_start())],
            kernels: Vec::new(),
            transitions: Vec::new(),
            lookaheads: Vec::new(),
            log: BufLog::new(),
        }
    }

    /// Index of the augmented production `$accept -> start` in the items.
    pub fn accept_prod(&self) -> usize {
        self.grammar.productions().len()
    }

    pub fn num_states(&self) -> usize {
        self.kernels.len()
    }

    pub fn get_kernel(&self, state: StateId) -> &[LrItem] {
        &self.kernels[state]
    }

    pub fn get_lookaheads(&self, state: StateId) -> &[BTreeSet<TokenId>] {
        &self.lookaheads[state]
    }

    fn rhs(&self, prod: usize) -> &[Symbol] {
        match self.grammar.productions().get(prod) {
            Some(Production { rhs, .. }) => rhs,
            None => &self.accept_rhs,
        }
    }

    fn next_symbol(&self, item: &LrItem) -> Option<Symbol> {
        self.rhs(item.prod).get(item.dot).copied()
    }

    /// Builds the tables. The conflicts and their resolution are reported in the log.
    pub fn build(&mut self) -> ParseTables {
        self.build_lr0();
        self.build_lookaheads();
        self.build_tables()
    }

    fn closure0(&self, kernel: &[LrItem]) -> BTreeSet<LrItem> {
        let mut items = BTreeSet::new();
        let mut stack = kernel.to_vec();
        while let Some(item) = stack.pop() {
            if items.insert(item) {
                if let Some(Symbol::NT(var)) = self.next_symbol(&item) {
                    stack.extend(self.grammar.get_prods_of(var).iter().map(|&p| LrItem { prod: p as usize, dot: 0 }));
                }
            }
        }
        items
    }

    /// Closure of LR(1) items, with the lookaheads of each item gathered in a set.
    fn closure1(&self, kernel: Vec<(LrItem, BTreeSet<TokenId>)>) -> BTreeMap<LrItem, BTreeSet<TokenId>> {
        let mut items = BTreeMap::<LrItem, BTreeSet<TokenId>>::new();
        let mut stack = kernel;
        while let Some((item, lookaheads)) = stack.pop() {
            let is_new = !items.contains_key(&item);
            let entry = items.entry(item).or_default();
            let added = lookaheads.difference(entry).copied().collect::<BTreeSet<_>>();
            if added.is_empty() && !is_new {
                continue;
            }
            entry.extend(added.iter().copied());
            if let Some(Symbol::NT(var)) = self.next_symbol(&item) {
                let (mut first, nullable) = self.grammar.first_of_seq(&self.rhs(item.prod)[item.dot + 1..]);
                if nullable {
                    first.extend(added);
                }
                for &p in self.grammar.get_prods_of(var) {
                    stack.push((LrItem { prod: p as usize, dot: 0 }, first.clone()));
                }
            }
        }
        items
    }

    fn build_lr0(&mut self) {
        let start = vec![LrItem { prod: self.accept_prod(), dot: 0 }];
        let mut states = BTreeMap::<Vec<LrItem>, StateId>::new();
        states.insert(start.clone(), 0);
        self.kernels = vec![start];
        self.transitions = Vec::new();
        let mut current = 0;
        while current < self.kernels.len() {
            let mut gotos = BTreeMap::<Symbol, BTreeSet<LrItem>>::new();
            for item in self.closure0(&self.kernels[current]) {
                if let Some(symbol) = self.next_symbol(&item) {
                    gotos.entry(symbol).or_default().insert(item.advance());
                }
            }
            let mut transitions = BTreeMap::new();
            for (symbol, kernel) in gotos {
                let kernel = kernel.into_iter().to_vec();
                let target = match states.get(&kernel) {
                    Some(&target) => target,
                    None => {
                        let target = self.kernels.len();
                        states.insert(kernel.clone(), target);
                        self.kernels.push(kernel);
                        target
                    }
                };
                transitions.insert(symbol, target);
            }
            self.transitions.push(transitions);
            current += 1;
        }
        log::debug!("LR(0) automaton: {} states", self.kernels.len());
    }

    fn build_lookaheads(&mut self) {
        let dummy = self.grammar.get_num_t() as TokenId;
        let mut lookaheads = self.kernels.iter().map(|k| vec![BTreeSet::<TokenId>::new(); k.len()]).to_vec();
        let mut propagate = self.kernels.iter().map(|k| vec![Vec::<(StateId, usize)>::new(); k.len()]).to_vec();
        lookaheads[0][0].insert(EOI);
        for (state, kernel) in self.kernels.iter().enumerate() {
            for (k, &item) in kernel.iter().enumerate() {
                for (citem, las) in self.closure1(vec![(item, BTreeSet::from([dummy]))]) {
                    let Some(symbol) = self.next_symbol(&citem) else { continue };
                    let target = self.transitions[state][&symbol];
                    let Ok(index) = self.kernels[target].binary_search(&citem.advance()) else { continue };
                    for a in las {
                        if a == dummy {
                            propagate[state][k].push((target, index));
                        } else {
                            lookaheads[target][index].insert(a);
                        }
                    }
                }
            }
        }
        let mut change = true;
        while change {
            change = false;
            for state in 0..self.kernels.len() {
                for k in 0..self.kernels[state].len() {
                    let source = lookaheads[state][k].clone();
                    for &(target, index) in &propagate[state][k] {
                        let num_items = lookaheads[target][index].len();
                        lookaheads[target][index].extend(source.iter().copied());
                        change |= lookaheads[target][index].len() != num_items;
                    }
                }
            }
        }
        self.lookaheads = lookaheads;
    }

    fn prod_str(&self, prod: usize) -> String {
        match self.grammar.production(prod as ProdId) {
            Some(p) => p.to_str(Some(self.grammar.get_symbol_table())),
            None => "$accept".to_string(),
        }
    }

    fn t_str(&self, token: TokenId) -> String {
        Symbol::T(token).to_str(Some(self.grammar.get_symbol_table()))
    }

    fn build_tables(&mut self) -> ParseTables {
        let num_states = self.kernels.len();
        let num_t = self.grammar.get_num_t();
        let num_nt = self.grammar.get_num_nt();
        let mut actions = vec![Action::Error(ErrorKind::Syntax); num_states * num_t];
        let mut gotos = vec![None; num_states * num_nt];
        let mut num_sr = 0;
        let mut num_rr = 0;
        for state in 0..num_states {
            for (symbol, &target) in &self.transitions[state] {
                match symbol {
                    Symbol::T(t) => actions[state * num_t + *t as usize] = Action::Shift(target),
                    Symbol::NT(v) => gotos[state * num_nt + *v as usize] = Some(target),
                }
            }
            let kernel = self.kernels[state].iter().copied().zip(self.lookaheads[state].iter().cloned()).to_vec();
            let mut reduces = BTreeMap::<TokenId, Vec<usize>>::new();
            for (item, las) in self.closure1(kernel) {
                if item.dot < self.rhs(item.prod).len() {
                    continue;
                }
                if item.prod == self.accept_prod() {
                    actions[state * num_t + EOI as usize] = Action::Accept;
                } else {
                    for a in las {
                        reduces.entry(a).or_default().push(item.prod);
                    }
                }
            }
            for (t, mut prods) in reduces {
                prods.sort();
                let prod = prods[0];
                if prods.len() > 1 {
                    num_rr += 1;
                    let msg = format!("state {state}: reduce/reduce conflict on {}, reducing {} instead of {}",
                                      self.t_str(t), self.prod_str(prod), prods[1..].iter().map(|&p| self.prod_str(p)).join(", "));
                    self.log.add_warning(msg);
                }
                let index = state * num_t + t as usize;
                actions[index] = match actions[index] {
                    Action::Shift(target) => {
                        let (action, by_prec) = self.resolve_shift_reduce(state, t, target, prod);
                        if !by_prec {
                            num_sr += 1;
                        }
                        action
                    }
                    Action::Accept => {
                        let msg = format!("state {state}: accept/reduce conflict on {}, accepting instead of reducing {}",
                                          self.t_str(t), self.prod_str(prod));
                        self.log.add_warning(msg);
                        Action::Accept
                    }
                    _ => Action::Reduce(prod as ProdId),
                };
            }
        }
        // only the conflicts that precedence didn't resolve are counted
        self.log.add_note(format!("LALR(1) tables: {num_states} states, {num_sr} shift/reduce conflicts, {num_rr} reduce/reduce conflicts"));
        ParseTables { num_states, num_t, num_nt, actions, gotos }
    }

    /// Resolves a shift/reduce conflict with the precedence of the production and of the
    /// lookahead token, and tells if the precedence decided. Without precedence, or when the
    /// token has no associativity, the shift is chosen and a warning is emitted.
    fn resolve_shift_reduce(&mut self, state: StateId, token: TokenId, target: StateId, prod: usize) -> (Action, bool) {
        let prod_prec = self.grammar.production(prod as ProdId).and_then(|p| p.prec);
        let token_prec = self.grammar.get_symbol_table().get_prec(token);
        let (action, by_prec) = match (prod_prec, token_prec) {
            (Some(p), Some(t)) if p.level > t.level => (Action::Reduce(prod as ProdId), true),
            (Some(p), Some(t)) if p.level < t.level => (Action::Shift(target), true),
            (Some(_), Some(t)) => match t.assoc {
                Assoc::Left => (Action::Reduce(prod as ProdId), true),
                Assoc::Right => (Action::Shift(target), true),
                Assoc::NonAssoc => (Action::Error(ErrorKind::NonAssociative), true),
                Assoc::None => (Action::Shift(target), false),
            },
            _ => (Action::Shift(target), false),
        };
        let msg = format!("state {state}: shift/reduce conflict on {} with {}, resolved as {action}{}",
                          self.t_str(token), self.prod_str(prod), if by_prec { " by precedence" } else { "" });
        if by_prec {
            self.log.add_note(msg);
        } else {
            self.log.add_warning(msg);
        }
        (action, by_prec)
    }
}

impl LogReader for ParserGen<'_> {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}
