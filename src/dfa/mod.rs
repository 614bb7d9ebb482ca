// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Subset construction of the DFA from the NFA of all the lexer rules.


use std::collections::{BTreeMap, BTreeSet};
use crate::byteset::{ByteGroups, GroupId};
use crate::lexergen::RuleId;
use crate::nfa::{Nfa, NfaStateId};
use crate::{CollectJoin, StateId};

/// Deterministic automaton with several entry points, one for each start state given to
/// [DfaBuilder::build].
///
/// The transitions are indexed by byte group: `state_table[state * nbr_groups + group]`. A
/// destination equal to `nbr_states` is the dead state (no possible match).
#[derive(Clone, Debug, PartialEq)]
pub struct Dfa {
    pub nbr_groups: usize,
    pub nbr_states: StateId,
    pub initial_states: Vec<StateId>,
    pub state_table: Vec<StateId>,
    /// rule accepted in each state
    pub accept_table: Vec<Option<RuleId>>,
    /// rule accepted in each state when the match ends a line, if it has a higher priority
    /// than `accept_table`'s
    pub eol_accept_table: Vec<Option<RuleId>>,
}

impl Dfa {
    #[inline]
    pub fn next(&self, state: StateId, group: GroupId) -> StateId {
        self.state_table[state * self.nbr_groups + group as usize]
    }

    #[inline]
    pub fn is_dead(&self, state: StateId) -> bool {
        state >= self.nbr_states
    }

    /// Iterates over all the rules accepted in at least one state.
    pub fn accepted_rules(&self) -> BTreeSet<RuleId> {
        self.accept_table.iter().chain(&self.eol_accept_table).flatten().copied().collect()
    }
}

pub struct DfaBuilder<'a> {
    nfa: &'a Nfa,
    groups: &'a ByteGroups,
}

impl<'a> DfaBuilder<'a> {
    pub fn new(nfa: &'a Nfa, groups: &'a ByteGroups) -> Self {
        DfaBuilder { nfa, groups }
    }

    /// Determinizes the NFA from each of the `starts` states. Identical subsets reached from
    /// different starts share the same DFA state.
    pub fn build(&self, starts: &[NfaStateId]) -> Dfa {
        let nbr_groups = self.groups.nbr_groups();
        let representatives = self.groups.group_sets().iter().map(|set| set.first().unwrap_or_default()).to_vec();
        let mut states = BTreeMap::<BTreeSet<NfaStateId>, StateId>::new();
        let mut subsets = Vec::<BTreeSet<NfaStateId>>::new();
        let mut initial_states = Vec::new();
        for &start in starts {
            let key = self.nfa.closure([start]);
            let id = *states.entry(key.clone()).or_insert_with(|| {
                subsets.push(key);
                subsets.len() - 1
            });
            initial_states.push(id);
        }

        // table of optional destinations, the dead state is only known at the end
        let mut table = Vec::<Option<StateId>>::new();
        let mut accept_table = Vec::new();
        let mut eol_accept_table = Vec::new();
        let mut current = 0;
        while current < subsets.len() {
            let subset = subsets[current].clone();
            let (accept, eol_accept) = self.accepts(&subset);
            accept_table.push(accept);
            eol_accept_table.push(eol_accept);
            for &b in &representatives {
                let next = self.nfa.step(&subset, b);
                if next.is_empty() {
                    table.push(None);
                } else {
                    let id = *states.entry(next.clone()).or_insert_with(|| {
                        subsets.push(next);
                        subsets.len() - 1
                    });
                    table.push(Some(id));
                }
            }
            current += 1;
        }
        let nbr_states = subsets.len();
        log::debug!("DFA: {nbr_states} states, {nbr_groups} groups, initial states {}", initial_states.iter().join(", "));
        Dfa {
            nbr_groups,
            nbr_states,
            initial_states,
            state_table: table.into_iter().map(|s| s.unwrap_or(nbr_states)).collect(),
            accept_table,
            eol_accept_table,
        }
    }

    /// Selects the accepted rules of a subset: the earliest declared rule wins.
    fn accepts(&self, subset: &BTreeSet<NfaStateId>) -> (Option<RuleId>, Option<RuleId>) {
        let mut accept: Option<RuleId> = None;
        let mut eol_accept: Option<RuleId> = None;
        for a in subset.iter().filter_map(|&s| self.nfa.state(s).accept) {
            let best = if a.eol { &mut eol_accept } else { &mut accept };
            if best.map_or(true, |r| a.rule < r) {
                *best = Some(a.rule);
            }
        }
        if let (Some(rule), Some(eol_rule)) = (accept, eol_accept) {
            if rule < eol_rule {
                eol_accept = None;
            }
        }
        (accept, eol_accept)
    }
}
