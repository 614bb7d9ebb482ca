// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Thompson NFA built from the [regular expression trees](crate::regexgen::ReNode) of the
//! lexer rules.

use std::collections::{BTreeMap, BTreeSet};
use crate::byteset::{ByteGroups, ByteSet};
use crate::lexergen::RuleId;
use crate::regexgen::ReNode;

pub type NfaStateId = usize;

/// Accepting information attached to the final state of a rule.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Accept {
    pub rule: RuleId,
    /// the match is only accepted at the end of a line (`$` anchor)
    pub eol: bool,
}

#[derive(Clone, Debug, Default)]
pub struct NfaState {
    pub eps: Vec<NfaStateId>,
    pub trans: Vec<(ByteSet, NfaStateId)>,
    pub accept: Option<Accept>,
}

/// Sub-automaton with a single entry and a single exit state.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Fragment {
    pub start: NfaStateId,
    pub end: NfaStateId,
}

#[derive(Clone, Debug, Default)]
pub struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    pub fn new() -> Self {
        Nfa { states: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id]
    }

    pub fn add_state(&mut self) -> NfaStateId {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    pub fn add_eps(&mut self, from: NfaStateId, to: NfaStateId) {
        self.states[from].eps.push(to);
    }

    pub fn add_trans(&mut self, from: NfaStateId, set: ByteSet, to: NfaStateId) {
        self.states[from].trans.push((set, to));
    }

    pub fn set_accept(&mut self, id: NfaStateId, accept: Accept) {
        self.states[id].accept = Some(accept);
    }

    /// Iterates over the byte sets of all the transitions.
    pub fn transition_sets(&self) -> impl Iterator<Item = &ByteSet> {
        self.states.iter().flat_map(|s| s.trans.iter().map(|(set, _)| set))
    }

    /// Adds the states of `node` and returns the fragment.
    pub fn add_node(&mut self, node: &ReNode) -> Fragment {
        match node {
            ReNode::Empty => {
                let start = self.add_state();
                let end = self.add_state();
                self.add_eps(start, end);
                Fragment { start, end }
            }
            ReNode::Set(set) => {
                let start = self.add_state();
                let end = self.add_state();
                self.add_trans(start, *set, end);
                Fragment { start, end }
            }
            ReNode::Concat(items) => {
                let mut frag: Option<Fragment> = None;
                for item in items {
                    let next = self.add_node(item);
                    frag = Some(match frag {
                        None => next,
                        Some(f) => {
                            self.add_eps(f.end, next.start);
                            Fragment { start: f.start, end: next.end }
                        }
                    });
                }
                frag.unwrap_or_else(|| self.add_node(&ReNode::Empty))
            }
            ReNode::Or(items) => {
                let start = self.add_state();
                let end = self.add_state();
                for item in items {
                    let f = self.add_node(item);
                    self.add_eps(start, f.start);
                    self.add_eps(f.end, end);
                }
                Fragment { start, end }
            }
            ReNode::Repeat(item, min, max) => {
                let start = self.add_state();
                let mut cur = start;
                for _ in 0..*min {
                    let f = self.add_node(item);
                    self.add_eps(cur, f.start);
                    cur = f.end;
                }
                let end = self.add_state();
                match max {
                    None => {
                        let hub = self.add_state();
                        let f = self.add_node(item);
                        self.add_eps(cur, hub);
                        self.add_eps(hub, f.start);
                        self.add_eps(f.end, hub);
                        self.add_eps(hub, end);
                    }
                    Some(max) => {
                        for _ in *min..*max {
                            let f = self.add_node(item);
                            self.add_eps(cur, f.start);
                            self.add_eps(cur, end);
                            cur = f.end;
                        }
                        self.add_eps(cur, end);
                    }
                }
                Fragment { start, end }
            }
        }
    }

    /// Adds a fragment that matches the shortest input ending with a match of `end`.
    ///
    /// This is the determinized search automaton of `.* end` in which the accepting states
    /// have no outgoing transition, so the run stops at the first occurrence of `end`.
    pub fn add_until(&mut self, end: &ReNode) -> Fragment {
        let mut sub = Nfa::new();
        let sub_frag = sub.add_node(end);
        let initial = sub.closure([sub_frag.start]);
        let group_sets = ByteGroups::new(sub.transition_sets()).group_sets();
        let start = self.add_state();
        let exit = self.add_state();
        let mut map = BTreeMap::<BTreeSet<NfaStateId>, NfaStateId>::new();
        map.insert(initial.clone(), start);
        let mut stack = vec![initial.clone()];
        while let Some(set) = stack.pop() {
            let id = map[&set];
            if set.contains(&sub_frag.end) {
                self.add_eps(id, exit);
                continue;
            }
            let mut targets = BTreeMap::<BTreeSet<NfaStateId>, ByteSet>::new();
            for group in &group_sets {
                let Some(b) = group.first() else { continue };
                let mut next = sub.step(&set, b);
                next.extend(initial.iter().copied());
                targets.entry(next).or_default().union(group);
            }
            for (next, bytes) in targets {
                let next_id = match map.get(&next) {
                    Some(&next_id) => next_id,
                    None => {
                        let next_id = self.add_state();
                        map.insert(next.clone(), next_id);
                        stack.push(next);
                        next_id
                    }
                };
                self.add_trans(id, bytes, next_id);
            }
        }
        log::trace!("until-automaton of '{end}': {} states", map.len());
        Fragment { start, end: exit }
    }

    /// Returns the epsilon closure of `states`.
    pub fn closure<I: IntoIterator<Item = NfaStateId>>(&self, states: I) -> BTreeSet<NfaStateId> {
        let mut set = BTreeSet::new();
        let mut stack = states.into_iter().collect::<Vec<_>>();
        while let Some(s) = stack.pop() {
            if set.insert(s) {
                stack.extend(self.states[s].eps.iter().copied());
            }
        }
        set
    }

    /// Returns the closure of the states reached from `states` with the byte `b`.
    pub fn step(&self, states: &BTreeSet<NfaStateId>, b: u8) -> BTreeSet<NfaStateId> {
        let targets = states.iter()
            .flat_map(|&s| self.states[s].trans.iter())
            .filter(|(set, _)| set.contains(b))
            .map(|(_, t)| *t)
            .collect::<Vec<_>>();
        self.closure(targets)
    }
}
