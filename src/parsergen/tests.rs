// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use crate::grammar::tests::build_grammar;
use crate::log::LogStatus;
use super::*;

fn build(id: u32) -> (Grammar, ParseTables, BufLog, usize) {
    let grammar = build_grammar(id).to_grammar().unwrap();
    let mut parsergen = ParserGen::new(&grammar);
    let tables = parsergen.build();
    let num_states = parsergen.num_states();
    let log = parsergen.give_log();
    (grammar, tables, log, num_states)
}

#[test]
fn lalr_states() {
    // 1: dragon book's expression grammar, 2: LALR(1) but not SLR(1), 5: nullable list
    let tests = vec![(1, 12), (2, 10), (5, 3)];
    for (test_id, (id, expected_states)) in tests.into_iter().enumerate() {
        let (_, tables, log, num_states) = build(id);
        assert_eq!(num_states, expected_states, "test {test_id} failed");
        assert_eq!(tables.num_states, expected_states, "test {test_id} failed");
        assert!(log.has_no_warnings(), "test {test_id} failed:\n{log}");
        assert_eq!(tables.actions.iter().filter(|a| **a == Action::Accept).count(), 1, "test {test_id} failed");
    }
}

#[test]
fn lalr_lookaheads() {
    // S -> L '=' R | R ; L -> '*' R | id ; R -> L
    let grammar = build_grammar(2).to_grammar().unwrap();
    let table = grammar.get_symbol_table();
    let mut parsergen = ParserGen::new(&grammar);
    let tables = parsergen.build();
    let eq = table.find_terminal("'='").unwrap();
    let id = table.find_terminal("id").unwrap();

    // after L from the start state: shift '=' or reduce R -> L on $end only
    let start_l = match tables.goto(0, table.find_nonterminal("L").unwrap()) {
        Action::Goto(s) => s,
        action => panic!("unexpected {action}"),
    };
    assert_eq!(parsergen.get_kernel(start_l), &[LrItem { prod: 0, dot: 1 }, LrItem { prod: 4, dot: 1 }]);
    assert!(matches!(tables.action(start_l, eq), Action::Shift(_)));
    assert_eq!(tables.action(start_l, EOI), Action::Reduce(4));
    assert_eq!(parsergen.get_lookaheads(start_l)[1].iter().copied().collect::<Vec<_>>(), vec![EOI]);

    // id reduces on '=' and $end
    let after_id = match tables.action(0, id) {
        Action::Shift(s) => s,
        action => panic!("unexpected {action}"),
    };
    assert_eq!(tables.action(after_id, eq), Action::Reduce(3));
    assert_eq!(tables.action(after_id, EOI), Action::Reduce(3));
    assert_eq!(tables.action(after_id, id), Action::Error(ErrorKind::Syntax));
}

#[test]
fn lalr_precedence() {
    let (grammar, tables, log, _) = build(0);
    let table = grammar.get_symbol_table();
    let t = |name: &str| table.find_terminal(name).unwrap();
    // all the conflicts are resolved by precedence
    assert!(log.has_no_warnings(), "{log}");
    assert!(log.get_notes().any(|n| n.contains("resolved as reduce 0 by precedence")), "{log}");
    assert!(log.get_notes().any(|n| n.contains("0 shift/reduce conflicts, 0 reduce/reduce conflicts")), "{log}");

    // state after "expr '+' expr"
    let s0_expr = match tables.goto(0, 0) { Action::Goto(s) => s, a => panic!("unexpected {a}") };
    let after_plus = match tables.action(s0_expr, t("'+'")) { Action::Shift(s) => s, a => panic!("unexpected {a}") };
    let after_rhs = match tables.goto(after_plus, 0) { Action::Goto(s) => s, a => panic!("unexpected {a}") };
    assert_eq!(tables.action(after_rhs, t("'+'")), Action::Reduce(0));
    assert_eq!(tables.action(after_rhs, t("'-'")), Action::Reduce(0));
    assert!(matches!(tables.action(after_rhs, t("'*'")), Action::Shift(_)));
    assert!(matches!(tables.action(after_rhs, t("'^'")), Action::Shift(_)));
    assert_eq!(tables.action(after_rhs, EOI), Action::Reduce(0));

    // state after "expr '^' expr": right-associative
    let after_pow = match tables.action(s0_expr, t("'^'")) { Action::Shift(s) => s, a => panic!("unexpected {a}") };
    let after_rhs = match tables.goto(after_pow, 0) { Action::Goto(s) => s, a => panic!("unexpected {a}") };
    assert!(matches!(tables.action(after_rhs, t("'^'")), Action::Shift(_)));
    assert_eq!(tables.action(after_rhs, t("'*'")), Action::Reduce(4));
}

#[test]
fn lalr_nonassoc() {
    let (grammar, tables, _, _) = build(3);
    let table = grammar.get_symbol_table();
    let lt = table.find_terminal("'<'").unwrap();
    let gt = table.find_terminal("'>'").unwrap();
    let plus = table.find_terminal("'+'").unwrap();
    let s_expr = match tables.goto(0, 0) { Action::Goto(s) => s, a => panic!("unexpected {a}") };
    let after_lt = match tables.action(s_expr, lt) { Action::Shift(s) => s, a => panic!("unexpected {a}") };
    let after_rhs = match tables.goto(after_lt, 0) { Action::Goto(s) => s, a => panic!("unexpected {a}") };
    assert_eq!(tables.action(after_rhs, lt), Action::Error(ErrorKind::NonAssociative));
    assert_eq!(tables.action(after_rhs, gt), Action::Error(ErrorKind::NonAssociative));
    assert!(matches!(tables.action(after_rhs, plus), Action::Shift(_)));
    assert_eq!(tables.action(after_rhs, EOI), Action::Reduce(0));
}

#[test]
fn lalr_default_resolutions() {
    // dangling else: shift, with a warning
    let (grammar, tables, log, _) = build(4);
    let else_t = grammar.get_symbol_table().find_terminal("else").unwrap();
    assert_eq!(log.num_warnings(), 1, "{log}");
    assert!(log.get_warnings().all(|w| w.contains("shift/reduce conflict on else")), "{log}");
    assert!(log.get_notes().any(|n| n.contains("1 shift/reduce conflicts, 0 reduce/reduce conflicts")), "{log}");
    assert!((0..tables.num_states).any(|s| matches!(tables.action(s, else_t), Action::Shift(_))));

    // reduce/reduce: the first production wins
    let (grammar, tables, log, _) = build(6);
    let x = grammar.get_symbol_table().find_terminal("x").unwrap();
    assert_eq!(log.num_warnings(), 1, "{log}");
    assert!(log.get_warnings().all(|w| w.contains("reduce/reduce conflict on $end, reducing a -> x instead of b -> x")), "{log}");
    let after_x = match tables.action(0, x) { Action::Shift(s) => s, a => panic!("unexpected {a}") };
    assert_eq!(tables.action(after_x, EOI), Action::Reduce(2));
}

#[test]
fn tables_access() {
    let (_, tables, _, _) = build(5);
    assert_eq!(tables.action(0, -1), Action::Error(ErrorKind::UnknownToken));
    assert_eq!(tables.action(0, 99), Action::Error(ErrorKind::UnknownToken));
    assert_eq!(tables.action(99, EOI), Action::Error(ErrorKind::UnknownToken));
    assert_eq!(tables.goto(0, 9), Action::Error(ErrorKind::Syntax));
    assert_eq!(tables.action(0, EOI), Action::Reduce(1));
}
