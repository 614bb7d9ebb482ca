// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use std::collections::BTreeSet;
use crate::btreeset;
use crate::log::LogStatus;
use super::*;

/// Test grammars, shared with the parser generator and parser tests.
pub(crate) fn build_grammar(id: u32) -> GrammarBuilder {
    let mut g = GrammarBuilder::new();
    match id {
        // ambiguous expressions with precedence
        0 => {
            g.declare_token("NUM").unwrap();
            g.set_left("'+' '-'").unwrap();
            g.set_left("'*' '/'").unwrap();
            g.set_right("'^'").unwrap();
            g.set_precedence("NEG").unwrap();
            g.add_production("expr", "expr '+' expr | expr '-' expr | expr '*' expr | expr '/' expr").unwrap();
            g.add_production("expr", "expr '^' expr | '-' expr %prec NEG | '(' expr ')' | NUM").unwrap();
        }
        // unambiguous expressions
        1 => {
            g.declare_token("id").unwrap();
            g.add_production("E", "E '+' T | T").unwrap();
            g.add_production("T", "T '*' F | F").unwrap();
            g.add_production("F", "'(' E ')' | id").unwrap();
        }
        // LALR(1) but not SLR(1)
        2 => {
            g.declare_token("id").unwrap();
            g.add_production("S", "L '=' R | R").unwrap();
            g.add_production("L", "'*' R | id").unwrap();
            g.add_production("R", "L").unwrap();
        }
        // comparisons are non-associative
        3 => {
            g.declare_token("ID").unwrap();
            g.set_nonassoc("'<' '>'").unwrap();
            g.set_left("'+'").unwrap();
            g.add_production("expr", "expr '<' expr | expr '>' expr | expr '+' expr | ID").unwrap();
        }
        // dangling else, resolved as shift
        4 => {
            g.declare_token("if then else cond other").unwrap();
            g.add_production("stmt", "if cond then stmt | if cond then stmt else stmt | other").unwrap();
        }
        // nullable list
        5 => {
            g.declare_token("ITEM").unwrap();
            g.add_production("list", "list ITEM | %empty").unwrap();
        }
        // reduce/reduce conflict
        6 => {
            g.declare_token("x").unwrap();
            g.add_production("s", "a | b").unwrap();
            g.add_production("a", "x").unwrap();
            g.add_production("b", "x").unwrap();
        }
        _ => panic!("unknown grammar {id}"),
    }
    g
}

#[test]
fn grammar_tokens() {
    let mut g = GrammarBuilder::new();
    g.declare_token("A B").unwrap();
    g.declare_token("\tC\nA ").unwrap();
    g.set_left("'+' D").unwrap();
    assert_eq!(g.token_id("A"), Some(1));
    assert_eq!(g.token_id("C"), Some(3));
    assert_eq!(g.token_id("'+'"), Some(4));
    assert_eq!(g.token_id("D"), Some(5));
    assert_eq!(g.token_id("E"), None);
    assert_eq!(g.declare_token("A 9x"), Err(GrammarError::InvalidName("9x".to_string())));
    assert_eq!(g.token_id("9x"), None);
    assert_eq!(g.set_right("B D"), Err(GrammarError::PrecedenceRedeclared("D".to_string())));
    assert_eq!(g.set_right("''"), Err(GrammarError::InvalidName("''".to_string())));
    g.set_right("B").unwrap();
}

#[test]
fn grammar_add_production() {
    let mut g = GrammarBuilder::new();
    assert_eq!(g.add_production("s", "a 'x' | b | %empty"), Ok(0));
    assert_eq!(g.add_production("a", ""), Ok(3));
    assert_eq!(g.add_production("b", "'y' %prec 'z'"), Ok(4));
    assert_eq!(g.num_productions(), 5);
    assert_eq!(g.token_id("'x'"), Some(1));
    assert_eq!(g.token_id("'z'"), Some(3));

    let tests = vec![
        ("s", "a %empty", GrammarError::RhsSyntax { lhs: "s".to_string(), msg: "%empty in a non-empty alternative".to_string() }),
        ("s", "%empty a", GrammarError::RhsSyntax { lhs: "s".to_string(), msg: "%empty in a non-empty alternative".to_string() }),
        ("s", "a %prec", GrammarError::RhsSyntax { lhs: "s".to_string(), msg: "missing token after %prec".to_string() }),
        ("s", "a %prec X %prec Y", GrammarError::RhsSyntax { lhs: "s".to_string(), msg: "several %prec in one alternative".to_string() }),
        ("s", "a %left", GrammarError::RhsSyntax { lhs: "s".to_string(), msg: "unknown directive %left".to_string() }),
        ("s", "a b-c", GrammarError::InvalidName("b-c".to_string())),
        ("'s'", "a", GrammarError::InvalidName("'s'".to_string())),
        ("", "a", GrammarError::InvalidName("".to_string())),
    ];
    for (test_id, (lhs, rhs, expected)) in tests.into_iter().enumerate() {
        assert_eq!(g.add_production(lhs, rhs), Err(expected), "test {test_id} failed");
    }
    assert_eq!(g.num_productions(), 5);
}

#[test]
fn grammar_resolve() {
    let grammar = build_grammar(0).to_grammar().unwrap();
    let table = grammar.get_symbol_table();
    assert_eq!(grammar.get_start(), 0);
    assert_eq!(grammar.productions().len(), 8);
    let strs = grammar.productions().iter().map(|p| p.to_str(Some(table))).collect::<Vec<_>>();
    assert_eq!(strs[0], "expr -> expr '+' expr");
    assert_eq!(strs[5], "expr -> '-' expr");
    let prec = |p: ProdId| grammar.production(p).and_then(|p| p.prec).map(|p| (p.level, p.assoc));
    assert_eq!(prec(0), Some((1, Assoc::Left)));
    assert_eq!(prec(2), Some((2, Assoc::Left)));
    assert_eq!(prec(4), Some((3, Assoc::Right)));
    assert_eq!(prec(5), Some((4, Assoc::None)));
    assert_eq!(prec(6), None);
    assert_eq!(prec(7), None);
    // NEG is only used in %prec
    assert_eq!(grammar.get_log().get_warnings().to_vec(), vec!["unused tokens: NEG"]);

    let mut g = GrammarBuilder::new();
    g.set_left("'+'").unwrap();
    g.set_left("'*'").unwrap();
    g.add_production("e", "e '+' e '*' | e '*' e '+' | 'x'").unwrap();
    let grammar = g.to_grammar().unwrap();
    assert_eq!(grammar.production(0).and_then(|p| p.prec).map(|p| p.level), Some(2));
    assert_eq!(grammar.production(1).and_then(|p| p.prec).map(|p| p.level), Some(1));
}

#[test]
fn grammar_errors() {
    let tests: Vec<(Vec<(&str, &str)>, &str, GrammarError)> = vec![
        (vec![], "", GrammarError::NoProductions),
        (vec![("s", "a")], "", GrammarError::UndeclaredSymbol { name: "a".to_string(), prod: 0 }),
        (vec![("s", "'x'"), ("s", "X %prec Y")], "X", GrammarError::UnknownPrecToken { name: "Y".to_string(), prod: 1 }),
        (vec![("s", "'x'"), ("X", "'y'")], "X", GrammarError::TokenAsLhs("X".to_string())),
        (vec![("s", "'x'"), ("t", "'y'")], "", GrammarError::UnreachableNonterminal("t".to_string())),
        (vec![("s", "s 'x'")], "", GrammarError::UnproductiveStart("s".to_string())),
        (vec![("s", "a"), ("a", "s")], "", GrammarError::UnproductiveStart("s".to_string())),
    ];
    for (test_id, (prods, tokens, expected)) in tests.into_iter().enumerate() {
        let mut g = GrammarBuilder::new();
        g.declare_token(tokens).unwrap();
        for (lhs, rhs) in prods {
            g.add_production(lhs, rhs).unwrap();
        }
        assert_eq!(g.to_grammar().err(), Some(expected.clone()), "test {test_id} failed");
        assert_eq!(g.build().err(), Some(expected), "test {test_id} failed");
    }
}

#[test]
fn grammar_build_fix_and_retry() {
    let mut g = GrammarBuilder::new();
    g.add_production("s", "a 'x'").unwrap();
    assert!(g.build().is_err());
    g.add_production("a", "'y' | %empty").unwrap();
    assert!(g.build().is_ok());
}

#[test]
fn grammar_unproductive() {
    let mut g = GrammarBuilder::new();
    g.add_production("s", "'x' | t").unwrap();
    g.add_production("t", "t 'y'").unwrap();
    let grammar = g.to_grammar().unwrap();
    assert_eq!(grammar.get_log().get_warnings().to_vec(), vec!["unproductive nonterminals: t"]);
}

#[test]
fn grammar_first() {
    let tests: Vec<(u32, Vec<(&str, Vec<&str>, bool)>)> = vec![
        (1, vec![
            ("E", vec!["'('", "id"], false),
            ("T", vec!["'('", "id"], false),
            ("F", vec!["'('", "id"], false),
        ]),
        (2, vec![
            ("S", vec!["'*'", "id"], false),
            ("R", vec!["'*'", "id"], false),
        ]),
        (5, vec![
            ("list", vec!["ITEM"], true),
        ]),
    ];
    for (test_id, (id, expected)) in tests.into_iter().enumerate() {
        let grammar = build_grammar(id).to_grammar().unwrap();
        let table = grammar.get_symbol_table();
        for (name, first, nullable) in expected {
            let var = table.find_nonterminal(name).unwrap();
            let first = first.into_iter().map(|t| table.find_terminal(t).unwrap()).collect::<BTreeSet<_>>();
            assert_eq!(grammar.get_first(var), &first, "test {test_id} failed on {name}");
            assert_eq!(grammar.is_nullable(var), nullable, "test {test_id} failed on {name}");
        }
    }

    // 'z' = 1, 'x' = 2, 'y' = 3
    let mut g = GrammarBuilder::new();
    g.add_production("s", "a b 'z'").unwrap();
    g.add_production("a", "'x' | %empty").unwrap();
    g.add_production("b", "'y' | %empty").unwrap();
    let grammar = g.to_grammar().unwrap();
    let (first, nullable) = grammar.first_of_seq(&[Symbol::NT(1), Symbol::NT(2)]);
    assert_eq!((first, nullable), (btreeset![2, 3], true));
    let (first, nullable) = grammar.first_of_seq(&[Symbol::NT(1), Symbol::T(3), Symbol::NT(2)]);
    assert_eq!((first, nullable), (btreeset![2, 3], false));
    assert_eq!(grammar.get_first(0), &btreeset![1, 2, 3]);
}
