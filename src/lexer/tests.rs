// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use crate::lexergen::{Dest, LexRule, LexerGen};
use crate::SKIP;
use super::*;

fn build(rules: Vec<LexRule>, states: &[&str], flags: LexFlags) -> Lexer {
    let mut lexgen = LexerGen::new();
    lexgen.set_flags(flags);
    for state in states {
        lexgen.push_state(state).unwrap();
    }
    for rule in rules {
        lexgen.push_rule(rule).unwrap();
    }
    lexgen.build().unwrap()
}

/// Scans the whole input, including the final EOI token, and returns (id, lexeme) pairs.
fn scan(lexer: &Lexer, input: &str) -> Vec<(TokenId, String)> {
    let mut cursor = lexer.consume(input);
    let mut tokens = Vec::new();
    loop {
        let token = cursor.advance();
        tokens.push((token.id, token.text().to_string()));
        if token.is_eoi() {
            break;
        }
    }
    tokens
}

fn tok(id: TokenId, text: &str) -> (TokenId, String) {
    (id, text.to_string())
}

#[test]
fn lexer_longest_match() {
    let lexer = build(vec![
        LexRule::new("if", 1),
        LexRule::new("[a-z]+", 2),
        LexRule::new("[0-9]+", 3),
        LexRule::new("[0-9]+\\.[0-9]+", 4),
        LexRule::skip("[ \\t\\n]+"),
    ], &[], LexFlags::empty());
    let tests = vec![
        ("if iffy", vec![tok(1, "if"), tok(2, "iffy"), tok(EOI, "")]),
        ("i f", vec![tok(2, "i"), tok(2, "f"), tok(EOI, "")]),
        ("12 1.5 3.", vec![tok(3, "12"), tok(4, "1.5"), tok(3, "3"), tok(INVALID, "."), tok(EOI, "")]),
        ("", vec![tok(EOI, "")]),
        ("  \n", vec![tok(EOI, "")]),
    ];
    for (test_id, (input, expected)) in tests.into_iter().enumerate() {
        assert_eq!(scan(&lexer, input), expected, "test {test_id} failed");
    }
}

#[test]
fn lexer_spans() {
    let lexer = build(vec![LexRule::new("[a-z]+", 1).user_data(7), LexRule::skip(" +")], &[], LexFlags::empty());
    let mut cursor = lexer.consume("ab  cde?");
    let t = cursor.advance();
    assert_eq!((t.id, t.span.clone(), t.user_data, t.lexeme), (1, 0..2, 7, b"ab".as_slice()));
    let t = cursor.advance();
    assert_eq!((t.id, t.span.clone()), (1, 4..7));
    let t = cursor.advance();
    assert_eq!((t.id, t.span.clone(), t.user_data), (INVALID, 7..8, 0));
    assert!(t.is_invalid());
    for _ in 0..3 {
        let t = cursor.advance();
        assert!(t.is_eoi());
        assert_eq!(t.span, 8..8);
    }
    assert_eq!(cursor.position(), 8);
}

#[test]
fn lexer_states() {
    // strings: "..." with escaped quotes, in a separate state
    let lexer = build(vec![
        LexRule::new("\\\"", 1).dest(Dest::Goto("STRING".into())),
        LexRule::new("[a-z]+", 2),
        LexRule::skip(" +"),
        LexRule::new("[^\"\\\\]+", 3).in_state("STRING"),
        LexRule::new("\\\\.", 4).in_state("STRING"),
        LexRule::new("\\\"", 5).in_state("STRING").dest(Dest::Goto(INITIAL.into())),
    ], &["STRING"], LexFlags::empty());
    let input = r#"say "hi \"you\"" now"#;
    let expected = vec![
        tok(2, "say"), tok(1, "\""), tok(3, "hi "), tok(4, "\\\""), tok(3, "you"), tok(4, "\\\""), tok(5, "\""),
        tok(2, "now"), tok(EOI, ""),
    ];
    assert_eq!(scan(&lexer, input), expected);

    let string = lexer.state_id("STRING").unwrap();
    let mut cursor = lexer.consume_in("abc\"", string);
    let t = cursor.advance();
    assert_eq!((t.id, t.state), (3, string));
    let t = cursor.advance();
    assert_eq!((t.id, t.state), (5, INITIAL));
    assert_eq!(lexer.state_name(string), Some("STRING"));
    assert_eq!(lexer.state_id("NONE"), None);
}

#[test]
fn lexer_push_pop() {
    // nested parentheses
    let lexer = build(vec![
        LexRule::new("\\(", 1).in_states([INITIAL]).dest(Dest::Push("NESTED".into())),
        LexRule::new("\\(", 2).in_state("NESTED").dest(Dest::Push("NESTED".into())),
        LexRule::new("\\)", 3).in_state("NESTED").dest(Dest::Pop),
        LexRule::new("[a-z]+", 4).in_all_states(),
        LexRule::new("[0-9]+", 5).in_state("NESTED"),
        LexRule::new("\\)", 6).dest(Dest::Pop),
    ], &["NESTED"], LexFlags::empty());
    let nested = lexer.state_id("NESTED").unwrap();
    let mut cursor = lexer.consume("a(b(1)2)3)");
    let mut trace = Vec::new();
    loop {
        let t = cursor.advance();
        if t.is_eoi() {
            break;
        }
        trace.push((t.id, cursor.state_stack().len()));
    }
    assert_eq!(trace, vec![(4, 0), (1, 1), (4, 1), (2, 2), (5, 2), (3, 1), (5, 1), (3, 0), (INVALID, 0), (6, 0)]);
    assert_eq!(cursor.state(), INITIAL);

    // pop on an empty stack returns to INITIAL
    let mut cursor = lexer.consume_in(")x", nested);
    assert_eq!(cursor.advance().id, 3);
    assert_eq!(cursor.state(), INITIAL);
    assert_eq!(cursor.advance().id, 4);
}

#[test]
fn lexer_set_state() {
    let lexer = build(vec![
        LexRule::new("[a-z]+", 1),
        LexRule::new("[a-z]+", 2).in_state("B"),
    ], &["B"], LexFlags::empty());
    let mut cursor = lexer.consume("ab");
    cursor.set_state(1);
    assert_eq!(cursor.advance().id, 2);
    let mut cursor = lexer.consume("ab");
    cursor.set_state(9);
    assert_eq!(cursor.advance().id, INVALID);
    let mut cursor = lexer.consume("ab").with_state(1);
    assert_eq!((cursor.state(), cursor.advance().id), (1, 2));
}

#[test]
fn lexer_range() {
    let lexer = build(vec![
        LexRule::range("/\\*", "\\*/", 1),
        LexRule::range("//", "\\n", SKIP),
        LexRule::new("[a-z]+", 2),
        LexRule::new("/", 3),
        LexRule::skip("[ \\n]+"),
    ], &[], LexFlags::empty());
    let tests = vec![
        ("a /* x */ b", vec![tok(2, "a"), tok(1, "/* x */"), tok(2, "b"), tok(EOI, "")]),
        ("/**/ /* a */ b */", vec![tok(1, "/**/"), tok(1, "/* a */"), tok(2, "b"), tok(INVALID, "*"), tok(3, "/"), tok(EOI, "")]),
        ("a // b */\nc", vec![tok(2, "a"), tok(2, "c"), tok(EOI, "")]),
        ("/* open", vec![tok(3, "/"), tok(INVALID, "*"), tok(2, "open"), tok(EOI, "")]),
    ];
    for (test_id, (input, expected)) in tests.into_iter().enumerate() {
        assert_eq!(scan(&lexer, input), expected, "test {test_id} failed");
    }
}

#[test]
fn lexer_anchors() {
    let lexer = build(vec![
        LexRule::new("^#[a-z]+", 1),
        LexRule::new("#", 2),
        LexRule::new("[a-z]+$", 3),
        LexRule::new("[a-z]+", 4),
        LexRule::skip("[ \\n]+"),
    ], &[], LexFlags::empty());
    let tests = vec![
        ("#def", vec![1]),
        ("a #def", vec![4, 2, 3]),
        ("ab\n#if x\ny z", vec![3, 1, 3, 4, 3]),
        ("ab cd ", vec![4, 4]),
    ];
    for (test_id, (input, expected)) in tests.into_iter().enumerate() {
        let ids = lexer.consume(input).map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, expected, "test {test_id} failed");
    }
}

#[test]
fn lexer_flags() {
    let lexer = build(vec![LexRule::new("select", 1), LexRule::new("[a-z]+", 2)], &[], LexFlags::ICASE | LexFlags::SKIP_WS);
    let ids = lexer.consume("SELECT Select foo BAR").map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 1, 2, 2]);
    assert_eq!(lexer.flags(), LexFlags::ICASE | LexFlags::SKIP_WS);

    let lexer = build(vec![LexRule::new(".+", 1), LexRule::new("\\n", 2)], &[], LexFlags::DOT_NOT_LF);
    let ids = lexer.consume("ab\ncd").map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2, 1]);

    let lexer = build(vec![LexRule::new(".+", 1), LexRule::new("\\r\\n", 2)], &[], LexFlags::DOT_NOT_CRLF);
    let ids = lexer.consume("ab\r\ncd").map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2, 1]);
}

#[test]
fn lexer_zero_length() {
    // the empty match switches to another state, where it can't match again
    let lexer = build(vec![
        LexRule::new("x?", 1).dest(Dest::Goto("B".into())),
        LexRule::new("y", 2).in_state("B").dest(Dest::Goto(INITIAL.into())),
    ], &["B"], LexFlags::MATCH_ZERO_LEN);
    let tokens = lexer.consume("yxy").map(|t| (t.id, t.span)).collect::<Vec<_>>();
    assert_eq!(tokens, vec![(1, 0..0), (2, 0..1), (1, 1..2), (2, 2..3)]);

    // an empty match that doesn't change the state is only allowed once at each position
    let lexer = build(vec![LexRule::new("a*", 1)], &[], LexFlags::MATCH_ZERO_LEN);
    let tokens = lexer.consume("b").map(|t| (t.id, t.span)).collect::<Vec<_>>();
    assert_eq!(tokens, vec![(1, 0..0), (INVALID, 0..1)]);
}

#[test]
fn lexer_iterator() {
    let lexer = build(vec![LexRule::new("[0-9]", 1)], &[], LexFlags::empty());
    let mut cursor = lexer.consume("12");
    assert_eq!(cursor.next().map(|t| t.id), Some(1));
    assert_eq!(cursor.next().map(|t| t.id), Some(1));
    assert_eq!(cursor.next(), None);
    assert_eq!(cursor.next(), None);
    assert_eq!(lexer.consume(&b"3\xff"[..]).map(|t| t.text().to_string()).collect::<Vec<_>>(), vec!["3", "\u{fffd}"]);
}

#[test]
fn lexer_display() {
    let terminal = Terminal { token: 3, user_data: 0, change: StateChange::Push(2) };
    assert_eq!(terminal.to_string(), "<end:3,state >2>");
    let terminal = Terminal { token: SKIP, user_data: 5, change: StateChange::Stay };
    assert_eq!(terminal.to_string(), "<skip,data 5>");
    let lexer = build(vec![LexRule::new("a\\n", 1)], &[], LexFlags::empty());
    let token = lexer.consume("a\n").advance();
    assert_eq!(token.to_string(), "1:\"a\\n\" @0-2");
}
