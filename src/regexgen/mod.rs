// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Regular expression parser.
//!
//! Transforms a pattern string into a [ReNode] tree, applying the lexer [flags](LexFlags)
//! (case-insensitivity, dot behaviour) and expanding the macros. The patterns are matched
//! byte by byte: a non-ASCII character outside a class is matched as its UTF-8 sequence.
//!
//! Supported syntax:
//! * literals, `"quoted strings"`, `.`, escapes `\n \r \t \f \v \0 \a \e \xHH \d \D \w \W \s \S`
//! * classes `[a-z_]`, `[^"]`, `[[:alpha:]]`
//! * groups `(...)`, `(?:...)`, alternation `|`
//! * quantifiers `*`, `+`, `?`, `{m}`, `{m,}`, `{m,n}`
//! * anchors `^` (start of pattern only) and `$` (end of pattern only)
//! * macro references `{NAME}`


use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use crate::byteset::ByteSet;
use crate::escape_byte;
use crate::lexergen::LexFlags;

/// Maximum bound of a `{m,n}` quantifier.
pub const MAX_REPEAT: u32 = 1000;

// ---------------------------------------------------------------------------------------------
// Errors

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PatternErrorKind {
    #[error("empty pattern")]
    EmptyPattern,
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("unterminated character class")]
    UnclosedClass,
    #[error("character class matches nothing")]
    EmptyClass,
    #[error("invalid class range '{}'-'{}'", .0.escape_debug(), .1.escape_debug())]
    InvalidRange(char, char),
    #[error("unknown POSIX class '{0}'")]
    UnknownPosixClass(String),
    #[error("invalid quantifier bounds")]
    InvalidQuantifier,
    #[error("quantifier without operand")]
    NothingToRepeat,
    #[error("lazy quantifiers are not supported")]
    LazyQuantifier,
    #[error("unterminated quoted string")]
    UnterminatedString,
    #[error("incomplete escape sequence")]
    TrailingBackslash,
    #[error("unknown escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid hexadecimal escape sequence")]
    InvalidHex,
    #[error("anchor '{0}' is only allowed at the start ('^') or at the end ('$') of a pattern")]
    MisplacedAnchor(char),
    #[error("non-ASCII characters are not allowed in a character class")]
    NonAsciiInClass,
    #[error("unterminated macro reference")]
    UnclosedMacro,
    #[error("unknown macro '{0}'")]
    UnknownMacro(String),
    #[error("recursive reference to macro '{0}'")]
    RecursiveMacro(String),
    #[error("in macro '{0}': {1}")]
    InMacro(String, Box<PatternError>),
}

/// Syntax error in a pattern, at byte position `pos`.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind} at position {pos}")]
pub struct PatternError {
    pub pos: usize,
    pub kind: PatternErrorKind,
}

impl PatternError {
    pub fn new(pos: usize, kind: PatternErrorKind) -> Self {
        PatternError { pos, kind }
    }
}

// ---------------------------------------------------------------------------------------------
// Regular expression tree

#[derive(Clone, PartialEq, Debug)]
pub enum ReNode {
    /// matches the empty string
    Empty,
    /// matches one byte of the set
    Set(ByteSet),
    Concat(Vec<ReNode>),
    Or(Vec<ReNode>),
    /// `Repeat(node, min, max)`, where `max = None` is unbounded
    Repeat(Box<ReNode>, u32, Option<u32>),
}

impl ReNode {
    pub fn byte(b: u8) -> Self {
        ReNode::Set(ByteSet::from_byte(b))
    }

    /// Creates the concatenation of the bytes of `s`.
    pub fn bytes(s: &[u8]) -> Self {
        ReNode::concat(s.iter().map(|&b| ReNode::byte(b)).collect())
    }

    pub fn concat(mut items: Vec<ReNode>) -> Self {
        match items.len() {
            0 => ReNode::Empty,
            1 => items.pop().unwrap_or(ReNode::Empty),
            _ => ReNode::Concat(items),
        }
    }

    pub fn or(mut items: Vec<ReNode>) -> Self {
        match items.len() {
            0 => ReNode::Empty,
            1 => items.pop().unwrap_or(ReNode::Empty),
            _ => ReNode::Or(items),
        }
    }

    /// Returns true if the expression matches the empty string.
    pub fn is_nullable(&self) -> bool {
        match self {
            ReNode::Empty => true,
            ReNode::Set(_) => false,
            ReNode::Concat(items) => items.iter().all(|n| n.is_nullable()),
            ReNode::Or(items) => items.iter().any(|n| n.is_nullable()),
            ReNode::Repeat(node, min, _) => *min == 0 || node.is_nullable(),
        }
    }

    fn fmt_set(set: &ByteSet, f: &mut Formatter<'_>) -> std::fmt::Result {
        if set.len() == 1 {
            return write!(f, "{}", escape_byte(set.first().unwrap_or_default()));
        }
        if *set == ByteSet::full() {
            return write!(f, ".");
        }
        write!(f, "[")?;
        for (a, b) in set.ranges() {
            match b - a {
                0 => write!(f, "{}", escape_byte(a))?,
                1 => write!(f, "{}{}", escape_byte(a), escape_byte(b))?,
                _ => write!(f, "{}-{}", escape_byte(a), escape_byte(b))?,
            }
        }
        write!(f, "]")
    }
}

impl Display for ReNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReNode::Empty => write!(f, "()"),
            ReNode::Set(set) => ReNode::fmt_set(set, f),
            ReNode::Concat(items) => items.iter().try_for_each(|n| write!(f, "{n}")),
            ReNode::Or(items) => {
                write!(f, "(")?;
                for (i, n) in items.iter().enumerate() {
                    if i > 0 { write!(f, "|")?; }
                    write!(f, "{n}")?;
                }
                write!(f, ")")
            }
            ReNode::Repeat(node, min, max) => {
                if matches!(**node, ReNode::Concat(_) | ReNode::Repeat(..)) {
                    write!(f, "({node})")?;
                } else {
                    write!(f, "{node}")?;
                }
                match (min, max) {
                    (0, None) => write!(f, "*"),
                    (1, None) => write!(f, "+"),
                    (0, Some(1)) => write!(f, "?"),
                    (m, None) => write!(f, "{{{m},}}"),
                    (m, Some(n)) if m == n => write!(f, "{{{m}}}"),
                    (m, Some(n)) => write!(f, "{{{m},{n}}}"),
                }
            }
        }
    }
}

/// Parsed pattern: its tree and the whole-match anchors.
#[derive(Clone, PartialEq, Debug)]
pub struct Regex {
    pub node: ReNode,
    /// `^`: the match must start at the beginning of the input or of a line
    pub bol: bool,
    /// `$`: the match must end at the end of the input or of a line
    pub eol: bool,
}

impl Regex {
    pub fn is_nullable(&self) -> bool {
        self.node.is_nullable()
    }
}

impl Display for Regex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", if self.bol { "^" } else { "" }, self.node, if self.eol { "$" } else { "" })
    }
}

// ---------------------------------------------------------------------------------------------
// Parser

/// Parses patterns with the given flags and macros.
///
/// ```
/// use std::collections::BTreeMap;
/// use lexalr::lexergen::LexFlags;
/// use lexalr::regexgen::RegexParser;
///
/// let macros = BTreeMap::from([("DIGIT".to_string(), "[0-9]".to_string())]);
/// let parser = RegexParser::new(LexFlags::empty(), &macros);
/// let re = parser.parse("{DIGIT}+(\\.{DIGIT}+)?").unwrap();
/// assert_eq!(re.to_string(), "[0-9]+(.[0-9]+)?");
/// assert!(parser.parse("(ab").is_err());
/// ```
pub struct RegexParser<'m> {
    flags: LexFlags,
    macros: &'m BTreeMap<String, String>,
}

impl<'m> RegexParser<'m> {
    pub fn new(flags: LexFlags, macros: &'m BTreeMap<String, String>) -> Self {
        RegexParser { flags, macros }
    }

    pub fn parse(&self, pattern: &str) -> Result<Regex, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::new(0, PatternErrorKind::EmptyPattern));
        }
        let mut scanner = Scanner { parser: self, pattern: pattern.as_bytes(), pos: 0, top: true, active: Vec::new() };
        scanner.parse_pattern()
    }

    /// Parses a macro body, which cannot contain anchors.
    fn parse_macro(&self, name: &str, active: &[String]) -> Result<ReNode, PatternErrorKind> {
        let body = self.macros.get(name).ok_or_else(|| PatternErrorKind::UnknownMacro(name.to_string()))?;
        if active.iter().any(|m| m == name) {
            return Err(PatternErrorKind::RecursiveMacro(name.to_string()));
        }
        let mut active = active.to_vec();
        active.push(name.to_string());
        let mut scanner = Scanner { parser: self, pattern: body.as_bytes(), pos: 0, top: false, active };
        scanner.parse_pattern()
            .map(|re| re.node)
            .map_err(|e| match e.kind {
                // keeps the innermost location of a cycle
                PatternErrorKind::RecursiveMacro(_) | PatternErrorKind::InMacro(..) => e.kind,
                _ => PatternErrorKind::InMacro(name.to_string(), Box::new(e)),
            })
    }

    fn literal(&self, b: u8) -> ByteSet {
        let mut set = ByteSet::from_byte(b);
        if self.flags.contains(LexFlags::ICASE) {
            set.add_ascii_case();
        }
        set
    }

    fn dot(&self) -> ByteSet {
        let mut set = ByteSet::full();
        if self.flags.contains(LexFlags::DOT_NOT_LF) {
            set.remove(b'\n');
        }
        if self.flags.contains(LexFlags::DOT_NOT_CRLF) {
            set.remove(b'\r');
            set.remove(b'\n');
        }
        set
    }
}

enum Escaped {
    Byte(u8),
    Class(ByteSet),
}

fn digit_set() -> ByteSet {
    ByteSet::from_range(b'0', b'9')
}

fn word_set() -> ByteSet {
    let mut set = ByteSet::from_range(b'a', b'z');
    set.insert_range(b'A', b'Z');
    set.insert_range(b'0', b'9');
    set.insert(b'_');
    set
}

fn space_set() -> ByteSet {
    ByteSet::from_bytes(b" \t\n\r\x0c\x0b")
}

fn posix_class(name: &str) -> Option<ByteSet> {
    let mut set = ByteSet::empty();
    match name {
        "alpha" => { set.insert_range(b'a', b'z'); set.insert_range(b'A', b'Z'); }
        "digit" => set = digit_set(),
        "alnum" => { set = word_set(); set.remove(b'_'); }
        "upper" => set.insert_range(b'A', b'Z'),
        "lower" => set.insert_range(b'a', b'z'),
        "space" => set = space_set(),
        "blank" => set = ByteSet::from_bytes(b" \t"),
        "punct" => {
            set.insert_range(b'!', b'/');
            set.insert_range(b':', b'@');
            set.insert_range(b'[', b'`');
            set.insert_range(b'{', b'~');
        }
        "xdigit" => { set = digit_set(); set.insert_range(b'a', b'f'); set.insert_range(b'A', b'F'); }
        "cntrl" => { set.insert_range(0, 0x1f); set.insert(0x7f); }
        "print" => set.insert_range(0x20, 0x7e),
        "graph" => set.insert_range(0x21, 0x7e),
        _ => return None,
    }
    Some(set)
}

struct Scanner<'p, 'm> {
    parser: &'p RegexParser<'m>,
    pattern: &'p [u8],
    pos: usize,
    /// top-level pattern, where the anchors are allowed
    top: bool,
    /// macros being expanded
    active: Vec<String>,
}

impl Scanner<'_, '_> {
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.pattern.get(self.pos + offset).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn error(&self, kind: PatternErrorKind) -> PatternError {
        PatternError::new(self.pos, kind)
    }

    fn error_at(&self, pos: usize, kind: PatternErrorKind) -> PatternError {
        PatternError::new(pos, kind)
    }

    fn parse_pattern(&mut self) -> Result<Regex, PatternError> {
        let bol = self.top && self.eat(b'^');
        let node = self.parse_alt(0)?;
        let eol = self.top && self.eat(b'$');
        match self.peek() {
            None => Ok(Regex { node, bol, eol }),
            Some(b')') => Err(self.error(PatternErrorKind::UnbalancedParen)),
            Some(b) => Err(self.error(PatternErrorKind::MisplacedAnchor(b as char))),
        }
    }

    fn parse_alt(&mut self, depth: u32) -> Result<ReNode, PatternError> {
        let mut alts = vec![self.parse_concat(depth)?];
        while self.eat(b'|') {
            alts.push(self.parse_concat(depth)?);
        }
        Ok(ReNode::or(alts))
    }

    fn parse_concat(&mut self, depth: u32) -> Result<ReNode, PatternError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'|') => break,
                Some(b')') if depth > 0 => break,
                Some(b')') => return Err(self.error(PatternErrorKind::UnbalancedParen)),
                Some(b'$') => {
                    if self.top && depth == 0 && self.pos + 1 == self.pattern.len() {
                        break;
                    }
                    return Err(self.error(PatternErrorKind::MisplacedAnchor('$')));
                }
                Some(_) => items.push(self.parse_repeat(depth)?),
            }
        }
        Ok(ReNode::concat(items))
    }

    fn parse_repeat(&mut self, depth: u32) -> Result<ReNode, PatternError> {
        let mut node = self.parse_atom(depth)?;
        loop {
            let (min, max) = match self.peek() {
                Some(b'*') => { self.pos += 1; (0, None) }
                Some(b'+') => { self.pos += 1; (1, None) }
                Some(b'?') => { self.pos += 1; (0, Some(1)) }
                Some(b'{') if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => self.parse_bounds()?,
                _ => break,
            };
            if self.peek() == Some(b'?') {
                return Err(self.error(PatternErrorKind::LazyQuantifier));
            }
            node = ReNode::Repeat(Box::new(node), min, max);
        }
        Ok(node)
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.pattern[start..self.pos]).ok()?.parse().ok()
    }

    /// Parses `{m}`, `{m,}` or `{m,n}`.
    fn parse_bounds(&mut self) -> Result<(u32, Option<u32>), PatternError> {
        let start = self.pos;
        self.pos += 1;
        let invalid = |s: &Self| s.error_at(start, PatternErrorKind::InvalidQuantifier);
        let min = self.parse_number().ok_or_else(|| invalid(self))?;
        let max = if self.eat(b',') {
            if self.peek() == Some(b'}') { None } else { Some(self.parse_number().ok_or_else(|| invalid(self))?) }
        } else {
            Some(min)
        };
        if !self.eat(b'}') || max.is_some_and(|max| max < min || max > MAX_REPEAT) || min > MAX_REPEAT {
            return Err(invalid(self));
        }
        Ok((min, max))
    }

    fn parse_atom(&mut self, depth: u32) -> Result<ReNode, PatternError> {
        let start = self.pos;
        let Some(b) = self.next_byte() else {
            return Err(self.error(PatternErrorKind::EmptyPattern));
        };
        match b {
            b'(' => {
                if self.peek() == Some(b'?') && self.peek_at(1) == Some(b':') {
                    self.pos += 2;
                }
                let node = self.parse_alt(depth + 1)?;
                if !self.eat(b')') {
                    return Err(self.error_at(start, PatternErrorKind::UnbalancedParen));
                }
                Ok(node)
            }
            b'[' => self.parse_class(start).map(ReNode::Set),
            b'.' => Ok(ReNode::Set(self.parser.dot())),
            b'"' => self.parse_string(start),
            b'\\' => match self.parse_escape()? {
                Escaped::Byte(b) => Ok(ReNode::Set(self.parser.literal(b))),
                Escaped::Class(set) => Ok(ReNode::Set(set)),
            },
            b'{' => self.parse_macro_ref(start),
            b'*' | b'+' | b'?' => Err(self.error_at(start, PatternErrorKind::NothingToRepeat)),
            b'^' | b'$' => Err(self.error_at(start, PatternErrorKind::MisplacedAnchor(b as char))),
            _ => Ok(ReNode::Set(self.parser.literal(b))),
        }
    }

    /// Parses the escape sequence following a backslash.
    fn parse_escape(&mut self) -> Result<Escaped, PatternError> {
        let start = self.pos - 1;
        let Some(b) = self.next_byte() else {
            return Err(self.error_at(start, PatternErrorKind::TrailingBackslash));
        };
        let escaped = match b {
            b'n' => Escaped::Byte(b'\n'),
            b'r' => Escaped::Byte(b'\r'),
            b't' => Escaped::Byte(b'\t'),
            b'f' => Escaped::Byte(0x0c),
            b'v' => Escaped::Byte(0x0b),
            b'a' => Escaped::Byte(0x07),
            b'e' => Escaped::Byte(0x1b),
            b'0' => Escaped::Byte(0),
            b'x' => {
                let mut value = 0_u32;
                let mut n = 0;
                while n < 2 {
                    match self.peek().and_then(|h| (h as char).to_digit(16)) {
                        Some(d) => { value = value * 16 + d; self.pos += 1; n += 1; }
                        None => break,
                    }
                }
                if n == 0 {
                    return Err(self.error_at(start, PatternErrorKind::InvalidHex));
                }
                Escaped::Byte(value as u8)
            }
            b'd' => Escaped::Class(digit_set()),
            b'D' => Escaped::Class(digit_set().not()),
            b'w' => Escaped::Class(word_set()),
            b'W' => Escaped::Class(word_set().not()),
            b's' => Escaped::Class(space_set()),
            b'S' => Escaped::Class(space_set().not()),
            _ if b.is_ascii_alphanumeric() => return Err(self.error_at(start, PatternErrorKind::InvalidEscape(b as char))),
            _ => Escaped::Byte(b),
        };
        Ok(escaped)
    }

    /// Parses a class; the opening bracket at `start` has already been consumed.
    fn parse_class(&mut self, start: usize) -> Result<ByteSet, PatternError> {
        let negated = self.eat(b'^');
        let mut set = ByteSet::empty();
        let mut first = true;
        loop {
            let item_pos = self.pos;
            let Some(b) = self.next_byte() else {
                return Err(self.error_at(start, PatternErrorKind::UnclosedClass));
            };
            let item = match b {
                b']' if !first => break,
                b'\\' => self.parse_escape()?,
                b'[' if self.peek() == Some(b':') => Escaped::Class(self.parse_posix_class(item_pos)?),
                _ if !b.is_ascii() => return Err(self.error_at(item_pos, PatternErrorKind::NonAsciiInClass)),
                _ => Escaped::Byte(b),
            };
            first = false;
            match item {
                Escaped::Class(class) => set.union(&class),
                Escaped::Byte(low) => {
                    if self.peek() == Some(b'-') && self.peek_at(1).is_some_and(|b| b != b']') {
                        self.pos += 1;
                        let high_pos = self.pos;
                        let high = match self.next_byte() {
                            Some(b'\\') => self.parse_escape()?,
                            Some(b) if !b.is_ascii() => return Err(self.error_at(high_pos, PatternErrorKind::NonAsciiInClass)),
                            Some(b) => Escaped::Byte(b),
                            None => return Err(self.error_at(start, PatternErrorKind::UnclosedClass)),
                        };
                        match high {
                            Escaped::Byte(high) if low <= high => set.insert_range(low, high),
                            Escaped::Byte(high) => return Err(self.error_at(item_pos, PatternErrorKind::InvalidRange(low as char, high as char))),
                            Escaped::Class(_) => return Err(self.error_at(item_pos, PatternErrorKind::InvalidRange(low as char, low as char))),
                        }
                    } else {
                        set.insert(low);
                    }
                }
            }
        }
        if self.parser.flags.contains(LexFlags::ICASE) {
            set.add_ascii_case();
        }
        if negated {
            set = set.not();
        }
        if set.is_empty() {
            return Err(self.error_at(start, PatternErrorKind::EmptyClass));
        }
        Ok(set)
    }

    /// Parses `[:name:]`; the opening bracket at `start` has already been consumed.
    fn parse_posix_class(&mut self, start: usize) -> Result<ByteSet, PatternError> {
        self.pos += 1;
        let name_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(&self.pattern[name_start..self.pos]).to_string();
        if !(self.eat(b':') && self.eat(b']')) {
            return Err(self.error_at(start, PatternErrorKind::UnclosedClass));
        }
        posix_class(&name).ok_or_else(|| self.error_at(start, PatternErrorKind::UnknownPosixClass(name)))
    }

    /// Parses a quoted string; the opening quote at `start` has already been consumed.
    fn parse_string(&mut self, start: usize) -> Result<ReNode, PatternError> {
        let mut items = Vec::new();
        loop {
            match self.next_byte() {
                None => return Err(self.error_at(start, PatternErrorKind::UnterminatedString)),
                Some(b'"') => break,
                Some(b'\\') => {
                    let esc_pos = self.pos - 1;
                    match self.parse_escape()? {
                        Escaped::Byte(b) => items.push(ReNode::Set(self.parser.literal(b))),
                        Escaped::Class(_) => {
                            let c = self.pattern[self.pos - 1] as char;
                            return Err(self.error_at(esc_pos, PatternErrorKind::InvalidEscape(c)));
                        }
                    }
                }
                Some(b) => items.push(ReNode::Set(self.parser.literal(b))),
            }
        }
        Ok(ReNode::concat(items))
    }

    /// Parses `{NAME}`; the opening brace at `start` has already been consumed.
    fn parse_macro_ref(&mut self, start: usize) -> Result<ReNode, PatternError> {
        if !self.peek().is_some_and(|b| b.is_ascii_alphabetic() || b == b'_') {
            return Err(self.error_at(start, PatternErrorKind::NothingToRepeat));
        }
        let name_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(&self.pattern[name_start..self.pos]).to_string();
        if !self.eat(b'}') {
            return Err(self.error_at(start, PatternErrorKind::UnclosedMacro));
        }
        self.parser.parse_macro(&name, &self.active).map_err(|kind| self.error_at(start, kind))
    }
}
