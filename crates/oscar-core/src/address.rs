//! Address validation and pattern matching
//!
//! OSC addresses look like this:
//! ```text
//! /synth/1/freq
//! /mixer/channel/3/gain
//! ```
//!
//! Patterns (used only when registering methods) add wildcards:
//! - `?` matches exactly one character
//! - `*` matches zero or more characters
//! - `[abc]`, `[a-z]`, `[!abc]` match one character from a class
//! - `{foo,bar}` matches one of the listed strings
//!
//! A literal address may not contain any of the characters that carry
//! meaning in a pattern. Both validators share the same lexer, so the two
//! grammars never disagree about which characters are special.

use crate::{Error, Result};

/// Characters that may not appear in a literal address
pub const RESERVED: [char; 9] = [' ', '#', '*', ',', '?', '[', ']', '{', '}'];

/// One lexed character of an address or pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Plain(char),
    Reserved(char),
}

fn lex(s: &str) -> impl Iterator<Item = (usize, Lexeme)> + '_ {
    s.char_indices().map(|(i, c)| {
        let lexeme = if RESERVED.contains(&c) {
            Lexeme::Reserved(c)
        } else {
            Lexeme::Plain(c)
        };
        (i, lexeme)
    })
}

fn check_leading_slash(s: &str) -> Result<()> {
    if !s.starts_with('/') {
        return Err(Error::InvalidAddress(format!(
            "address must start with '/': {s:?}"
        )));
    }
    Ok(())
}

/// Validate a literal (non-pattern) address
pub fn validate_address(s: &str) -> Result<()> {
    check_leading_slash(s)?;
    if let Some((i, Lexeme::Reserved(c))) = lex(s).find(|(_, l)| matches!(l, Lexeme::Reserved(_))) {
        return Err(Error::InvalidAddress(format!(
            "reserved character {c:?} at offset {i} in {s:?}"
        )));
    }
    Ok(())
}

// ============================================================================
// PATTERNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    AnyChar,
    AnyRun,
    Class { negated: bool, items: Vec<ClassItem> },
    Alternation(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

fn invalid(pattern: &str, what: &str) -> Error {
    Error::InvalidAddress(format!("{what} in pattern {pattern:?}"))
}

fn parse_pattern(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut lexemes = lex(pattern).map(|(_, l)| l);

    while let Some(lexeme) = lexemes.next() {
        let token = match lexeme {
            Lexeme::Plain(c) | Lexeme::Reserved(c @ ',') => {
                literal.push(c);
                continue;
            }
            Lexeme::Reserved('?') => Token::AnyChar,
            Lexeme::Reserved('*') => Token::AnyRun,
            Lexeme::Reserved('[') => parse_class(pattern, &mut lexemes)?,
            Lexeme::Reserved('{') => parse_alternation(pattern, &mut lexemes)?,
            Lexeme::Reserved(c) => {
                return Err(invalid(pattern, &format!("unexpected {c:?}")));
            }
        };
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        // Consecutive `*` collapse into one run.
        if token == Token::AnyRun && tokens.last() == Some(&Token::AnyRun) {
            continue;
        }
        tokens.push(token);
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn parse_class(pattern: &str, lexemes: &mut impl Iterator<Item = Lexeme>) -> Result<Token> {
    let mut chars = Vec::new();
    loop {
        match lexemes.next() {
            None => return Err(invalid(pattern, "unterminated '['")),
            Some(Lexeme::Reserved(']')) => break,
            Some(Lexeme::Reserved(c @ (' ' | '#'))) => {
                return Err(invalid(pattern, &format!("unexpected {c:?} in '[...]'")));
            }
            Some(Lexeme::Plain(c) | Lexeme::Reserved(c)) => chars.push(c),
        }
    }

    let negated = chars.first() == Some(&'!');
    let body = if negated { &chars[1..] } else { &chars[..] };
    if body.is_empty() {
        return Err(invalid(pattern, "empty '[...]'"));
    }

    let mut items = Vec::new();
    let mut i = 0;
    while i < body.len() {
        // `-` is a range only between two members; leading or trailing it is literal.
        if i + 2 < body.len() && body[i + 1] == '-' {
            let (lo, hi) = (body[i], body[i + 2]);
            if lo > hi {
                return Err(invalid(pattern, &format!("reversed range {lo}-{hi}")));
            }
            items.push(ClassItem::Range(lo, hi));
            i += 3;
        } else {
            items.push(ClassItem::Single(body[i]));
            i += 1;
        }
    }
    Ok(Token::Class { negated, items })
}

fn parse_alternation(pattern: &str, lexemes: &mut impl Iterator<Item = Lexeme>) -> Result<Token> {
    let mut alternatives = vec![String::new()];
    loop {
        match lexemes.next() {
            None => return Err(invalid(pattern, "unterminated '{'")),
            Some(Lexeme::Reserved('}')) => break,
            Some(Lexeme::Reserved(',')) => alternatives.push(String::new()),
            Some(Lexeme::Reserved(c)) => {
                return Err(invalid(pattern, &format!("unexpected {c:?} in '{{...}}'")));
            }
            Some(Lexeme::Plain(c)) => {
                if let Some(last) = alternatives.last_mut() {
                    last.push(c);
                }
            }
        }
    }
    Ok(Token::Alternation(alternatives))
}

/// Escape a character for use inside a regex bracket class
fn push_class_char(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}

fn to_regex(tokens: &[Token]) -> String {
    let mut re = String::from("(?s)^");
    for token in tokens {
        match token {
            Token::Literal(s) => re.push_str(&regex_lite::escape(s)),
            Token::AnyChar => re.push('.'),
            Token::AnyRun => re.push_str(".*"),
            Token::Class { negated, items } => {
                re.push('[');
                if *negated {
                    re.push('^');
                }
                for item in items {
                    match *item {
                        ClassItem::Single(c) => push_class_char(&mut re, c),
                        ClassItem::Range(lo, hi) => {
                            push_class_char(&mut re, lo);
                            re.push('-');
                            push_class_char(&mut re, hi);
                        }
                    }
                }
                re.push(']');
            }
            Token::Alternation(alts) => {
                re.push_str("(?:");
                let escaped: Vec<String> = alts.iter().map(|a| regex_lite::escape(a)).collect();
                re.push_str(&escaped.join("|"));
                re.push(')');
            }
        }
    }
    re.push('$');
    re
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Regex(regex_lite::Regex),
}

/// A compiled address pattern
///
/// Only constructible from a syntactically valid pattern. Matching is pure
/// string matching: `*` is free to cross `/`.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: Matcher,
}

impl Pattern {
    /// Compile a pattern string
    pub fn compile(s: &str) -> Result<Self> {
        check_leading_slash(s)?;
        let tokens = parse_pattern(s)?;

        let matcher = match tokens.as_slice() {
            [] | [Token::Literal(_)] => Matcher::Exact,
            _ => {
                let regex_str = to_regex(&tokens);
                Matcher::Regex(
                    regex_lite::Regex::new(&regex_str)
                        .map_err(|e| Error::InvalidAddress(e.to_string()))?,
                )
            }
        };

        Ok(Self {
            raw: s.to_string(),
            matcher,
        })
    }

    /// Check if an address matches this pattern
    pub fn matches(&self, addr: &str) -> bool {
        match &self.matcher {
            Matcher::Exact => addr == self.raw,
            Matcher::Regex(regex) => regex.is_match(addr),
        }
    }

    /// True when the pattern contains no wildcards
    pub fn is_literal(&self) -> bool {
        matches!(self.matcher, Matcher::Exact)
    }

    /// The source pattern string
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<&str> for Pattern {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Pattern::compile(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("/synth/1/freq").is_ok());
        assert!(validate_address("/").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("synth").is_err());
        for c in RESERVED {
            let addr = format!("/a{c}b");
            assert!(validate_address(&addr).is_err(), "{addr:?} should be rejected");
        }
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = Pattern::compile("/foo").unwrap();
        assert!(pattern.is_literal());
        assert!(pattern.matches("/foo"));
        assert!(!pattern.matches("/foo/bar"));
        assert!(!pattern.matches("/fo"));
    }

    #[test]
    fn test_lexer_classifies_reserved() {
        let lexemes: Vec<Lexeme> = lex("/a*").map(|(_, l)| l).collect();
        assert_eq!(
            lexemes,
            [Lexeme::Plain('/'), Lexeme::Plain('a'), Lexeme::Reserved('*')]
        );
    }

    #[test]
    fn test_consecutive_stars_collapse() {
        let tokens = parse_pattern("/a**b").unwrap();
        assert_eq!(
            tokens,
            [
                Token::Literal("/a".into()),
                Token::AnyRun,
                Token::Literal("b".into())
            ]
        );
    }

    #[test]
    fn test_class_parsing() {
        let tokens = parse_pattern("/[!a-c-]").unwrap();
        assert_eq!(
            tokens[1],
            Token::Class {
                negated: true,
                items: vec![ClassItem::Range('a', 'c'), ClassItem::Single('-')],
            }
        );
    }

    #[test]
    fn test_regex_escapes_literals() {
        let pattern = Pattern::compile("/a.b/*").unwrap();
        assert!(pattern.matches("/a.b/x"));
        assert!(!pattern.matches("/axb/x"));
    }
}
