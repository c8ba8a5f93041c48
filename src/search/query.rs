//! User query translation.
//!
//! Translation happens in two independent steps:
//!
//! 1. [`rewrite`] applies the client's shorthand rules as plain text
//!    substitutions, in order:
//!    - `"` is removed,
//!    - `-in:<tag>` becomes `AND NOT tag:<tag>`,
//!    - `in:all` becomes `*`.
//! 2. [`parse_query`] turns the rewritten text into a [`Query`].
//!
//! # Supported syntax
//!
//! - `word`: matches `raw` or `body` (analyzed like indexed text)
//! - `field:value`: e.g. `tag:work`, `sender:alice@example.com`, `subject:invoice`
//! - `rep*`, `field:*x*`: `*`/`?` wildcards; `*` alone matches everything
//! - `a b`: implicit AND; `a AND b`, `a OR b`, `NOT a`, `( ... )`
//!
//! Operators must be uppercase. A leading `AND`/`OR` is ignored, so
//! `AND NOT tag:trash` on its own is valid.

use crate::error::{Result, SearchError};
use crate::index::analysis::{keyword_terms, text_terms};
use crate::index::query::Query;
use crate::index::schema::{Field, FieldKind, DEFAULT_SEARCH_FIELDS};

/// Shorthand rewrite rules, applied in order.
pub const REWRITE_RULES: [(&str, &str); 3] = [
    ("\"", ""),
    ("-in:", "AND NOT tag:"),
    ("in:all", "*"),
];

/// Apply [`REWRITE_RULES`] to `text`.
pub fn rewrite(text: &str) -> String {
    apply_rules(text, &REWRITE_RULES)
}

/// Apply `(pattern, replacement)` rules in order, each over the output of
/// the previous one.
pub fn apply_rules(text: &str, rules: &[(&str, &str)]) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            acc.replace(pattern, replacement)
        })
}

/// Rewrite then parse a user query.
pub fn prepare_query(text: &str) -> Result<Query> {
    parse_query(&rewrite(text))
}

/// Parse a rewritten query. An empty query matches nothing.
pub fn parse_query(text: &str) -> Result<Query> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Ok(Query::Null);
    }
    let mut parser = Parser {
        source: text,
        tokens,
        pos: 0,
    };
    let query = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unbalanced parentheses"));
    }
    Ok(query.normalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Word(String),
}

/// Split on whitespace; parentheses are always tokens of their own.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        let word = std::mem::take(current);
        tokens.push(match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        });
    };

    for ch in input.chars() {
        match ch {
            '(' | ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(if ch == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, reason: &str) -> SearchError {
        SearchError::query(self.source, reason)
    }

    // A rewritten `-in:` leaves an `AND` right after another operator.
    fn skip_ands(&mut self) {
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
        }
    }

    // expr := [AND|OR]* conj (OR AND* conj)*
    fn expr(&mut self) -> Result<Query> {
        while matches!(self.peek(), Some(Token::And | Token::Or)) {
            self.pos += 1;
        }
        let mut alternatives = vec![self.conj()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            self.skip_ands();
            alternatives.push(self.conj()?);
        }
        Ok(Query::Or(alternatives))
    }

    // conj := unary ([AND+] unary)*
    fn conj(&mut self) -> Result<Query> {
        let mut parts = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.skip_ands();
                    parts.push(self.unary()?);
                }
                Some(Token::Word(_) | Token::Not | Token::Open) => parts.push(self.unary()?),
                _ => break,
            }
        }
        Ok(Query::And(parts))
    }

    // unary := NOT unary | '(' expr ')' | word
    fn unary(&mut self) -> Result<Query> {
        match self.next() {
            Some(Token::Not) => Ok(self.unary()?.negate()),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("unbalanced parentheses")),
                }
            }
            Some(Token::Word(word)) => self.word(&word),
            Some(Token::Close) => Err(self.error("unexpected ')'")),
            Some(Token::And | Token::Or) | None => Err(self.error("operator without operand")),
        }
    }

    fn word(&self, word: &str) -> Result<Query> {
        if word == "*" {
            return Ok(Query::Every);
        }
        if let Some((prefix, value)) = word.split_once(':') {
            if let Some(field) = Field::from_name(prefix) {
                if value.is_empty() {
                    return Err(self.error(&format!("empty value for field '{prefix}'")));
                }
                return Ok(field_query(field, value));
            }
        }
        Ok(Query::Or(
            DEFAULT_SEARCH_FIELDS
                .iter()
                .map(|&field| field_query(field, word))
                .collect(),
        ))
    }
}

/// Match `value` against one field, analyzing it the way the field's
/// documents were analyzed.
fn field_query(field: Field, value: &str) -> Query {
    let kind = field.kind();
    if value.contains(['*', '?']) {
        let pattern = match kind {
            FieldKind::Text => value.to_lowercase(),
            _ => value.to_string(),
        };
        return Query::wildcard(field, pattern);
    }
    let terms = match kind {
        FieldKind::Text => text_terms(value),
        FieldKind::Keyword => keyword_terms(value),
        FieldKind::Id | FieldKind::Numeric => vec![value.to_string()],
    };
    Query::And(terms.into_iter().map(|t| Query::term(field, t)).collect())
}
