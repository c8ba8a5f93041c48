//! Structured boolean queries over index fields.

use regex::Regex;

use crate::error::{Result, SearchError};

use super::schema::Field;

/// A query the [`Searcher`](super::reader::Searcher) can evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches every document.
    Every,
    /// Matches nothing.
    Null,
    /// Documents holding exactly `text` as a term of `field`.
    Term { field: Field, text: String },
    /// Documents holding a term of `field` matching a `*`/`?` pattern.
    Wildcard { field: Field, pattern: String },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    pub fn term(field: Field, text: impl Into<String>) -> Self {
        Query::Term {
            field,
            text: text.into(),
        }
    }

    pub fn wildcard(field: Field, pattern: impl Into<String>) -> Self {
        Query::Wildcard {
            field,
            pattern: pattern.into(),
        }
    }

    pub fn negate(self) -> Self {
        Query::Not(Box::new(self))
    }

    /// Number of term and wildcard leaves. Logs report this instead of the
    /// query text.
    pub fn leaf_count(&self) -> usize {
        match self {
            Query::Every | Query::Null => 0,
            Query::Term { .. } | Query::Wildcard { .. } => 1,
            Query::And(children) | Query::Or(children) => {
                children.iter().map(Query::leaf_count).sum()
            }
            Query::Not(inner) => inner.leaf_count(),
        }
    }

    /// Simplify: flatten nested `And`/`Or`, drop `Null` operands, collapse
    /// single-operand groups, and fold `Every` into its parent.
    pub fn normalize(self) -> Self {
        match self {
            Query::And(children) => {
                let mut flat = Vec::new();
                let mut saw_every = false;
                for child in children.into_iter().map(Query::normalize) {
                    match child {
                        Query::Null => {}
                        Query::Every => saw_every = true,
                        Query::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 if saw_every => Query::Every,
                    0 => Query::Null,
                    1 => flat.remove(0),
                    _ => Query::And(flat),
                }
            }
            Query::Or(children) => {
                let mut flat = Vec::new();
                for child in children.into_iter().map(Query::normalize) {
                    match child {
                        Query::Null => {}
                        Query::Every => return Query::Every,
                        Query::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Query::Null,
                    1 => flat.remove(0),
                    _ => Query::Or(flat),
                }
            }
            Query::Not(inner) => match inner.normalize() {
                Query::Null => Query::Null,
                Query::Not(double) => *double,
                other => Query::Not(Box::new(other)),
            },
            leaf => leaf,
        }
    }
}

/// Compile a `*`/`?` pattern into an anchored regex over a whole term.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                re.push_str(&regex::escape(&literal));
                literal.clear();
                re.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');
    Regex::new(&re).map_err(|e| SearchError::query(pattern, e.to_string()))
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Every => f.write_str("*"),
            Query::Null => f.write_str("<null>"),
            Query::Term { field, text } => write!(f, "{field}:{text}"),
            Query::Wildcard { field, pattern } => write!(f, "{field}:{pattern}"),
            Query::And(children) => write_group(f, children, " AND "),
            Query::Or(children) => write_group(f, children, " OR "),
            Query::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

fn write_group(f: &mut std::fmt::Formatter<'_>, children: &[Query], sep: &str) -> std::fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Query {
        Query::term(Field::Raw, text)
    }

    #[test]
    fn test_normalize_flattens_and_drops_null() {
        let q = Query::And(vec![
            raw("a"),
            Query::Null,
            Query::And(vec![raw("b"), Query::Every]),
        ]);
        assert_eq!(q.normalize(), Query::And(vec![raw("a"), raw("b")]));
    }

    #[test]
    fn test_normalize_all_null_and_matches_nothing() {
        assert_eq!(Query::And(vec![Query::Null, Query::Null]).normalize(), Query::Null);
        assert_eq!(Query::And(vec![Query::Every, Query::Null]).normalize(), Query::Every);
    }

    #[test]
    fn test_leaf_count() {
        let q = Query::And(vec![
            raw("a"),
            Query::Or(vec![raw("b"), Query::wildcard(Field::To, "*c*")]),
            raw("d").negate(),
            Query::Every,
        ]);
        assert_eq!(q.leaf_count(), 4);
        assert_eq!(Query::Null.leaf_count(), 0);
    }

    #[test]
    fn test_normalize_or_with_every() {
        assert_eq!(Query::Or(vec![raw("a"), Query::Every]).normalize(), Query::Every);
        assert_eq!(Query::Or(vec![Query::Null, raw("a")]).normalize(), raw("a"));
    }

    #[test]
    fn test_normalize_not() {
        assert_eq!(Query::Null.negate().normalize(), Query::Null);
        assert_eq!(raw("a").negate().negate().normalize(), raw("a"));
    }

    #[test]
    fn test_wildcard_regex() {
        let re = wildcard_regex("*@example.com*").unwrap();
        assert!(re.is_match("bob@example.com"));
        assert!(re.is_match("Bob <bob@example.com>"));
        assert!(!re.is_match("bob@example.org"));

        let re = wildcard_regex("rep?rt").unwrap();
        assert!(re.is_match("report"));
        assert!(!re.is_match("reports"));
    }

    #[test]
    fn test_wildcard_regex_escapes_metacharacters() {
        let re = wildcard_regex("a+b*").unwrap();
        assert!(re.is_match("a+bc"));
        assert!(!re.is_match("aab"));
    }

    #[test]
    fn test_display() {
        let q = Query::And(vec![
            Query::Or(vec![raw("x"), Query::term(Field::Body, "x")]),
            Query::term(Field::Tag, "trash").negate(),
        ]);
        assert_eq!(q.to_string(), "((raw:x OR body:x) AND NOT tag:trash)");
    }
}
