//! The fixed mail schema.
//!
//! [`SCHEMA`] is the single description of every field: how its value is
//! analyzed, whether it is kept retrievable, and whether results can be
//! sorted on it. Document building, query parsing, sorting and faceting all
//! read it.

use serde::{Deserialize, Serialize};

use super::analysis;

/// A field of the mail document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Ident,
    Sender,
    To,
    Cc,
    Bcc,
    Subject,
    Date,
    Body,
    Tag,
    Flags,
    Raw,
}

/// How a field's value becomes terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The whole value is one term, case preserved.
    Id,
    /// Comma-separated terms, trimmed, case preserved.
    Keyword,
    /// Analyzed words (see [`analysis::text_terms`]).
    Text,
    /// Unsigned integer, matched by its decimal form.
    Numeric,
}

/// Static description of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub field: Field,
    pub name: &'static str,
    pub kind: FieldKind,
    /// Original value retrievable from search results.
    pub stored: bool,
    /// Usable as a sort key.
    pub sortable: bool,
    /// Only one live document may hold a given value.
    pub unique: bool,
}

const fn desc(
    field: Field,
    name: &'static str,
    kind: FieldKind,
    stored: bool,
    sortable: bool,
    unique: bool,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        name,
        kind,
        stored,
        sortable,
        unique,
    }
}

/// Every field of the mail index. All fields are indexed.
pub const SCHEMA: [FieldDescriptor; 11] = [
    desc(Field::Ident, "ident", FieldKind::Id, true, false, true),
    desc(Field::Sender, "sender", FieldKind::Id, false, false, false),
    desc(Field::To, "to", FieldKind::Keyword, false, false, false),
    desc(Field::Cc, "cc", FieldKind::Keyword, false, false, false),
    desc(Field::Bcc, "bcc", FieldKind::Keyword, false, false, false),
    desc(Field::Subject, "subject", FieldKind::Text, false, false, false),
    desc(Field::Date, "date", FieldKind::Numeric, false, true, false),
    desc(Field::Body, "body", FieldKind::Text, false, false, false),
    desc(Field::Tag, "tag", FieldKind::Keyword, true, false, false),
    desc(Field::Flags, "flags", FieldKind::Keyword, true, false, false),
    desc(Field::Raw, "raw", FieldKind::Text, false, false, false),
];

/// Fields searched by unqualified query terms.
pub const DEFAULT_SEARCH_FIELDS: [Field; 2] = [Field::Raw, Field::Body];

impl Field {
    /// Look a field up by its query name (`tag`, `raw`, ...).
    pub fn from_name(name: &str) -> Option<Field> {
        SCHEMA.iter().find(|d| d.name == name).map(|d| d.field)
    }

    pub fn descriptor(self) -> &'static FieldDescriptor {
        SCHEMA
            .iter()
            .find(|d| d.field == self)
            .expect("every field has a schema entry")
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn kind(self) -> FieldKind {
        self.descriptor().kind
    }

    /// Analyze a document value of this field into index terms.
    pub fn terms(self, value: &str) -> Vec<String> {
        match self.kind() {
            FieldKind::Id | FieldKind::Numeric => {
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![value.to_string()]
                }
            }
            FieldKind::Keyword => analysis::keyword_terms(value),
            FieldKind::Text => analysis::text_terms(value),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_every_field_once() {
        for d in &SCHEMA {
            assert_eq!(SCHEMA.iter().filter(|o| o.field == d.field).count(), 1);
            assert_eq!(Field::from_name(d.name), Some(d.field));
        }
    }

    #[test]
    fn test_stored_and_sortable_fields() {
        let stored: Vec<&str> = SCHEMA.iter().filter(|d| d.stored).map(|d| d.name).collect();
        assert_eq!(stored, vec!["ident", "tag", "flags"]);
        let sortable: Vec<&str> = SCHEMA.iter().filter(|d| d.sortable).map(|d| d.name).collect();
        assert_eq!(sortable, vec!["date"]);
        assert!(Field::Ident.descriptor().unique);
    }

    #[test]
    fn test_unknown_field_name() {
        assert_eq!(Field::from_name("in"), None);
        assert_eq!(Field::from_name("Tag"), None);
    }

    #[test]
    fn test_terms_by_kind() {
        assert_eq!(Field::Ident.terms("Msg-1"), vec!["Msg-1"]);
        assert_eq!(Field::Tag.terms("inbox,Work"), vec!["inbox", "Work"]);
        assert_eq!(Field::Body.terms("Hello World"), vec!["hello", "world"]);
        assert!(Field::Sender.terms("").is_empty());
    }
}
