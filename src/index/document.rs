//! Conversion of a [`Mail`] into the document stored in the index.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::model::mail::Mail;

use super::analysis::unique;
use super::schema::{Field, SCHEMA};

/// Flattened field values of one mail, before analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedMail {
    pub ident: String,
    pub sender: String,
    /// Comma-joined recipients.
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    /// Milliseconds since the Unix epoch.
    pub date: u64,
    pub body: String,
    /// Comma-joined unique tags, always including the lowercase mailbox name.
    pub tag: String,
    /// Comma-joined unique flags.
    pub flags: String,
    pub raw: String,
}

/// A document as held by the index: stored values plus indexed terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDoc {
    pub ident: String,
    /// Values of sortable fields.
    pub sort_keys: BTreeMap<Field, u64>,
    /// Original values of stored fields.
    pub stored: BTreeMap<Field, String>,
    /// Unique terms of every indexed field, in first-occurrence order.
    pub terms: BTreeMap<Field, Vec<String>>,
}

impl StoredDoc {
    /// Terms indexed for `field` (empty if none).
    pub fn field_terms(&self, field: Field) -> &[String] {
        self.terms.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sort key of `field`; 0 when the field is not sortable or empty.
    pub fn sort_key(&self, field: Field) -> u64 {
        self.sort_keys.get(&field).copied().unwrap_or(0)
    }
}

impl IndexedMail {
    /// Flatten a mail into index values.
    ///
    /// Fails on an empty ident or an unparseable `Date:` header.
    pub fn from_mail(mail: &Mail) -> Result<Self> {
        if mail.ident.trim().is_empty() {
            return Err(SearchError::InvalidMail {
                ident: mail.ident.clone(),
                reason: "empty ident".to_string(),
            });
        }

        let headers = &mail.headers;
        let date = match headers.date.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(value) => parse_date_millis(value).ok_or_else(|| SearchError::InvalidMail {
                ident: mail.ident.clone(),
                reason: format!("unparseable date '{value}'"),
            })?,
        };

        let mut tags: Vec<String> = mail.tags.clone();
        tags.push(mail.mailbox_name.to_lowercase());
        let tags: Vec<String> = unique(&tags).into_iter().filter(|t| !t.is_empty()).collect();

        Ok(Self {
            ident: mail.ident.clone(),
            sender: headers.from.clone(),
            to: headers.to.join(","),
            cc: headers.cc.join(","),
            bcc: headers.bcc.join(","),
            subject: headers.subject.clone(),
            date,
            body: mail.text_plain_body.clone(),
            tag: tags.join(","),
            flags: unique(&mail.flags).join(","),
            raw: mail.raw.clone(),
        })
    }

    /// The value of `field` as text.
    pub fn value(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Ident => Cow::Borrowed(&self.ident),
            Field::Sender => Cow::Borrowed(&self.sender),
            Field::To => Cow::Borrowed(&self.to),
            Field::Cc => Cow::Borrowed(&self.cc),
            Field::Bcc => Cow::Borrowed(&self.bcc),
            Field::Subject => Cow::Borrowed(&self.subject),
            Field::Date => Cow::Owned(self.date.to_string()),
            Field::Body => Cow::Borrowed(&self.body),
            Field::Tag => Cow::Borrowed(&self.tag),
            Field::Flags => Cow::Borrowed(&self.flags),
            Field::Raw => Cow::Borrowed(&self.raw),
        }
    }

    /// Analyze every schema field into a [`StoredDoc`].
    pub fn to_document(&self) -> StoredDoc {
        let mut sort_keys = BTreeMap::new();
        let mut stored = BTreeMap::new();
        let mut terms = BTreeMap::new();
        for desc in &SCHEMA {
            let value = self.value(desc.field);
            if desc.sortable {
                if let Ok(key) = value.parse::<u64>() {
                    sort_keys.insert(desc.field, key);
                }
            }
            if desc.stored {
                stored.insert(desc.field, value.to_string());
            }
            let field_terms = unique(&desc.field.terms(&value));
            if !field_terms.is_empty() {
                terms.insert(desc.field, field_terms);
            }
        }
        StoredDoc {
            ident: self.ident.clone(),
            sort_keys,
            stored,
            terms,
        }
    }
}

/// Parse a `Date:` header (RFC 2822 or RFC 3339) or a bare millisecond
/// count into milliseconds since the epoch. Dates before 1970 are rejected.
pub fn parse_date_millis(value: &str) -> Option<u64> {
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok();
    }
    let parsed = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?;
    u64::try_from(parsed.timestamp_millis()).ok()
}
