//! Address completion from previous correspondence.

use tracing::debug;

use crate::error::Result;
use crate::index::{Field, Query, Searcher};

/// Recipient fields searched for contacts, in output order.
const CONTACT_FIELDS: [Field; 3] = [Field::To, Field::Cc, Field::Bcc];

/// Tags whose mails never contribute contacts.
const MASKED_TAGS: [&str; 2] = ["drafts", "trash"];

/// Addresses from `to`, `cc` and `bcc` of mails where that field contains
/// `filter`. Mails tagged drafts or trash are ignored.
///
/// Each field contributes the distinct addresses of its matching mails in
/// sorted order; an address found in several fields is listed once per
/// field. An empty filter returns nothing.
pub fn contacts(searcher: &Searcher, filter: &str) -> Result<Vec<String>> {
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let mask = Query::Or(
        MASKED_TAGS
            .iter()
            .map(|tag| Query::term(Field::Tag, *tag))
            .collect(),
    );
    let pattern = format!("*{filter}*");

    let mut found = Vec::new();
    for field in CONTACT_FIELDS {
        let docs = searcher.matching_masked(&Query::wildcard(field, pattern.as_str()), &mask)?;
        found.extend(searcher.group_counts(&docs, field).into_keys());
    }
    debug!(filter_len = filter.chars().count(), contacts = found.len(), "Contact search");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::index::document::IndexedMail;
    use crate::index::Snapshot;
    use crate::model::mail::{Mail, MailHeaders};

    fn mail(ident: &str, tags: &[&str], to: &[&str], cc: &[&str]) -> Mail {
        Mail::new(ident, "INBOX")
            .with_tags(tags.iter().copied())
            .with_headers(MailHeaders {
                to: to.iter().map(|s| s.to_string()).collect(),
                cc: cc.iter().map(|s| s.to_string()).collect(),
                ..MailHeaders::default()
            })
    }

    fn searcher(mails: &[Mail]) -> Searcher {
        let mut snap = Snapshot::default();
        for m in mails {
            snap.upsert(IndexedMail::from_mail(m).unwrap().to_document());
        }
        Searcher::new(Arc::new(snap))
    }

    #[test]
    fn test_empty_filter() {
        let s = searcher(&[mail("a", &[], &["x@example.com"], &[])]);
        assert!(contacts(&s, "").unwrap().is_empty());
    }

    #[test]
    fn test_masked_tags_excluded() {
        let s = searcher(&[
            mail("a", &[], &["ann@example.com"], &[]),
            mail("b", &["drafts"], &["draft@example.com"], &[]),
            mail("c", &["trash"], &[], &["gone@example.com"]),
        ]);
        assert_eq!(contacts(&s, "example.com").unwrap(), vec!["ann@example.com"]);
    }

    #[test]
    fn test_fields_flattened_without_dedup() {
        let s = searcher(&[
            mail("a", &[], &["bob@example.com"], &["ann@example.com"]),
            mail("b", &[], &["ann@example.com"], &[]),
        ]);
        assert_eq!(
            contacts(&s, "example").unwrap(),
            vec!["ann@example.com", "bob@example.com", "ann@example.com"]
        );
    }

    #[test]
    fn test_no_match() {
        let s = searcher(&[mail("a", &[], &["bob@example.com"], &[])]);
        assert!(contacts(&s, "nowhere.org").unwrap().is_empty());
    }
}
