//! Read sessions over a committed snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;

use super::query::{wildcard_regex, Query};
use super::schema::Field;
use super::snapshot::{DocNum, DocSet, Snapshot};

/// A read-only view of one committed generation.
///
/// Cheap to create and independent of writers: a searcher keeps seeing the
/// generation it was opened on even while commits happen.
#[derive(Debug, Clone)]
pub struct Searcher {
    snapshot: Arc<Snapshot>,
}

impl Searcher {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    pub fn doc_count(&self) -> usize {
        self.snapshot.doc_count()
    }

    /// Documents matching `query`.
    pub fn matching(&self, query: &Query) -> Result<DocSet> {
        let snap = &self.snapshot;
        Ok(match query {
            Query::Every => snap.all_docs(),
            Query::Null => DocSet::new(),
            Query::Term { field, text } => snap.postings(*field, text).cloned().unwrap_or_default(),
            Query::Wildcard { field, pattern } => {
                let re = wildcard_regex(pattern)?;
                let mut docs = DocSet::new();
                for (_, postings) in snap.field_terms(*field).filter(|(t, _)| re.is_match(t)) {
                    docs.extend(postings);
                }
                docs
            }
            Query::And(children) => {
                let mut required: Option<DocSet> = None;
                let mut excluded = DocSet::new();
                for child in children {
                    if let Query::Not(inner) = child {
                        excluded.extend(self.matching(inner)?);
                        continue;
                    }
                    let docs = self.matching(child)?;
                    required = Some(match required {
                        Some(acc) => acc.intersection(&docs).copied().collect(),
                        None => docs,
                    });
                    if required.as_ref().is_some_and(DocSet::is_empty) {
                        return Ok(DocSet::new());
                    }
                }
                let mut docs = required.unwrap_or_else(|| snap.all_docs());
                docs.retain(|d| !excluded.contains(d));
                docs
            }
            Query::Or(children) => {
                let mut docs = DocSet::new();
                for child in children {
                    docs.extend(self.matching(child)?);
                }
                docs
            }
            Query::Not(inner) => {
                let excluded = self.matching(inner)?;
                snap.all_docs()
                    .into_iter()
                    .filter(|d| !excluded.contains(d))
                    .collect()
            }
        })
    }

    /// Documents matching `query` and not matching `mask`.
    pub fn matching_masked(&self, query: &Query, mask: &Query) -> Result<DocSet> {
        let mut docs = self.matching(query)?;
        let masked = self.matching(mask)?;
        docs.retain(|d| !masked.contains(d));
        Ok(docs)
    }

    /// Order documents by the sortable `field`, highest first. Equal keys
    /// keep the later-indexed document first.
    pub fn sort_desc(&self, docs: &DocSet, field: Field) -> Vec<DocNum> {
        debug_assert!(field.descriptor().sortable, "{field} is not sortable");
        let mut ordered: Vec<(u64, DocNum)> = docs
            .iter()
            .filter_map(|&num| self.snapshot.doc(num).map(|d| (d.sort_key(field), num)))
            .collect();
        ordered.sort_by(|a, b| b.cmp(a));
        ordered.into_iter().map(|(_, num)| num).collect()
    }

    /// Stored idents of `docs`, in the given order.
    pub fn idents(&self, docs: &[DocNum]) -> Vec<String> {
        docs.iter()
            .filter_map(|&num| self.snapshot.doc(num))
            .map(|d| d.ident.clone())
            .collect()
    }

    /// Count `docs` per distinct value of `field`. A document holding
    /// several values counts once toward each of them.
    pub fn group_counts(&self, docs: &DocSet, field: Field) -> BTreeMap<String, usize> {
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs.iter().filter_map(|&num| self.snapshot.doc(num)) {
            for value in doc.field_terms(field) {
                *groups.entry(value.clone()).or_default() += 1;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::IndexedMail;
    use crate::model::mail::{Mail, MailHeaders};

    fn searcher(mails: &[Mail]) -> Searcher {
        let mut snap = Snapshot::default();
        for mail in mails {
            snap.upsert(IndexedMail::from_mail(mail).unwrap().to_document());
        }
        Searcher::new(Arc::new(snap))
    }

    fn mail(ident: &str, date_ms: u64, tags: &[&str], body: &str) -> Mail {
        let mut m = Mail::new(ident, "INBOX")
            .with_tags(tags.iter().copied())
            .with_body(body);
        m.headers.date = Some(date_ms.to_string());
        m
    }

    fn idents_of(s: &Searcher, docs: &DocSet) -> Vec<String> {
        s.idents(&s.sort_desc(docs, Field::Date))
    }

    #[test]
    fn test_and_with_negation() {
        let s = searcher(&[
            mail("a", 1, &["trash"], "urgent reply"),
            mail("b", 2, &[], "urgent meeting"),
        ]);
        let q = Query::And(vec![
            Query::term(Field::Body, "urgent"),
            Query::term(Field::Tag, "trash").negate(),
        ]);
        assert_eq!(idents_of(&s, &s.matching(&q).unwrap()), vec!["b"]);
    }

    #[test]
    fn test_negation_only_and_starts_from_all() {
        let s = searcher(&[mail("a", 1, &["trash"], "x1"), mail("b", 2, &[], "x2")]);
        let q = Query::And(vec![Query::term(Field::Tag, "trash").negate()]);
        assert_eq!(idents_of(&s, &s.matching(&q).unwrap()), vec!["b"]);
    }

    #[test]
    fn test_wildcard_over_keyword_values() {
        let mut first = mail("a", 1, &[], "x1");
        first.headers = MailHeaders {
            to: vec!["ann@example.com".into(), "zed@other.org".into()],
            date: Some("1".into()),
            ..MailHeaders::default()
        };
        let s = searcher(&[first, mail("b", 2, &[], "x2")]);
        let docs = s
            .matching(&Query::wildcard(Field::To, "*example.com*"))
            .unwrap();
        assert_eq!(idents_of(&s, &docs), vec!["a"]);

        let groups = s.group_counts(&docs, Field::To);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["ann@example.com", "zed@other.org"]);
    }

    #[test]
    fn test_sort_newest_first() {
        let s = searcher(&[
            mail("old", 10, &[], "x1"),
            mail("new", 30, &[], "x1"),
            mail("mid", 20, &[], "x1"),
        ]);
        let docs = s.matching(&Query::Every).unwrap();
        assert_eq!(idents_of(&s, &docs), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_group_counts_overlap() {
        let s = searcher(&[
            mail("a", 1, &[], "x1"),
            mail("b", 2, &["sent"], "x1"),
        ]);
        let all = s.matching(&Query::Every).unwrap();
        let groups = s.group_counts(&all, Field::Tag);
        assert_eq!(groups.get("inbox"), Some(&2));
        assert_eq!(groups.get("sent"), Some(&1));
    }

    #[test]
    fn test_masked() {
        let s = searcher(&[mail("a", 1, &["drafts"], "x1"), mail("b", 2, &[], "x1")]);
        let docs = s
            .matching_masked(&Query::Every, &Query::term(Field::Tag, "drafts"))
            .unwrap();
        assert_eq!(idents_of(&s, &docs), vec!["b"]);
    }

    #[test]
    fn test_null_matches_nothing() {
        let s = searcher(&[mail("a", 1, &[], "x1")]);
        assert!(s.matching(&Query::Null).unwrap().is_empty());
    }
}
