//! In-memory inverted index state.
//!
//! A [`Snapshot`] is one committed generation of the index. Readers share
//! it through an `Arc` and never see it change. A commit applies its
//! [`WriteOp`]s in place when no reader holds the previous generation, and
//! to a copy otherwise.
//!
//! Only documents are serialized; postings are rebuilt from their terms on
//! load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::document::StoredDoc;
use super::schema::{Field, SCHEMA};

/// Internal document number, never reused within an index.
pub type DocNum = u64;

/// A set of matching documents.
pub type DocSet = BTreeSet<DocNum>;

/// Term → postings for one field.
type TermPostings = BTreeMap<String, DocSet>;

/// A buffered index mutation, as applied in memory and written to the
/// commit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    Upsert(StoredDoc),
    Delete { field: Field, term: String },
}

/// One committed generation of the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    generation: u64,
    next_doc: DocNum,
    docs: BTreeMap<DocNum, StoredDoc>,
    #[serde(skip)]
    postings: BTreeMap<Field, TermPostings>,
}

impl Snapshot {
    /// Commit counter; 0 for a freshly created index.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn doc(&self, num: DocNum) -> Option<&StoredDoc> {
        self.docs.get(&num)
    }

    /// Every live document.
    pub fn all_docs(&self) -> DocSet {
        self.docs.keys().copied().collect()
    }

    /// Documents holding `term` in `field`.
    pub fn postings(&self, field: Field, term: &str) -> Option<&DocSet> {
        self.postings.get(&field).and_then(|terms| terms.get(term))
    }

    /// All distinct terms of `field` with their postings, in term order.
    pub fn field_terms(&self, field: Field) -> impl Iterator<Item = (&str, &DocSet)> {
        self.postings
            .get(&field)
            .into_iter()
            .flat_map(|terms| terms.iter().map(|(t, docs)| (t.as_str(), docs)))
    }

    /// Apply `ops` in order and advance to the next generation. Returns the
    /// number of documents deleted by explicit deletes.
    pub(crate) fn apply(&mut self, ops: Vec<WriteOp>) -> usize {
        let mut deleted = 0;
        for op in ops {
            match op {
                WriteOp::Upsert(doc) => {
                    self.upsert(doc);
                }
                WriteOp::Delete { field, term } => deleted += self.delete_term(field, &term),
            }
        }
        self.generation += 1;
        deleted
    }

    /// Recreate the postings from the stored per-document terms.
    pub(crate) fn rebuild_postings(&mut self) {
        self.postings.clear();
        for (&num, doc) in &self.docs {
            Self::post(&mut self.postings, num, doc);
        }
    }

    /// Add `doc`, first removing any live document that shares a value of a
    /// unique field with it. Returns the new document number.
    pub(crate) fn upsert(&mut self, doc: StoredDoc) -> DocNum {
        for desc in SCHEMA.iter().filter(|d| d.unique) {
            for term in doc.field_terms(desc.field).to_vec() {
                self.delete_term(desc.field, &term);
            }
        }

        let num = self.next_doc;
        self.next_doc += 1;
        Self::post(&mut self.postings, num, &doc);
        self.docs.insert(num, doc);
        num
    }

    fn post(postings: &mut BTreeMap<Field, TermPostings>, num: DocNum, doc: &StoredDoc) {
        for (field, terms) in &doc.terms {
            let field_postings = postings.entry(*field).or_default();
            for term in terms {
                field_postings.entry(term.clone()).or_default().insert(num);
            }
        }
    }

    /// Delete every document holding `term` in `field`. Returns how many
    /// were removed; zero is not an error.
    pub(crate) fn delete_term(&mut self, field: Field, term: &str) -> usize {
        let victims: Vec<DocNum> = match self.postings(field, term) {
            Some(docs) => docs.iter().copied().collect(),
            None => return 0,
        };
        for num in &victims {
            self.remove_doc(*num);
        }
        victims.len()
    }

    fn remove_doc(&mut self, num: DocNum) {
        let Some(doc) = self.docs.remove(&num) else {
            return;
        };
        for (field, terms) in &doc.terms {
            let Some(field_postings) = self.postings.get_mut(field) else {
                continue;
            };
            for term in terms {
                if let Some(docs) = field_postings.get_mut(term) {
                    docs.remove(&num);
                    if docs.is_empty() {
                        field_postings.remove(term);
                    }
                }
            }
            if field_postings.is_empty() {
                self.postings.remove(field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::IndexedMail;
    use crate::model::mail::Mail;

    fn doc(ident: &str, tags: &[&str], body: &str) -> StoredDoc {
        let mail = Mail::new(ident, "INBOX")
            .with_tags(tags.iter().copied())
            .with_body(body);
        IndexedMail::from_mail(&mail).unwrap().to_document()
    }

    #[test]
    fn test_upsert_indexes_terms() {
        let mut snap = Snapshot::default();
        let a = snap.upsert(doc("a", &["work"], "budget review"));
        let b = snap.upsert(doc("b", &[], "holiday plans"));
        assert_eq!(snap.doc_count(), 2);
        assert_eq!(snap.postings(Field::Body, "budget"), Some(&DocSet::from([a])));
        assert_eq!(
            snap.postings(Field::Tag, "inbox"),
            Some(&DocSet::from([a, b]))
        );
    }

    #[test]
    fn test_upsert_replaces_same_ident() {
        let mut snap = Snapshot::default();
        snap.upsert(doc("a", &[], "old words"));
        let new = snap.upsert(doc("a", &[], "fresh words"));
        assert_eq!(snap.doc_count(), 1);
        assert!(snap.postings(Field::Body, "old").is_none());
        assert_eq!(snap.postings(Field::Body, "fresh"), Some(&DocSet::from([new])));
        assert_eq!(snap.doc(new).unwrap().ident, "a");
    }

    #[test]
    fn test_delete_term_missing_is_noop() {
        let mut snap = Snapshot::default();
        snap.upsert(doc("a", &[], "text"));
        assert_eq!(snap.delete_term(Field::Ident, "zzz"), 0);
        assert_eq!(snap.doc_count(), 1);
    }

    #[test]
    fn test_delete_cleans_postings() {
        let mut snap = Snapshot::default();
        snap.upsert(doc("a", &["solo"], "unique words"));
        assert_eq!(snap.delete_term(Field::Ident, "a"), 1);
        assert_eq!(snap.doc_count(), 0);
        assert_eq!(snap.field_terms(Field::Tag).count(), 0);
        assert_eq!(snap.field_terms(Field::Body).count(), 0);
    }

    #[test]
    fn test_apply_advances_generation() {
        let mut snap = Snapshot::default();
        snap.upsert(doc("a", &[], "text"));
        let deleted = snap.apply(vec![
            WriteOp::Upsert(doc("b", &[], "more")),
            WriteOp::Delete {
                field: Field::Ident,
                term: "a".to_string(),
            },
        ]);
        assert_eq!(deleted, 1);
        assert_eq!(snap.generation(), 1);
        assert_eq!(snap.doc_count(), 1);
        assert_eq!(snap.apply(Vec::new()), 0);
        assert_eq!(snap.generation(), 2);
    }

    #[test]
    fn test_postings_rebuilt_after_decode() {
        let mut snap = Snapshot::default();
        snap.upsert(doc("a", &["work"], "budget review"));
        let bytes = bincode::serialize(&snap).unwrap();
        let mut decoded: Snapshot = bincode::deserialize(&bytes).unwrap();
        assert!(decoded.postings(Field::Body, "budget").is_none());
        decoded.rebuild_postings();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn test_doc_numbers_not_reused() {
        let mut snap = Snapshot::default();
        let first = snap.upsert(doc("a", &[], "x1"));
        snap.delete_term(Field::Ident, "a");
        let second = snap.upsert(doc("a", &[], "x1"));
        assert!(second > first);
    }
}
