//! Write sessions.
//!
//! At most one [`WriterSession`] exists per [`Index`] at a time: opening one
//! blocks until the previous session is committed, aborted or dropped.
//! Operations are buffered and applied all at once on [`WriterSession::commit`];
//! a session that ends any other way leaves the index untouched.
//!
//! A commit persists only its own operations, as one commit-log entry, so
//! its cost follows the size of the change and not of the index.

use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::debug;

use crate::error::Result;

use super::document::StoredDoc;
use super::persist;
use super::schema::Field;
use super::snapshot::WriteOp;
use super::Index;

/// Exclusive, buffered write access to an [`Index`].
pub struct WriterSession<'a> {
    index: &'a Index,
    _gate: MutexGuard<'a, ()>,
    ops: Vec<WriteOp>,
}

impl<'a> WriterSession<'a> {
    pub(super) fn new(index: &'a Index, gate: MutexGuard<'a, ()>) -> Self {
        Self {
            index,
            _gate: gate,
            ops: Vec::new(),
        }
    }

    /// Add `doc`, replacing any document with the same ident.
    pub fn update_document(&mut self, doc: StoredDoc) {
        self.ops.push(WriteOp::Upsert(doc));
    }

    /// Delete every document holding `term` in `field`.
    pub fn delete_by_term(&mut self, field: Field, term: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            field,
            term: term.into(),
        });
    }

    /// Number of buffered operations.
    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    /// Persist the buffered operations as one commit-log entry, then publish
    /// the new generation to new searchers. On error nothing becomes visible.
    ///
    /// The writer gate is released before any due compaction runs.
    /// Returns the committed generation.
    pub fn commit(mut self) -> Result<u64> {
        let index = self.index;
        let ops = std::mem::take(&mut self.ops);
        let generation = index.snapshot().generation() + 1;

        let bytes = persist::append_commit(&index.store, &index.name, generation, &ops)?;
        index.log.lock().record(generation, bytes);

        let op_count = ops.len();
        let deleted = {
            let mut current = index.current.write();
            let next = Arc::make_mut(&mut *current);
            let deleted = next.apply(ops);
            debug_assert_eq!(next.generation(), generation);
            deleted
        };
        debug!(
            index = %index.name,
            operations = op_count,
            deleted,
            generation,
            bytes,
            "Committed"
        );

        drop(self);
        index.compact_if_due();
        Ok(generation)
    }

    /// Discard the buffered operations.
    pub fn abort(mut self) {
        self.ops.clear();
    }
}

impl Drop for WriterSession<'_> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            debug!(
                index = %self.index.name,
                discarded = self.ops.len(),
                "Writer session dropped without commit"
            );
        }
    }
}
