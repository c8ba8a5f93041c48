//! Encrypted, persistent inverted index over mail documents.
//!
//! An [`Index`] holds the current [`Snapshot`] and hands out read-only
//! [`Searcher`]s and exclusive [`WriterSession`]s. On disk it is a base blob
//! plus a commit log with one entry per commit since the base was written.
//! Once the log outgrows its [`CompactionPolicy`], it is folded into a new
//! base.

pub mod analysis;
pub mod document;
pub mod format;
pub mod persist;
pub mod query;
pub mod reader;
pub mod schema;
pub mod snapshot;
pub mod writer;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::Result;
use crate::storage::EncryptedStore;

use persist::CommitLog;

pub use query::Query;
pub use reader::Searcher;
pub use schema::Field;
pub use snapshot::Snapshot;
pub use writer::WriterSession;

/// When the commit log is folded back into the base blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Compact once the log has this many entries.
    pub max_log_entries: usize,
    /// Compact once the log holds at least this many bytes and at least as
    /// many as the base.
    pub min_log_bytes: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            max_log_entries: 1024,
            min_log_bytes: 1 << 20,
        }
    }
}

#[derive(Debug)]
struct LogState {
    base_bytes: usize,
    entries: CommitLog,
}

impl LogState {
    fn record(&mut self, generation: u64, bytes: usize) {
        self.entries.insert(generation, bytes);
    }

    fn is_due(&self, policy: &CompactionPolicy) -> bool {
        let log_bytes: usize = self.entries.values().sum();
        self.entries.len() >= policy.max_log_entries
            || log_bytes >= policy.min_log_bytes.max(self.base_bytes)
    }

    /// Forget the entries up to `generation`, returning their generations.
    fn fold(&mut self, generation: u64, base_bytes: usize) -> Vec<u64> {
        let kept = self.entries.split_off(&(generation + 1));
        self.base_bytes = base_bytes;
        std::mem::replace(&mut self.entries, kept)
            .into_keys()
            .collect()
    }
}

/// A named index inside an encrypted store.
pub struct Index {
    store: EncryptedStore,
    name: String,
    current: RwLock<Arc<Snapshot>>,
    gate: Mutex<()>,
    log: Mutex<LogState>,
    compacting: Mutex<()>,
    policy: CompactionPolicy,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("store", &self.store)
            .field("name", &self.name)
            .field("generation", &self.snapshot().generation())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Index {
    /// Open index `name` with the default [`CompactionPolicy`].
    pub fn open(store: EncryptedStore, name: impl Into<String>) -> Result<Self> {
        Self::open_with(store, name, CompactionPolicy::default())
    }

    /// Open index `name`, creating and persisting an empty one if the store
    /// has none yet, and replay its commit log.
    pub fn open_with(
        store: EncryptedStore,
        name: impl Into<String>,
        policy: CompactionPolicy,
    ) -> Result<Self> {
        let name = name.into();
        let (mut snapshot, base_bytes) = match persist::load_snapshot(&store, &name)? {
            Some(loaded) => loaded,
            None => {
                let empty = Snapshot::default();
                let bytes = persist::write_snapshot(&store, &name, &empty)?;
                info!(
                    index = %name,
                    path = %store.path_of(&persist::blob_name(&name)).display(),
                    "Created new index"
                );
                (empty, bytes)
            }
        };
        let entries = persist::replay_commit_log(&store, &name, &mut snapshot)?;

        Ok(Self {
            store,
            name,
            current: RwLock::new(Arc::new(snapshot)),
            gate: Mutex::new(()),
            log: Mutex::new(LogState {
                base_bytes,
                entries,
            }),
            compacting: Mutex::new(()),
            policy,
        })
    }

    pub fn store(&self) -> &EncryptedStore {
        &self.store
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// A reader over the latest committed generation.
    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.snapshot())
    }

    /// Open the single write session, blocking while another is active.
    pub fn writer(&self) -> WriterSession<'_> {
        WriterSession::new(self, self.gate.lock())
    }

    /// Number of commits not yet folded into the base.
    pub fn commit_log_len(&self) -> usize {
        self.log.lock().entries.len()
    }

    /// Fold the commit log into a new base blob.
    ///
    /// Writers keep committing meanwhile; their entries stay in the log.
    pub fn compact(&self) -> Result<()> {
        let _running = self.compacting.lock();
        self.compact_locked()
    }

    /// Compact if the log has outgrown the policy and no compaction is
    /// already running. Failures leave the log in place and are only logged.
    fn compact_if_due(&self) {
        if !self.log.lock().is_due(&self.policy) {
            return;
        }
        let Some(_running) = self.compacting.try_lock() else {
            return;
        };
        if let Err(e) = self.compact_locked() {
            warn!(index = %self.name, error = %e, "Compaction failed, commit log kept");
        }
    }

    fn compact_locked(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let generation = snapshot.generation();
        let base_bytes = persist::write_snapshot(&self.store, &self.name, &snapshot)?;
        drop(snapshot);

        let folded = self.log.lock().fold(generation, base_bytes);
        for entry in &folded {
            persist::remove_commit_log(&self.store, &self.name, *entry)?;
        }
        info!(
            index = %self.name,
            generation,
            folded = folded.len(),
            bytes = base_bytes,
            "Compacted index"
        );
        Ok(())
    }
}
