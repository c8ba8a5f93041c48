//! Loading and saving the index through the encrypted store.
//!
//! [`write_snapshot`] writes the whole base blob. [`append_commit`] writes
//! one commit-log blob holding only the operations of that commit.
//! [`load_snapshot`] followed by [`replay_commit_log`] restores the latest
//! generation.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::format::{IndexHeader, HEADER_SIZE};
use crate::index::snapshot::{Snapshot, WriteOp};
use crate::storage::EncryptedStore;

/// Commit-log entries on disk: generation → plaintext size in bytes.
pub type CommitLog = BTreeMap<u64, usize>;

/// Blob name of the base of index `name`.
pub fn blob_name(name: &str) -> String {
    format!("{name}.idx")
}

/// Blob name of the commit-log entry that produces `generation`.
pub fn log_blob_name(name: &str, generation: u64) -> String {
    format!("{name}.{generation:020}.log")
}

fn log_generation(name: &str, blob: &str) -> Option<u64> {
    let digits = blob
        .strip_prefix(name)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn invalid(store: &EncryptedStore, blob: &str, reason: impl Into<String>) -> SearchError {
    SearchError::InvalidIndex {
        path: store.path_of(blob),
        reason: reason.into(),
    }
}

/// Padded header followed by the bincode body.
fn encode<T: Serialize + ?Sized>(
    store: &EncryptedStore,
    blob: &str,
    header: &IndexHeader,
    body: &T,
) -> Result<Vec<u8>> {
    let encode_err = |e: bincode::Error| invalid(store, blob, format!("serialization failed: {e}"));
    let header_bytes = bincode::serialize(header).map_err(encode_err)?;
    let body = bincode::serialize(body).map_err(encode_err)?;

    let mut data = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    data[..copy_len].copy_from_slice(&header_bytes[..copy_len]);
    data.extend_from_slice(&body);
    Ok(data)
}

fn read_header(store: &EncryptedStore, blob: &str, data: &[u8]) -> Result<IndexHeader> {
    if data.len() < HEADER_SIZE {
        return Err(invalid(
            store,
            blob,
            format!("index too small ({} bytes)", data.len()),
        ));
    }
    let header: IndexHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(store, blob, format!("Header deserialization failed: {e}")))?;
    header.validate().map_err(|reason| invalid(store, blob, reason))?;
    Ok(header)
}

/// Load the base of index `name` with its plaintext size. Returns `None`
/// if it was never written.
///
/// A blob that decrypts but does not hold a valid index is an error; it is
/// never replaced by an empty index.
pub fn load_snapshot(store: &EncryptedStore, name: &str) -> Result<Option<(Snapshot, usize)>> {
    let blob = blob_name(name);
    let Some(data) = store.read(&blob)? else {
        debug!(index = name, "No index on disk yet");
        return Ok(None);
    };

    let header = read_header(store, &blob, &data)?;
    if header.is_commit_log() {
        return Err(invalid(store, &blob, "base blob carries the commit-log flag"));
    }

    let mut snapshot: Snapshot = bincode::deserialize(&data[HEADER_SIZE..])
        .map_err(|e| invalid(store, &blob, format!("Snapshot deserialization failed: {e}")))?;
    snapshot.rebuild_postings();

    if snapshot.doc_count() as u64 != header.document_count {
        return Err(invalid(
            store,
            &blob,
            format!(
                "document count mismatch: header says {}, found {}",
                header.document_count,
                snapshot.doc_count()
            ),
        ));
    }
    if snapshot.generation() != header.generation {
        return Err(invalid(store, &blob, "generation mismatch"));
    }

    debug!(
        index = name,
        documents = snapshot.doc_count(),
        generation = snapshot.generation(),
        "Loaded index base"
    );
    Ok(Some((snapshot, data.len())))
}

/// Serialize and encrypt `snapshot` as the base of index `name`, replacing
/// the previous base atomically. Returns the plaintext size.
pub fn write_snapshot(store: &EncryptedStore, name: &str, snapshot: &Snapshot) -> Result<usize> {
    let blob = blob_name(name);
    let header = IndexHeader::new(snapshot.doc_count() as u64, snapshot.generation());
    let data = encode(store, &blob, &header, snapshot)?;

    store.write(&blob, &data)?;
    info!(
        index = name,
        documents = snapshot.doc_count(),
        generation = snapshot.generation(),
        bytes = data.len(),
        "Index base written"
    );
    Ok(data.len())
}

/// Write the commit-log entry producing `generation`. Returns the
/// plaintext size.
pub fn append_commit(
    store: &EncryptedStore,
    name: &str,
    generation: u64,
    ops: &[WriteOp],
) -> Result<usize> {
    let blob = log_blob_name(name, generation);
    let header = IndexHeader::commit_log(ops.len() as u64, generation);
    let data = encode(store, &blob, &header, ops)?;
    store.write(&blob, &data)?;
    Ok(data.len())
}

pub fn remove_commit_log(store: &EncryptedStore, name: &str, generation: u64) -> Result<()> {
    store.remove(&log_blob_name(name, generation))
}

/// Apply the commit log of index `name` on top of its base `snapshot`.
///
/// Entries already folded into the base are deleted. The remaining entries
/// must continue the base generation without gaps.
pub fn replay_commit_log(
    store: &EncryptedStore,
    name: &str,
    snapshot: &mut Snapshot,
) -> Result<CommitLog> {
    let pending: BTreeMap<u64, String> = store
        .names()?
        .into_iter()
        .filter_map(|blob| log_generation(name, &blob).map(|g| (g, blob)))
        .collect();

    let mut log = CommitLog::new();
    for (generation, blob) in pending {
        if generation <= snapshot.generation() {
            debug!(index = name, generation, "Deleting folded commit-log entry");
            store.remove(&blob)?;
            continue;
        }
        let expected = snapshot.generation() + 1;
        if generation != expected {
            return Err(invalid(
                store,
                &blob,
                format!("commit log gap: expected generation {expected}, found {generation}"),
            ));
        }

        let data = store
            .read(&blob)?
            .ok_or_else(|| invalid(store, &blob, "commit-log entry vanished during load"))?;
        let header = read_header(store, &blob, &data)?;
        if !header.is_commit_log() || header.generation != generation {
            return Err(invalid(store, &blob, "commit-log header does not match its name"));
        }
        let ops: Vec<WriteOp> = bincode::deserialize(&data[HEADER_SIZE..])
            .map_err(|e| invalid(store, &blob, format!("Commit deserialization failed: {e}")))?;
        if ops.len() as u64 != header.document_count {
            return Err(invalid(store, &blob, "operation count mismatch"));
        }

        snapshot.apply(ops);
        log.insert(generation, data.len());
    }

    if !log.is_empty() {
        debug!(
            index = name,
            entries = log.len(),
            generation = snapshot.generation(),
            "Replayed commit log"
        );
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{IndexedMail, StoredDoc};
    use crate::index::schema::Field;
    use crate::model::mail::Mail;

    fn store(dir: &std::path::Path) -> EncryptedStore {
        EncryptedStore::open(dir, &[7u8; 32]).unwrap()
    }

    fn doc(ident: &str, body: &str) -> StoredDoc {
        let mail = Mail::new(ident, "INBOX").with_body(body);
        IndexedMail::from_mail(&mail).unwrap().to_document()
    }

    #[test]
    fn test_missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&store(dir.path()), "mails").unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut snap = Snapshot::default();
        snap.apply(vec![WriteOp::Upsert(doc("a", "hello there"))]);

        let written = write_snapshot(&store, "mails", &snap).unwrap();
        assert!(dir.path().join("mails.idx").exists());
        assert_eq!(load_snapshot(&store, "mails").unwrap(), Some((snap, written)));
    }

    #[test]
    fn test_log_blob_names() {
        assert_eq!(log_blob_name("mails", 3), "mails.00000000000000000003.log");
        assert_eq!(log_generation("mails", &log_blob_name("mails", 42)), Some(42));
        assert_eq!(log_generation("mails", "mails.idx"), None);
        assert_eq!(log_generation("mails", "other.00000000000000000001.log"), None);
        assert_eq!(log_generation("mails", "mails.x.log"), None);
    }

    #[test]
    fn test_replay_applies_in_order_and_drops_folded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut base = Snapshot::default();
        base.apply(vec![WriteOp::Upsert(doc("a", "first"))]);
        write_snapshot(&store, "mails", &base).unwrap();

        append_commit(&store, "mails", 1, &[WriteOp::Upsert(doc("a", "first"))]).unwrap();
        append_commit(&store, "mails", 2, &[WriteOp::Upsert(doc("b", "second"))]).unwrap();
        append_commit(
            &store,
            "mails",
            3,
            &[WriteOp::Delete {
                field: Field::Ident,
                term: "a".to_string(),
            }],
        )
        .unwrap();

        let (mut snap, _) = load_snapshot(&store, "mails").unwrap().unwrap();
        let log = replay_commit_log(&store, "mails", &mut snap).unwrap();
        assert_eq!(log.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(snap.generation(), 3);
        assert_eq!(snap.doc_count(), 1);
        assert!(snap.postings(Field::Body, "second").is_some());
        assert!(!dir.path().join(log_blob_name("mails", 1)).exists());
    }

    #[test]
    fn test_gap_in_log_is_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        write_snapshot(&store, "mails", &Snapshot::default()).unwrap();
        append_commit(&store, "mails", 2, &[]).unwrap();

        let (mut snap, _) = load_snapshot(&store, "mails").unwrap().unwrap();
        let err = replay_commit_log(&store, "mails", &mut snap).unwrap_err();
        assert!(err.to_string().contains("commit log gap"), "{err}");
    }

    #[test]
    fn test_garbage_plaintext_is_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.write("mails.idx", b"definitely not an index").unwrap();
        let err = load_snapshot(&store, "mails").unwrap_err();
        assert!(matches!(err, SearchError::InvalidIndex { .. }));
    }

    #[test]
    fn test_bad_magic_is_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut data = vec![0u8; HEADER_SIZE];
        data.extend_from_slice(&bincode::serialize(&Snapshot::default()).unwrap());
        store.write("mails.idx", &data).unwrap();
        let err = load_snapshot(&store, "mails").unwrap_err();
        assert!(err.to_string().contains("Invalid magic bytes"));
    }
}
