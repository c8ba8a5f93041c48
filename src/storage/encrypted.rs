//! Directory of named blobs encrypted with XChaCha20-Poly1305.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ magic: [u8; 6] = b"MSENC1"           │
//! │ nonce: [u8; 24] (random per write)   │
//! │ ciphertext + 16-byte Poly1305 tag    │
//! └──────────────────────────────────────┘
//! ```
//!
//! The cipher key is derived from the master key with HKDF-SHA256. The blob
//! name is bound as associated data, so renaming a file on disk makes it
//! undecryptable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;

use crate::error::{Result, SearchError};

/// Magic bytes prefixing every encrypted blob.
pub const MAGIC: &[u8; 6] = b"MSENC1";

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HKDF_SALT: &[u8] = b"mailsearch/search-index";
const HKDF_INFO: &[u8] = b"xchacha20poly1305 blob key v1";

/// Encrypted blob store rooted at a directory.
pub struct EncryptedStore {
    dir: PathBuf,
    cipher_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl EncryptedStore {
    /// Open (creating if needed) the store at `dir` under `master_key`.
    pub fn open(dir: impl Into<PathBuf>, master_key: &[u8]) -> Result<Self> {
        let dir = dir.into();
        if master_key.is_empty() {
            return Err(SearchError::StorageInit {
                path: dir,
                reason: "empty master key".to_string(),
            });
        }
        fs::create_dir_all(&dir).map_err(|e| SearchError::StorageInit {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master_key);
        let mut cipher_key = [0u8; KEY_LEN];
        hk.expand(HKDF_INFO, &mut cipher_key)
            .map_err(|e| SearchError::StorageInit {
                path: dir.clone(),
                reason: format!("key derivation failed: {e}"),
            })?;

        Ok(Self { dir, cipher_key })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk path of the blob `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Names of all blobs in the store, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| SearchError::io(&self.dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SearchError::io(&self.dir, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| SearchError::io(entry.path(), e))?
                .is_file();
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read and decrypt `name`. Returns `None` if the blob does not exist.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(name);
        let data = match fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SearchError::io(&path, e)),
        };
        debug!(path = %path.display(), bytes = data.len(), "Read encrypted blob");
        self.open_sealed(name, &data).map(Some)
    }

    /// Encrypt `plaintext` and atomically replace `name` with it.
    pub fn write(&self, name: &str, plaintext: &[u8]) -> Result<()> {
        let path = self.path_of(name);
        let sealed = self.seal(name, plaintext)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| SearchError::io(&self.dir, e))?;
        tmp.write_all(&sealed)
            .map_err(|e| SearchError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SearchError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| SearchError::io(&path, e.error))?;
        debug!(path = %path.display(), bytes = sealed.len(), "Wrote encrypted blob");
        Ok(())
    }

    /// Delete `name` if present.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_of(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SearchError::io(&path, e)),
        }
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.cipher_key).into())
    }

    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| SearchError::Crypto(format!("encrypt '{name}': {e}")))?;

        let mut out = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open_sealed(&self, name: &str, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < MAGIC.len() + NONCE_LEN + TAG_LEN || !data.starts_with(MAGIC) {
            return Err(SearchError::Crypto(format!(
                "'{name}' is not an encrypted index blob"
            )));
        }
        let (nonce_bytes, ciphertext) = data[MAGIC.len()..].split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);
        self.cipher()
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| SearchError::Crypto(format!("decrypt '{name}' failed (wrong key or corrupt)")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(dir.path(), b"master").unwrap();
        store.write("blob", b"confidential words").unwrap();
        assert_eq!(
            store.read("blob").unwrap().as_deref(),
            Some(&b"confidential words"[..])
        );
    }

    #[test]
    fn test_plaintext_not_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(dir.path(), b"master").unwrap();
        store.write("blob", b"confidential words").unwrap();
        let raw = fs::read(store.path_of("blob")).unwrap();
        assert!(raw.starts_with(MAGIC));
        assert!(!raw
            .windows(b"confidential".len())
            .any(|w| w == b"confidential"));
    }

    #[test]
    fn test_missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(dir.path(), b"master").unwrap();
        assert!(store.read("absent").unwrap().is_none());
        store.remove("absent").unwrap();
    }

    #[test]
    fn test_names_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(dir.path(), b"master").unwrap();
        store.write("b", b"2").unwrap();
        store.write("a", b"1").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(store.names().unwrap(), vec!["a", "b"]);

        store.remove("a").unwrap();
        assert_eq!(store.names().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        EncryptedStore::open(dir.path(), b"right")
            .unwrap()
            .write("blob", b"data")
            .unwrap();
        let other = EncryptedStore::open(dir.path(), b"wrong").unwrap();
        assert!(matches!(other.read("blob"), Err(SearchError::Crypto(_))));
    }

    #[test]
    fn test_renamed_blob_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(dir.path(), b"master").unwrap();
        store.write("a", b"data").unwrap();
        fs::rename(store.path_of("a"), store.path_of("b")).unwrap();
        assert!(matches!(store.read("b"), Err(SearchError::Crypto(_))));
    }

    #[test]
    fn test_empty_master_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = EncryptedStore::open(dir.path(), b"").unwrap_err();
        assert!(matches!(err, SearchError::StorageInit { .. }));
    }

    #[test]
    fn test_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("search_index");
        let store = EncryptedStore::open(&nested, b"master").unwrap();
        assert!(store.dir().is_dir());
    }
}
