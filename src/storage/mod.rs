//! Encrypted storage for the index and the master keys that unlock it.
//!
//! The index never touches the disk in plaintext: every blob goes through
//! [`EncryptedStore`], which is opened with a master key obtained from a
//! [`MasterKeyProvider`].

pub mod encrypted;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, SearchError};

pub use encrypted::EncryptedStore;

/// Length of generated master keys.
pub const MASTER_KEY_LEN: usize = 32;

/// Source of the master key protecting the search index.
pub trait MasterKeyProvider {
    /// Return the raw master key bytes. Any length is accepted; the store
    /// derives its cipher key from it.
    fn index_master_key(&self) -> Result<Vec<u8>>;
}

/// A master key held in memory, for callers that manage keys themselves.
#[derive(Clone)]
pub struct StaticKey(Vec<u8>);

impl StaticKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StaticKey({} bytes)", self.0.len())
    }
}

impl MasterKeyProvider for StaticKey {
    fn index_master_key(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// A master key kept in a local file, generated on first use.
///
/// The file holds exactly [`MASTER_KEY_LEN`] random bytes in the clear and
/// is created with mode `0600` on Unix. Its protection is only the file
/// permissions, so it suits the CLI and development setups; a mail client
/// should supply its own provider backed by the account's key store. Keep
/// the file outside the index directory it unlocks.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Vec<u8>>> {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SearchError::io(&self.path, e)),
        };
        if data.len() != MASTER_KEY_LEN {
            return Err(SearchError::StorageInit {
                path: self.path.clone(),
                reason: format!(
                    "key file has wrong length: expected {MASTER_KEY_LEN}, found {}",
                    data.len()
                ),
            });
        }
        Ok(Some(data))
    }

    fn create(&self) -> Result<Vec<u8>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SearchError::io(parent, e))?;
        }
        let mut key = vec![0u8; MASTER_KEY_LEN];
        getrandom::getrandom(&mut key).map_err(|e| SearchError::StorageInit {
            path: self.path.clone(),
            reason: format!("getrandom: {e}"),
        })?;

        let mut file = open_private(&self.path).map_err(|e| SearchError::io(&self.path, e))?;
        file.write_all(&key)
            .map_err(|e| SearchError::io(&self.path, e))?;
        file.flush().map_err(|e| SearchError::io(&self.path, e))?;
        info!(path = %self.path.display(), "Generated new index master key");
        Ok(key)
    }
}

impl MasterKeyProvider for KeyFile {
    fn index_master_key(&self) -> Result<Vec<u8>> {
        match self.read()? {
            Some(key) => Ok(key),
            None => self.create(),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = KeyFile::new(dir.path().join("keys").join("index.key"));

        let first = provider.index_master_key().unwrap();
        let second = provider.index_master_key().unwrap();
        assert_eq!(first.len(), MASTER_KEY_LEN);
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let provider = KeyFile::new(dir.path().join("index.key"));
        provider.index_master_key().unwrap();
        let mode = fs::metadata(provider.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_key_file_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.key");
        fs::write(&path, b"short").unwrap();
        let err = KeyFile::new(&path).index_master_key().unwrap_err();
        assert!(matches!(err, SearchError::StorageInit { .. }));
    }

    #[test]
    fn test_static_key_debug_hides_bytes() {
        let key = StaticKey::new(b"secret".to_vec());
        assert_eq!(format!("{key:?}"), "StaticKey(6 bytes)");
    }
}
