//! Binary index format (the plaintext inside the encrypted blobs).
//!
//! An index is a base blob `<name>.idx` plus one commit-log blob
//! `<name>.<generation>.log` per commit since the base was written. Both
//! start with the same header; log blobs set [`FLAG_COMMIT_LOG`].
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (64 bytes, fixed)             │
//! │  magic: [u8; 8] = b"MAILIDX\0"      │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  document_count: u64                 │
//! │  generation: u64                     │
//! │  (padding to 64 bytes)               │
//! ├──────────────────────────────────────┤
//! │ BODY (variable)                      │
//! │  base: bincode-serialized Snapshot   │
//! │  log:  bincode-serialized WriteOps   │
//! └──────────────────────────────────────┘
//! ```

/// Magic bytes identifying a mail search index.
pub const MAGIC: &[u8; 8] = b"MAILIDX\0";

/// Current index format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Header flag marking a commit-log blob.
pub const FLAG_COMMIT_LOG: u32 = 1;

/// Serializable index header.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// [`FLAG_COMMIT_LOG`] for log blobs, 0 for the base.
    pub flags: u32,
    /// Live documents in a base; operations in a log.
    pub document_count: u64,
    /// Generation of the base, or the generation a log entry produces.
    pub generation: u64,
}

impl IndexHeader {
    pub fn new(document_count: u64, generation: u64) -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            document_count,
            generation,
        }
    }

    /// Header of the commit-log entry producing `generation`.
    pub fn commit_log(operation_count: u64, generation: u64) -> Self {
        Self {
            flags: FLAG_COMMIT_LOG,
            ..Self::new(operation_count, generation)
        }
    }

    pub fn is_commit_log(&self) -> bool {
        self.flags & FLAG_COMMIT_LOG != 0
    }

    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fits_padding() {
        let bytes = bincode::serialize(&IndexHeader::new(u64::MAX, u64::MAX)).unwrap();
        assert!(bytes.len() <= HEADER_SIZE);
    }

    #[test]
    fn test_validate() {
        assert!(IndexHeader::new(0, 0).validate().is_ok());

        let mut bad = IndexHeader::new(0, 0);
        bad.version = 99;
        assert!(bad.validate().unwrap_err().contains("expected 1, found 99"));

        bad.magic = *b"MBOXTUI\0";
        assert_eq!(bad.validate().unwrap_err(), "Invalid magic bytes");
    }

    #[test]
    fn test_commit_log_flag() {
        assert!(!IndexHeader::new(3, 1).is_commit_log());
        let log = IndexHeader::commit_log(2, 7);
        assert!(log.is_commit_log());
        assert!(log.validate().is_ok());
        assert_eq!(log.generation, 7);
    }
}
