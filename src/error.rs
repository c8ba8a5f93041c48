//! Centralized error types for mailsearch.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsearch library.
#[derive(Error, Debug)]
pub enum SearchError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The index directory or master key could not be set up.
    #[error("Cannot initialize index storage at '{path}': {reason}")]
    StorageInit { path: PathBuf, reason: String },

    /// Encryption or decryption of an index blob failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The decrypted index is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible index '{path}': {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    /// The translated query could not be parsed.
    #[error("Cannot parse query '{query}': {reason}")]
    QueryParse { query: String, reason: String },

    /// A mail could not be turned into an index document.
    #[error("Cannot index mail '{ident}': {reason}")]
    InvalidMail { ident: String, reason: String },

    /// A batch write was aborted; nothing from the batch was committed.
    #[error("Batch of {batch_size} mail(s) aborted{}: {source}", at_ident(.ident))]
    Batch {
        batch_size: usize,
        ident: Option<String>,
        source: Box<SearchError>,
    },
}

fn at_ident(ident: &Option<String>) -> String {
    ident
        .as_deref()
        .map(|i| format!(" at '{i}'"))
        .unwrap_or_default()
}

/// Convenience alias for `Result<T, SearchError>`.
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `QueryParse` variant.
    pub fn query(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryParse {
            query: query.into(),
            reason: reason.into(),
        }
    }

    /// The ident of the mail that caused this error, if known.
    pub fn mail_ident(&self) -> Option<&str> {
        match self {
            Self::InvalidMail { ident, .. } => Some(ident),
            Self::Batch { ident, .. } => ident.as_deref(),
            _ => None,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `SearchError::io`).
impl From<std::io::Error> for SearchError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message_names_failing_mail() {
        let err = SearchError::Batch {
            batch_size: 3,
            ident: Some("m2".to_string()),
            source: Box::new(SearchError::InvalidMail {
                ident: "m2".to_string(),
                reason: "bad date".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 mail(s)"));
        assert!(msg.contains("'m2'"));
        assert_eq!(err.mail_ident(), Some("m2"));
    }

    #[test]
    fn test_batch_message_without_ident() {
        let err = SearchError::Batch {
            batch_size: 1,
            ident: None,
            source: Box::new(SearchError::Crypto("nope".to_string())),
        };
        assert_eq!(err.to_string(), "Batch of 1 mail(s) aborted: Crypto error: nope");
    }
}
