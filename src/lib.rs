//! `mailsearch`: encrypted local full-text search for a mail client.
//!
//! This crate indexes mails into an inverted index that is encrypted at rest,
//! and answers paginated searches, per-tag counts and contact lookups over it.
//! See [`SearchEngine`] for the entry point.

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod search;
pub mod storage;

pub use error::{Result, SearchError};
pub use model::mail::{Mail, MailHeaders};
pub use model::tag::{Counts, TagCount, DEFAULT_TAGS};
pub use search::{SearchEngine, SearchPage, SearchResult};
pub use storage::{KeyFile, MasterKeyProvider, StaticKey};
