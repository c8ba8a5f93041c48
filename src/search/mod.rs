//! Search engine: query translation, paginated search, tag counts and
//! contact lookup over the encrypted index.

pub mod contacts;
pub mod engine;
pub mod executor;
pub mod query;
pub mod tags;

pub use engine::SearchEngine;
pub use executor::{SearchPage, SearchResult, DEFAULT_WINDOW};
pub use query::prepare_query;
