//! Running translated queries: unranked "all mails" and date-ranked pages.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::index::{Field, Query, Searcher};

/// Page size used when the caller gives none (or zero).
pub const DEFAULT_WINDOW: usize = 25;

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    /// Unique idents on this page, newest first.
    pub idents: Vec<String>,
    /// Sum of per-tag match counts over the whole matched set. A mail with
    /// several tags counts once per tag.
    pub total: usize,
}

/// Outcome of [`SearchEngine::search`](super::SearchEngine::search).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    All(Vec<String>),
    Page(SearchPage),
}

impl SearchResult {
    pub fn idents(&self) -> &[String] {
        match self {
            SearchResult::All(idents) => idents,
            SearchResult::Page(page) => &page.idents,
        }
    }
}

/// `None` and `0` become `default`.
pub fn coerce_window(window: Option<usize>, default: usize) -> usize {
    match window {
        Some(w) if w > 0 => w,
        _ => default,
    }
}

/// Pages are 1-based; `None` and anything below 1 become 1.
pub fn coerce_page(page: Option<i64>) -> usize {
    match page {
        Some(p) if p >= 1 => usize::try_from(p).unwrap_or(usize::MAX),
        _ => 1,
    }
}

/// Every match, newest first, without limit.
pub fn search_all(searcher: &Searcher, query: &Query) -> Result<Vec<String>> {
    let docs = searcher.matching(query)?;
    let ordered = searcher.sort_desc(&docs, Field::Date);
    let idents = dedup(searcher.idents(&ordered));
    debug!(terms = query.leaf_count(), matches = idents.len(), "All-mails search");
    Ok(idents)
}

/// Page `page` (1-based) of `window` matches, newest first.
pub fn search_page(
    searcher: &Searcher,
    query: &Query,
    window: usize,
    page: usize,
) -> Result<SearchPage> {
    let docs = searcher.matching(query)?;
    let total = searcher.group_counts(&docs, Field::Tag).values().sum();

    let ordered = searcher.sort_desc(&docs, Field::Date);
    let start = page.saturating_sub(1).saturating_mul(window);
    let on_page: Vec<_> = ordered.into_iter().skip(start).take(window).collect();
    let idents = dedup(searcher.idents(&on_page));

    debug!(
        terms = query.leaf_count(),
        window,
        page,
        matches = docs.len(),
        total,
        "Paginated search"
    );
    Ok(SearchPage { idents, total })
}

/// Drop repeated idents, keeping the first occurrence.
fn dedup(idents: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(idents.len());
    idents
        .into_iter()
        .filter(|ident| seen.insert(ident.clone()))
        .collect()
}
