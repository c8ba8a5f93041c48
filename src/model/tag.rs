//! Tag usage counts reported by the tag aggregator.

use serde::{Deserialize, Serialize};

/// Tags every mail client shows, whether or not any mail carries them.
pub const DEFAULT_TAGS: [&str; 4] = ["inbox", "sent", "drafts", "trash"];

/// Whether `name` is one of the [`DEFAULT_TAGS`].
pub fn is_default_tag(name: &str) -> bool {
    DEFAULT_TAGS.contains(&name)
}

/// Per-tag totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Number of mails carrying the tag.
    pub total: usize,
    /// Number of those mails flagged as seen.
    pub read: usize,
}

impl std::ops::AddAssign for Counts {
    fn add_assign(&mut self, other: Counts) {
        self.total += other.total;
        self.read += other.read;
    }
}

/// Usage summary for one tag. Built per query, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub ident: String,
    pub name: String,
    /// True for members of [`DEFAULT_TAGS`] seeded before counting.
    pub default: bool,
    pub counts: Counts,
    /// Mail idents carrying the tag. Not populated by the aggregator.
    pub mails: Vec<String>,
}

impl TagCount {
    /// A zero-count entry for `name`.
    pub fn new(name: impl Into<String>, default: bool) -> Self {
        let name = name.into();
        Self {
            ident: name.clone(),
            name,
            default,
            counts: Counts::default(),
            mails: Vec::new(),
        }
    }
}
