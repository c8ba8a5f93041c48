//! Per-tag usage counts.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::index::{Field, Query, Searcher};
use crate::model::status::SEEN;
use crate::model::tag::{is_default_tag, Counts, TagCount, DEFAULT_TAGS};

/// Count mails per tag, optionally keeping only tags whose name contains
/// `filter` (case-insensitive).
///
/// Read counts are only computed for the unfiltered view; with a filter
/// every `read` is 0.
pub fn tag_counts(
    searcher: &Searcher,
    filter: Option<&str>,
    skip_default_tags: bool,
) -> Result<Vec<TagCount>> {
    let filter = filter.unwrap_or("").to_lowercase();

    let all = searcher.matching(&Query::Every)?;
    let totals = searcher.group_counts(&all, Field::Tag);

    let reads = if filter.is_empty() {
        let seen = Query::And(vec![
            Query::Every,
            Query::term(Field::Flags, SEEN),
        ]);
        let seen = searcher.matching(&seen.normalize())?;
        searcher.group_counts(&seen, Field::Tag)
    } else {
        BTreeMap::new()
    };

    let seed: BTreeMap<String, TagCount> = if skip_default_tags {
        BTreeMap::new()
    } else {
        DEFAULT_TAGS
            .iter()
            .map(|name| (name.to_string(), TagCount::new(*name, true)))
            .collect()
    };

    let keep = |name: &str| {
        !(skip_default_tags && is_default_tag(name)) && name.to_lowercase().contains(&filter)
    };

    let groups = totals
        .into_iter()
        .map(|(name, total)| (name, Counts { total, read: 0 }))
        .chain(
            reads
                .into_iter()
                .map(|(name, read)| (name, Counts { total: 0, read })),
        );

    let merged = groups
        .filter(|(name, _)| keep(name))
        .fold(seed, |mut acc, (name, counts)| {
            acc.entry(name)
                .or_insert_with_key(|name| TagCount::new(name.as_str(), is_default_tag(name)))
                .counts += counts;
            acc
        });

    debug!(
        filter_len = filter.chars().count(),
        skip_default_tags,
        tags = merged.len(),
        "Tag counts"
    );
    Ok(merged.into_values().collect())
}
