//! The search engine facade used by the mail client.

use std::borrow::Borrow;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::config::{self, Config, DEFAULT_INDEX_DIR_NAME, DEFAULT_INDEX_NAME};
use crate::error::{Result, SearchError};
use crate::index::document::IndexedMail;
use crate::index::{CompactionPolicy, Field, Index, Query};
use crate::model::mail::Mail;
use crate::model::tag::TagCount;
use crate::storage::{EncryptedStore, MasterKeyProvider};

use super::executor::{self, coerce_page, coerce_window, SearchPage, SearchResult, DEFAULT_WINDOW};
use super::{contacts, query, tags};

/// Encrypted mail index with search, tag counts and contact lookup.
///
/// All mutations go through one writer at a time; reads never wait for
/// writers. Share an engine between threads with `Arc`.
#[derive(Debug)]
pub struct SearchEngine {
    index: Index,
    agent_home: PathBuf,
    default_window: usize,
}

impl SearchEngine {
    /// Open (or create) the index under `<agent_home>/search_index`.
    pub fn open(key_provider: &dyn MasterKeyProvider, agent_home: impl Into<PathBuf>) -> Result<Self> {
        let agent_home = agent_home.into();
        let index_dir = agent_home.join(DEFAULT_INDEX_DIR_NAME);
        Self::open_at(
            key_provider,
            agent_home,
            index_dir,
            DEFAULT_INDEX_NAME,
            CompactionPolicy::default(),
            DEFAULT_WINDOW,
        )
    }

    /// Open the index under the default agent home, `~/.leap`.
    pub fn open_default(key_provider: &dyn MasterKeyProvider) -> Result<Self> {
        Self::open(key_provider, config::default_agent_home())
    }

    /// Open the index at the locations named by `config`.
    pub fn from_config(config: &Config, key_provider: &dyn MasterKeyProvider) -> Result<Self> {
        Self::open_at(
            key_provider,
            config::agent_home(config),
            config::index_dir(config),
            &config.index.index_name,
            config::compaction_policy(config),
            coerce_window(Some(config.search.default_window), DEFAULT_WINDOW),
        )
    }

    fn open_at(
        key_provider: &dyn MasterKeyProvider,
        agent_home: PathBuf,
        index_dir: PathBuf,
        index_name: &str,
        policy: CompactionPolicy,
        default_window: usize,
    ) -> Result<Self> {
        let master_key = key_provider.index_master_key().map_err(|e| match e {
            e @ SearchError::StorageInit { .. } => e,
            other => SearchError::StorageInit {
                path: index_dir.clone(),
                reason: format!("cannot obtain master key: {other}"),
            },
        })?;
        let store = EncryptedStore::open(&index_dir, &master_key)?;
        let index = Index::open_with(store, index_name, policy)?;
        info!(
            path = %index_dir.display(),
            documents = index.snapshot().doc_count(),
            "Search index opened"
        );
        Ok(Self {
            index,
            agent_home,
            default_window,
        })
    }

    pub fn agent_home(&self) -> &Path {
        &self.agent_home
    }

    /// Directory holding the encrypted index files.
    pub fn index_dir(&self) -> &Path {
        self.index.store().dir()
    }

    /// Number of live documents.
    pub fn document_count(&self) -> usize {
        self.index.snapshot().doc_count()
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Index one mail, replacing any mail with the same ident.
    pub fn index_mail(&self, mail: &Mail) -> Result<()> {
        let doc = IndexedMail::from_mail(mail)?.to_document();
        let mut writer = self.index.writer();
        writer.update_document(doc);
        writer.commit()?;
        debug!(ident = %mail.ident, "Indexed mail");
        Ok(())
    }

    /// Index a batch atomically: either every mail becomes searchable or
    /// none does. `on_complete` runs once after a successful commit.
    ///
    /// Failures are logged and returned as [`SearchError::Batch`].
    pub fn index_mails<I>(&self, mails: I, on_complete: Option<&dyn Fn()>) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Borrow<Mail>,
    {
        let mails: Vec<I::Item> = mails.into_iter().collect();
        let batch_size = mails.len();

        match self.write_batch(&mails) {
            Ok(generation) => {
                info!(count = batch_size, generation, "Indexed mail batch");
                if let Some(callback) = on_complete {
                    callback();
                }
                Ok(())
            }
            Err((ident, source)) => {
                error!(
                    batch_size,
                    ident = ident.as_deref().unwrap_or("-"),
                    error = %source,
                    "Batch indexing failed, nothing committed"
                );
                Err(SearchError::Batch {
                    batch_size,
                    ident,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Holds the writer for the whole batch; it is released before return.
    fn write_batch<M: Borrow<Mail>>(
        &self,
        mails: &[M],
    ) -> std::result::Result<u64, (Option<String>, SearchError)> {
        let mut writer = self.index.writer();
        for mail in mails {
            let mail = mail.borrow();
            let doc = IndexedMail::from_mail(mail).map_err(|e| (Some(mail.ident.clone()), e))?;
            writer.update_document(doc.to_document());
        }
        writer.commit().map_err(|e| (None, e))
    }

    /// Fold every pending commit into the base index file. Commits do this
    /// on their own once the commit log outgrows the configured thresholds.
    pub fn compact(&self) -> Result<()> {
        self.index.compact()
    }

    /// Remove the mail `ident`. Unknown idents are not an error.
    pub fn remove_from_index(&self, ident: &str) -> Result<()> {
        let mut writer = self.index.writer();
        writer.delete_by_term(Field::Ident, ident);
        writer.commit()?;
        debug!(ident, "Removed mail from index");
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Translate a user query (see [`query`](super::query) for the syntax).
    pub fn prepare_query(&self, text: &str) -> Result<Query> {
        query::prepare_query(text)
    }

    /// Search in all-mails mode or paginated mode.
    ///
    /// `window` defaults to the configured page size (25) and `page` to 1.
    pub fn search(
        &self,
        query: &str,
        window: Option<usize>,
        page: Option<i64>,
        all_mails: bool,
    ) -> Result<SearchResult> {
        if all_mails {
            self.search_all(query).map(SearchResult::All)
        } else {
            self.search_page(query, window, page).map(SearchResult::Page)
        }
    }

    /// Every matching ident, newest first.
    pub fn search_all(&self, query: &str) -> Result<Vec<String>> {
        let query = self.prepare_query(query)?;
        executor::search_all(&self.index.searcher(), &query)
    }

    /// One page of matching idents plus the per-tag total.
    pub fn search_page(
        &self,
        query: &str,
        window: Option<usize>,
        page: Option<i64>,
    ) -> Result<SearchPage> {
        let query = self.prepare_query(query)?;
        executor::search_page(
            &self.index.searcher(),
            &query,
            coerce_window(window, self.default_window),
            coerce_page(page),
        )
    }

    /// Per-tag totals and read counts.
    pub fn tags(&self, query: Option<&str>, skip_default_tags: bool) -> Result<Vec<TagCount>> {
        tags::tag_counts(&self.index.searcher(), query, skip_default_tags)
    }

    /// Addresses from earlier mails containing `query`.
    pub fn contacts(&self, query: &str) -> Result<Vec<String>> {
        contacts::contacts(&self.index.searcher(), query)
    }
}
