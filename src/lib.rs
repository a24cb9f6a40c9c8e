//! decider-lens: completion and hover documentation for decider and experiment
//! identifiers.
//!
//! Records are fetched from the remote API, cached in a persisted snapshot, and
//! matched fuzzily against the quoted token under the cursor. `Lens` is the
//! entry point; the `lsp` module exposes it to editors.

pub mod config;
pub mod db;
pub mod detail;
pub mod error;
pub mod format;
pub mod fuzzy;
pub mod lsp;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::task::JoinHandle;

use config::Config;
use db::{SqliteStorage, StateStorage};
use detail::DetailFormatter;
use error::Result;
use fuzzy::Fuzzy;
use model::{
    CandidateRef, CompletionCandidate, Detail, HoverResult, Position, RecordKind, SearchEntry,
    SearchResult, StatusReport,
};
use provider::capi::CapiProvider;
use provider::helium::HeliumProvider;
use provider::{RampSource, RecordSource};
use resolver::CompletionResolver;
use scheduler::{RefreshOutcome, RefreshScheduler};
use store::RecordStore;

/// Wires the store, scheduler, resolver, and formatter together.
pub struct Lens {
    store: Arc<RecordStore>,
    scheduler: Arc<RefreshScheduler>,
    resolver: CompletionResolver,
    formatter: DetailFormatter,
    fuzzy: Fuzzy,
}

impl Lens {
    pub fn new(
        config: &Config,
        source: Arc<dyn RecordSource + Send + Sync>,
        ramp: Arc<dyn RampSource + Send + Sync>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let store = Arc::new(RecordStore::new(source, storage));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&store),
            config.refresh_interval,
        ));
        let fuzzy = Fuzzy::new(config.fuzzy_threshold);

        Self {
            store,
            scheduler,
            resolver: CompletionResolver::new(fuzzy, config.eligibility_lines),
            formatter: DetailFormatter::new(ramp, config.ramp_timeout),
            fuzzy,
        }
    }

    /// HTTP providers plus SQLite state at `config.db_path`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = provider::build_client(config.request_timeout)?;
        let source = CapiProvider::new(client.clone(), &config.api_base_url)?;
        let ramp = HeliumProvider::new(client, &config.ramp_url)?;
        let storage = SqliteStorage::open(&config.db_path)?;

        Ok(Self::new(
            config,
            Arc::new(source),
            Arc::new(ramp),
            Arc::new(storage),
        ))
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Start periodic refreshes (the first one runs immediately).
    pub fn start(&self) -> JoinHandle<()> {
        Arc::clone(&self.scheduler).spawn()
    }

    /// Manual refresh; failures are logged and reported, never raised.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.scheduler.refresh_now().await
    }

    /// Lightweight candidates for the quoted token before `position`.
    pub fn resolve_completions(&self, text: &str, position: Position) -> Vec<CompletionCandidate> {
        match self.store.get() {
            Some(snapshot) => self.resolver.complete(&snapshot, text, position),
            None => Vec::new(),
        }
    }

    /// Full documentation for one candidate, if it is still in the snapshot.
    pub async fn resolve_detail(&self, candidate: &CandidateRef) -> Option<Detail> {
        let snapshot = self.store.get()?;
        let record = snapshot.find_kind(candidate.kind, &candidate.key)?;
        Some(self.formatter.format(record).await)
    }

    /// Documentation for the exact key under the cursor.
    pub async fn resolve_hover(&self, text: &str, position: Position) -> Option<HoverResult> {
        let snapshot = self.store.get()?;
        let (record, range) = resolver::hover_target(&snapshot, text, position)?;
        tracing::debug!("Hover on {}", record.key());

        let detail = self.formatter.format(record).await;
        Some(HoverResult {
            key: record.key().to_string(),
            kind: record.kind(),
            documentation: detail.documentation,
            range,
        })
    }

    /// Fuzzy search over cached keys, outside any document context.
    pub fn search(&self, query: &str, kind: Option<RecordKind>, limit: usize) -> SearchResult {
        let results = match self.store.get() {
            Some(snapshot) => {
                let candidates = snapshot.records(kind);
                self.fuzzy
                    .search(&candidates, query)
                    .into_iter()
                    .take(limit)
                    .map(|hit| SearchEntry {
                        key: candidates[hit.index].key().to_string(),
                        kind: candidates[hit.index].kind(),
                        distance: hit.distance,
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        SearchResult {
            query: query.to_string(),
            results,
        }
    }

    pub fn status(&self) -> StatusReport {
        match self.store.get() {
            Some(snapshot) => StatusReport {
                populated: true,
                deciders: snapshot.deciders.len(),
                experiments: snapshot.experiments.len(),
                last_updated: chrono::DateTime::from_timestamp_millis(snapshot.last_updated)
                    .map(|dt| dt.to_rfc3339()),
            },
            None => StatusReport {
                populated: false,
                deciders: 0,
                experiments: 0,
                last_updated: None,
            },
        }
    }
}
