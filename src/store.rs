//! The cached snapshot of deciders and experiments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::STATE_KEY;
use crate::db::StateStorage;
use crate::error::Result;
use crate::model::{RefreshSummary, Snapshot};
use crate::provider::RecordSource;

/// Owns the current snapshot and replaces it wholesale on refresh.
pub struct RecordStore {
    source: Arc<dyn RecordSource + Send + Sync>,
    storage: Arc<dyn StateStorage>,
    current: RwLock<Option<Arc<Snapshot>>>,
    /// Persisted state is read at most once per process
    load_attempted: AtomicBool,
}

impl RecordStore {
    pub fn new(
        source: Arc<dyn RecordSource + Send + Sync>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            source,
            storage,
            current: RwLock::new(None),
            load_attempted: AtomicBool::new(false),
        }
    }

    /// The current snapshot, loading the persisted one on first use.
    ///
    /// Never fetches. Unreadable or undecodable state counts as absent, and
    /// is not retried until a refresh supplies a snapshot.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        if let Some(snapshot) = self.cached() {
            return Some(snapshot);
        }
        if self.load_attempted.swap(true, Ordering::AcqRel) {
            return None;
        }

        let loaded = match self.load_persisted() {
            Ok(Some(snapshot)) => Arc::new(snapshot),
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Could not read cached snapshot: {}", e);
                return None;
            }
        };

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        // A refresh may have landed while we were reading storage
        Some(Arc::clone(current.get_or_insert(loaded)))
    }

    /// Fetch both lists concurrently and replace the snapshot as one unit.
    ///
    /// On any failure the stored and in-memory snapshots are left as they were.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let (deciders, experiments) = tokio::try_join!(
            self.source.fetch_deciders(),
            self.source.fetch_experiments()
        )?;

        let previous = self.get().map_or(0, |s| s.last_updated);
        let last_updated = chrono::Utc::now().timestamp_millis().max(previous + 1);

        let snapshot = Snapshot {
            deciders,
            experiments,
            last_updated,
        };
        let encoded = serde_json::to_string(&snapshot)?;
        self.storage.write(STATE_KEY, &encoded)?;

        let summary = RefreshSummary {
            deciders: snapshot.deciders.len(),
            experiments: snapshot.experiments.len(),
            last_updated,
        };

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(Arc::new(snapshot));

        tracing::info!(
            "Cache updated: {} deciders, {} experiments",
            summary.deciders,
            summary.experiments
        );
        Ok(summary)
    }

    fn cached(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn load_persisted(&self) -> Result<Option<Snapshot>> {
        match self.storage.read(STATE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
