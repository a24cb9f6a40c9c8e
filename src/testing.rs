//! Fixtures and fake collaborators shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::{MemoryStorage, StateStorage};
use crate::error::{Error, Result};
use crate::model::{Decider, Experiment, RampGroup, Snapshot};
use crate::provider::{RampSource, RecordSource};

pub fn decider(key: &str, value: i64) -> Decider {
    Decider {
        key: key.to_string(),
        current_value: value,
        description: None,
        owner: None,
        ldap: None,
        ldap_info: None,
        owner_info: None,
        created_at: None,
        last_updated: "2024-01-01T00:00:00".to_string(),
        url: format!("https://adminapp.example/deciders/{key}"),
    }
}

pub fn experiment(key: &str) -> Experiment {
    Experiment {
        key: key.to_string(),
        owner: None,
        creator: None,
        team: None,
        description: None,
        created_at: None,
        last_updated: "2024-01-01T00:00:00".to_string(),
        start_date: None,
        end_date: None,
        shipped_date: None,
        status: None,
        parsed_status: None,
        url: format!("https://helium.example/experiments/{key}"),
        version: None,
        doc_link: None,
        experiment_decision: None,
    }
}

pub fn snapshot(deciders: &[&str], experiments: &[&str]) -> Snapshot {
    Snapshot {
        deciders: deciders.iter().map(|k| decider(k, 50)).collect(),
        experiments: experiments.iter().map(|k| experiment(k)).collect(),
        last_updated: 1_700_000_000_000,
    }
}

/// Scriptable record source that tracks how many fetches overlap.
#[derive(Default)]
pub struct FakeSource {
    pub deciders: Mutex<Vec<Decider>>,
    pub experiments: Mutex<Vec<Experiment>>,
    pub fail_deciders: AtomicBool,
    pub fail_experiments: AtomicBool,
    pub delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new(deciders: Vec<Decider>, experiments: Vec<Experiment>) -> Self {
        Self {
            deciders: Mutex::new(deciders),
            experiments: Mutex::new(experiments),
            ..Default::default()
        }
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_deciders(&self) -> Result<Vec<Decider>> {
        self.enter().await;
        if self.fail_deciders.load(Ordering::SeqCst) {
            return Err(Error::fetch("api/deciders", "connection refused"));
        }
        Ok(self.deciders.lock().unwrap().clone())
    }

    async fn fetch_experiments(&self) -> Result<Vec<Experiment>> {
        self.enter().await;
        if self.fail_experiments.load(Ordering::SeqCst) {
            return Err(Error::fetch("api/experiments", "connection refused"));
        }
        Ok(self.experiments.lock().unwrap().clone())
    }
}

pub enum RampBehavior {
    Groups(Vec<RampGroup>),
    Fail,
    Hang(Duration),
}

pub struct FakeRamp {
    pub behavior: RampBehavior,
    pub calls: AtomicUsize,
    /// Set when a `Hang` lookup is dropped before it finishes
    pub abandoned: AtomicBool,
}

/// Flags the lookup as abandoned unless disarmed first.
struct AbandonGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

impl FakeRamp {
    pub fn new(behavior: RampBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            abandoned: AtomicBool::new(false),
        }
    }

    pub fn groups(groups: &[(&str, f64)]) -> Self {
        Self::new(RampBehavior::Groups(
            groups
                .iter()
                .map(|(name, fraction)| RampGroup {
                    name: name.to_string(),
                    fraction: *fraction,
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl RampSource for FakeRamp {
    async fn fetch_ramp(&self, _experiment_key: &str) -> Result<Vec<RampGroup>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            RampBehavior::Groups(groups) => Ok(groups.clone()),
            RampBehavior::Fail => Err(Error::fetch("config_history", "HTTP 500")),
            RampBehavior::Hang(delay) => {
                let mut guard = AbandonGuard {
                    flag: &self.abandoned,
                    armed: true,
                };
                tokio::time::sleep(*delay).await;
                guard.armed = false;
                Ok(Vec::new())
            }
        }
    }
}

/// Storage whose reads and writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub reads: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl StateStorage for FlakyStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::PersistenceUnavailable("disk unavailable".to_string()));
        }
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::PersistenceUnavailable("disk full".to_string()));
        }
        self.inner.write(key, value)
    }
}
