//! Runtime configuration.
//!
//! Values come from environment variables with defaults; the CLI may override
//! individual fields after loading.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::fuzzy::DEFAULT_THRESHOLD;

pub const DEFAULT_API_URL: &str = "https://capi.pinadmin.com/";
pub const DEFAULT_RAMP_URL: &str = "https://helium.pinadmin.com/ds/experiment/config_history/";

/// Key of the single persisted state entry holding the snapshot.
pub const STATE_KEY: &str = "Pinterest";

/// Sent with every remote request.
pub const USER_AGENT: &str = concat!("decider-lens/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Config {
    /// Base of the deciders/experiments API (`<base>/api/<resource>`)
    pub api_base_url: String,
    /// Ramp-history endpoint, keyed by experiment
    pub ramp_url: String,
    /// SQLite file holding persisted state
    pub db_path: PathBuf,
    pub refresh_interval: Duration,
    /// Applies to the primary deciders/experiments requests
    pub request_timeout: Duration,
    /// Deadline for the secondary ramp lookup
    pub ramp_timeout: Duration,
    pub fuzzy_threshold: f64,
    /// How many leading lines the completion eligibility check scans
    pub eligibility_lines: usize,
    /// `EnvFilter` directives, e.g. `info` or `decider_lens=debug`
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ramp_url: DEFAULT_RAMP_URL.to_string(),
            db_path: default_db_path(),
            refresh_interval: Duration::from_secs(30 * 60),
            request_timeout: Duration::from_secs(30),
            ramp_timeout: Duration::from_millis(1000),
            fuzzy_threshold: DEFAULT_THRESHOLD,
            eligibility_lines: 100,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_base_url = env::var("DECIDER_LENS_API_URL").unwrap_or(defaults.api_base_url);
        let ramp_url = env::var("DECIDER_LENS_RAMP_URL").unwrap_or(defaults.ramp_url);
        let db_path = env::var("DECIDER_LENS_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let refresh_interval = parse_var("DECIDER_LENS_REFRESH_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_interval);
        let request_timeout = parse_var("DECIDER_LENS_REQUEST_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let ramp_timeout = parse_var("DECIDER_LENS_RAMP_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.ramp_timeout);
        let fuzzy_threshold =
            parse_var("DECIDER_LENS_FUZZY_THRESHOLD").unwrap_or(defaults.fuzzy_threshold);

        let log_level = env::var("DECIDER_LENS_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or(defaults.log_level);

        Self {
            api_base_url,
            ramp_url,
            db_path,
            refresh_interval,
            request_timeout,
            ramp_timeout,
            fuzzy_threshold,
            eligibility_lines: defaults.eligibility_lines,
            log_level,
        }
    }

    /// Log filter from `log_level`; unparseable directives fall back to `info`.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// `$HOME/.decider-lens/state.db`, or a relative path when HOME is unset.
pub fn default_db_path() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".decider-lens").join("state.db"),
        Err(_) => PathBuf::from(".decider-lens").join("state.db"),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", name, raw);
            None
        }
    }
}
