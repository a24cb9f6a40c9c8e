//! Error kinds shared by the fetch, storage, and formatting layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, non-2xx status, or a body that is not the expected JSON.
    #[error("fetch failed for {path}: {reason}")]
    FetchFailed { path: String, reason: String },

    /// The ramp-history lookup did not answer before its deadline.
    #[error("ramp lookup for {key} timed out after {timeout_ms}ms")]
    RampLookupTimeout { key: String, timeout_ms: u64 },

    /// Reading or writing durable state failed.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fetch(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::FetchFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::PersistenceUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::PersistenceUnavailable(format!("invalid stored snapshot: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failed_names_path() {
        let err = Error::fetch("api/deciders", "HTTP 502 Bad Gateway");
        assert_eq!(
            err.to_string(),
            "fetch failed for api/deciders: HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn sqlite_errors_are_persistence_errors() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::PersistenceUnavailable(_)));
    }
}
