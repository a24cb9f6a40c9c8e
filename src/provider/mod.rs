pub mod capi;
pub mod helium;

use crate::error::Result;
use crate::model::{Decider, Experiment, RampGroup};
use async_trait::async_trait;

/// Source of the decider and experiment lists.
#[async_trait]
pub trait RecordSource {
    /// Launched deciders only (`currentValue` set and not -1)
    async fn fetch_deciders(&self) -> Result<Vec<Decider>>;

    async fn fetch_experiments(&self) -> Result<Vec<Experiment>>;
}

/// Source of an experiment's current per-group ramp.
#[async_trait]
pub trait RampSource {
    async fn fetch_ramp(&self, experiment_key: &str) -> Result<Vec<RampGroup>>;
}

/// Shared reqwest client with the crate's user agent and request timeout.
pub fn build_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::config::USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| crate::error::Error::fetch("client", e))
}

/// GET `url` and decode the JSON body, mapping every failure to `FetchFailed`
/// tagged with `path`.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: url::Url,
    path: &str,
) -> Result<serde_json::Value> {
    use crate::error::Error;

    tracing::debug!("Request data from {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::fetch(path, e))?;

    if !response.status().is_success() {
        return Err(Error::fetch(path, format!("HTTP {}", response.status())));
    }

    response.json().await.map_err(|e| Error::fetch(path, e))
}
