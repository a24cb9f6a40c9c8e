use super::{get_json, RecordSource};
use crate::error::{Error, Result};
use crate::model::{Decider, Experiment};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

/// Deciders/experiments API: `GET <base>/api/<resource>` answering `{"data": [...]}`.
pub struct CapiProvider {
    client: reqwest::Client,
    base_url: Url,
    /// Extra query parameters (field selection) sent with every list request
    fields: Vec<(String, String)>,
}

impl CapiProvider {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::fetch(base_url, e))?;
        Ok(Self {
            client,
            base_url,
            fields: Vec::new(),
        })
    }

    pub fn with_fields(mut self, fields: &[(&str, &str)]) -> Self {
        self.fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    fn resource_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.join(path).map_err(|e| Error::fetch(path, e))?;
        if !self.fields.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.fields {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.resource_url(path)?;
        let body = get_json(&self.client, url, path).await?;
        parse_envelope(body, path)
    }
}

#[async_trait]
impl RecordSource for CapiProvider {
    async fn fetch_deciders(&self) -> Result<Vec<Decider>> {
        let deciders = self.fetch_list("api/deciders").await?;
        Ok(launched_only(deciders))
    }

    async fn fetch_experiments(&self) -> Result<Vec<Experiment>> {
        self.fetch_list("api/experiments").await
    }
}

/// Decode the `{"data": [...]}` envelope.
///
/// The older `{"result": {"data": [...]}}` shape is rejected rather than
/// silently unwrapped.
pub fn parse_envelope<T: DeserializeOwned>(body: serde_json::Value, path: &str) -> Result<Vec<T>> {
    let serde_json::Value::Object(mut envelope) = body else {
        return Err(Error::fetch(path, "response is not a JSON object"));
    };

    let data = match envelope.remove("data") {
        Some(data) => data,
        None if envelope.contains_key("result") => {
            return Err(Error::fetch(
                path,
                "missing `data` (legacy `result.data` envelope is not supported)",
            ))
        }
        None => return Err(Error::fetch(path, "missing `data`")),
    };

    serde_json::from_value(data).map_err(|e| Error::fetch(path, e))
}

/// Drop deciders that have not launched (`currentValue` absent or -1).
pub fn launched_only(deciders: Vec<Decider>) -> Vec<Decider> {
    deciders.into_iter().filter(Decider::is_launched).collect()
}
