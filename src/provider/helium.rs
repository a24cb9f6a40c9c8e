use super::{get_json, RampSource};
use crate::error::{Error, Result};
use crate::model::RampGroup;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

const PATH: &str = "config_history";

/// Experiment config-history endpoint, queried for the latest ramp.
pub struct HeliumProvider {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Deserialize)]
struct ConfigHistory {
    data: Vec<ConfigEntry>,
}

#[derive(Deserialize)]
struct ConfigEntry {
    /// Kept in response order (serde_json `preserve_order`)
    group_ranges: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct GroupRange {
    percent: f64,
}

impl HeliumProvider {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| Error::fetch(endpoint, e))?;
        Ok(Self { client, endpoint })
    }

    fn history_url(&self, experiment_key: &str) -> Url {
        let params = serde_json::json!({
            "experiment": experiment_key,
            "with_filters": true,
            "limit": 1,
        });
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("params", &params.to_string());
        url
    }
}

#[async_trait]
impl RampSource for HeliumProvider {
    async fn fetch_ramp(&self, experiment_key: &str) -> Result<Vec<RampGroup>> {
        let body = get_json(&self.client, self.history_url(experiment_key), PATH).await?;
        parse_ramp(body)
    }
}

/// Groups of the most recent config entry, in the order the server lists them.
pub fn parse_ramp(body: serde_json::Value) -> Result<Vec<RampGroup>> {
    let history: ConfigHistory = serde_json::from_value(body).map_err(|e| Error::fetch(PATH, e))?;
    let latest = history
        .data
        .into_iter()
        .next()
        .ok_or_else(|| Error::fetch(PATH, "no config history entries"))?;

    latest
        .group_ranges
        .into_iter()
        .map(|(name, range)| {
            let range: GroupRange =
                serde_json::from_value(range).map_err(|e| Error::fetch(PATH, e))?;
            Ok(RampGroup {
                name,
                fraction: range.percent,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_server::{client, serve_once};
    use serde_json::json;

    #[test]
    fn parses_latest_group_ranges() {
        let body = json!({
            "data": [{
                "group_ranges": {
                    "treatment": {"percent": 0.25},
                    "control": {"percent": 0.25},
                }
            }]
        });
        let groups = parse_ramp(body).unwrap();
        assert_eq!(
            groups,
            vec![
                RampGroup { name: "treatment".to_string(), fraction: 0.25 },
                RampGroup { name: "control".to_string(), fraction: 0.25 },
            ]
        );
    }

    #[test]
    fn group_order_follows_response_text() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"data":[{"group_ranges":{"zeta":{"percent":0.1},"alpha":{"percent":0.2},"mid":{"percent":0.3}}}]}"#,
        )
        .unwrap();
        let names: Vec<_> = parse_ramp(body)
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn malformed_group_is_an_error() {
        let body = json!({"data": [{"group_ranges": {"control": {"share": 1}}}]});
        assert!(matches!(parse_ramp(body), Err(Error::FetchFailed { .. })));
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(matches!(
            parse_ramp(json!({"data": []})),
            Err(Error::FetchFailed { .. })
        ));
    }

    #[test]
    fn query_carries_experiment_key() {
        let provider =
            HeliumProvider::new(client(), "https://helium.example/ds/config_history/").unwrap();
        let url = provider.history_url("exp_one");
        let (name, value) = url.query_pairs().next().unwrap();
        assert_eq!(name, "params");
        let params: serde_json::Value = serde_json::from_str(&value).unwrap();
        assert_eq!(params["experiment"], "exp_one");
        assert_eq!(params["limit"], 1);
    }

    #[tokio::test]
    async fn fetches_over_http() {
        let (base, _request) =
            serve_once(200, r#"{"data":[{"group_ranges":{"treatment":{"percent":0.1234}}}]}"#).await;
        let provider = HeliumProvider::new(client(), &base).unwrap();

        let groups = provider.fetch_ramp("exp_one").await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "treatment");
    }
}
