use std::time::Duration;

use serde_json::Value;

use crate::config::SearchConfig;
use crate::error::PipelineError;
use crate::models::{SearchHit, SearchOutcome};

/// Keys probed, in order, when the response body is an object.
const HIT_COLLECTION_KEYS: [&str; 3] = ["hits", "results", "documents"];

/// GET {base}/search?q=<query>&k=<limit>
///
/// Any transport failure, non-success status or unreadable body is a
/// `PipelineError::Network`. Zero hits come back as `SearchOutcome::Empty`.
pub async fn search(
    client: &reqwest::Client,
    config: &SearchConfig,
    query: &str,
) -> Result<SearchOutcome, PipelineError> {
    let url = format!("{}/search", config.base_url);
    let limit = config.result_limit.to_string();

    let resp = client
        .get(&url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .query(&[("q", query), ("k", limit.as_str())])
        .send()
        .await
        .map_err(|e| PipelineError::Network(format!("failed to reach search service: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(PipelineError::Network(format!(
            "search service returned {status}: {body}"
        )));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| PipelineError::Network(format!("unreadable search response: {e}")))?;

    parse_hits(body)
}

/// Extract the hit collection from a search response body.
pub fn parse_hits(body: Value) -> Result<SearchOutcome, PipelineError> {
    let hits = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => HIT_COLLECTION_KEYS
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                PipelineError::Network("unexpected response shape: no hit collection".to_string())
            })?,
        _ => {
            return Err(PipelineError::Network(
                "unexpected response shape: not an array or object".to_string(),
            ))
        }
    };

    if hits.is_empty() {
        Ok(SearchOutcome::Empty)
    } else {
        Ok(SearchOutcome::Hits(hits.into_iter().map(SearchHit).collect()))
    }
}
