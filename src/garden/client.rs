//! Garden-state collaborator: which flower slots are planted.

use bevy::log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum GardenStateError {
    #[error("garden state request failed: {0}")]
    Transport(String),
    #[error("garden state request returned HTTP {0}")]
    Status(u16),
    #[error("garden state body is malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("garden state is unavailable on this platform")]
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct GardenStateRequest {
    pub slot_count: usize,
}

/// The body is trusted only as far as being a JSON object; `flowers` and its
/// entries are checked one by one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GardenStateResponse {
    #[serde(default)]
    pub flowers: Value,
}

/// Occupied slot indices from a response body, in response order.
///
/// A `flowers` value that is not an array counts as no flowers. Entries
/// without a whole-number `slot_index` are dropped, the rest are kept.
pub fn parse_garden_state(body: &str) -> Result<Vec<i64>, GardenStateError> {
    let response: GardenStateResponse = serde_json::from_str(body)?;
    let Some(flowers) = response.flowers.as_array() else {
        if !response.flowers.is_null() {
            debug!("[Garden] `flowers` is not an array; treating as empty");
        }
        return Ok(Vec::new());
    };

    Ok(flowers
        .iter()
        .filter_map(|entry| {
            let index = entry.get("slot_index").and_then(whole_number);
            if index.is_none() {
                debug!("[Garden] skipping flower entry {entry}");
            }
            index
        })
        .collect())
}

fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Anything that can answer "which of these slots are planted".
///
/// Called off the main thread, once per mount.
pub trait GardenStateSource: Send + Sync + 'static {
    fn fetch(&self, slot_count: usize) -> Result<Vec<i64>, GardenStateError>;
}

/// POSTs `{slot_count}` to the mood service.
#[derive(Debug, Clone)]
pub struct HttpGardenState {
    pub url: String,
}

impl HttpGardenState {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl GardenStateSource for HttpGardenState {
    fn fetch(&self, slot_count: usize) -> Result<Vec<i64>, GardenStateError> {
        use std::time::Duration;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GardenStateError::Transport(format!("http client init failed: {e}")))?;
        let response = client
            .post(&self.url)
            .json(&GardenStateRequest { slot_count })
            .send()
            .map_err(|e| GardenStateError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GardenStateError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .map_err(|e| GardenStateError::Transport(e.to_string()))?;
        parse_garden_state(&body)
    }
}

#[cfg(target_arch = "wasm32")]
impl GardenStateSource for HttpGardenState {
    fn fetch(&self, _slot_count: usize) -> Result<Vec<i64>, GardenStateError> {
        Err(GardenStateError::Unavailable)
    }
}
