//! Client
//!
//! Blocking HTTP access to the aggregator endpoints. Each call maps a
//! failed outcome into a typed error; callers decide what a failure means
//! for a node's visual status. Fetches carry a fixed timeout matching the
//! aggregator's own outbound timeout.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::feed::QueryEvent;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum FetchError {
    /// Non-success HTTP status.
    Http(u16),
    /// Network-level failure (connect, timeout, ...).
    Transport(String),
    /// Body was not the expected shape.
    Payload(String),
    /// The payload itself carried an error field.
    Api(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FetchError::Http(status) => write!(f, "http status {}", status),
            FetchError::Transport(e) => write!(f, "transport error: {}", e),
            FetchError::Payload(e) => write!(f, "malformed payload: {}", e),
            FetchError::Api(e) => write!(f, "aggregator error: {}", e),
        }
    }
}

/// `init` response: the session config plus a first data payload so the
/// dashboard can draw before the first scheduled poll.
#[derive(Debug, Clone)]
pub struct InitPayload {
    pub config: Config,
    pub data: HashMap<String, Value>,
}

#[derive(Clone)]
pub struct Client {
    base: String,
    http: reqwest::blocking::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Client, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Client {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        resp.json().map_err(|e| FetchError::Payload(e.to_string()))
    }

    /// One-shot startup fetch: `{config, data}`.
    pub fn init(&self) -> Result<InitPayload, FetchError> {
        let body = self.get_json("init")?;
        let config = body
            .get("config")
            .cloned()
            .ok_or_else(|| FetchError::Payload("init response missing config".into()))?;
        let config = serde_json::from_value(config)
            .map_err(|e| FetchError::Payload(e.to_string()))?;
        let data = match body.get("data") {
            Some(data) => data_map(data.clone())?,
            None => HashMap::new(),
        };
        Ok(InitPayload { config, data })
    }

    pub fn config(&self) -> Result<Config, FetchError> {
        serde_json::from_value(self.get_json("config")?)
            .map_err(|e| FetchError::Payload(e.to_string()))
    }

    /// Per-node raw summary payloads, keyed by node name.
    pub fn data(&self) -> Result<HashMap<String, Value>, FetchError> {
        data_map(self.get_json("data")?)
    }

    /// Recent query events per node, freshest-first as delivered.
    /// Malformed individual entries are skipped rather than failing the
    /// whole poll.
    pub fn queries(&self, length: usize) -> Result<HashMap<String, Vec<QueryEvent>>, FetchError> {
        let body = self.get_json(&format!("queries?length={}", length))?;
        let map = match body {
            Value::Object(map) => map,
            other => {
                return Err(FetchError::Payload(format!(
                    "queries response is not an object: {}",
                    other
                )))
            }
        };
        let mut out = HashMap::new();
        for (node, events) in map {
            let events = match events {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
                _ => Vec::new(),
            };
            out.insert(node, events);
        }
        Ok(out)
    }
}

fn data_map(body: Value) -> Result<HashMap<String, Value>, FetchError> {
    match body {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(FetchError::Payload(format!(
            "data response is not an object: {}",
            other
        ))),
    }
}

/// Pulls one node's payload out of a `data` response. A missing node or a
/// payload-embedded `error` member counts as a failed fetch for that node
/// alone; other nodes are unaffected.
pub fn node_payload<'a>(
    data: &'a HashMap<String, Value>,
    node: &str,
) -> Result<&'a Value, FetchError> {
    let payload = data
        .get(node)
        .ok_or_else(|| FetchError::Payload(format!("no payload for node {}", node)))?;
    if let Some(error) = payload.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::Api(message));
    }
    Ok(payload)
}
