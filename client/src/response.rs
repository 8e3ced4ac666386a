use crate::{error::Error, result::Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status tag of a successful call.
pub const STAT_OK: &str = "ok";

/// Outcome of a single call, as returned by the remote service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<String>,

    #[serde(default)]
    pub result: Value,

    /// Any other field the service attached to the result (error codes, messages...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallResult {
    pub fn new(stat: Option<&str>, result: Value) -> Self {
        Self { stat: stat.map(str::to_string), result, extra: Map::new() }
    }

    /// Stands in for a call the response array has no entry for.
    pub fn missing() -> Self {
        Self::new(Some(STAT_OK), Value::Null)
    }

    /// A result without `stat`, or with `stat` equal to [`STAT_OK`], is a success.
    pub fn is_ok(&self) -> bool {
        self.stat.as_deref().is_none_or(|stat| stat == STAT_OK)
    }
}

/// Parses a response body: a JSON array of strings, each string holding one JSON encoded
/// [`CallResult`]. A failure at either level fails the whole body.
pub fn parse_response(body: &str) -> Result<Vec<CallResult>> {
    let entries: Vec<String> = serde_json::from_str(body)?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| serde_json::from_str(entry).map_err(|err| Error::Protocol(format!("entry {index}: {err}"))))
        .collect()
}
