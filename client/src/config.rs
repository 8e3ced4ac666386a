use crate::{
    error::Error,
    result::Result,
    value::{ParamMap, ParamValue, merge_params},
};
use batchwire_core::time::duration_millis;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 5_000;

/// Settings of a [`Client`](crate::client::Client), fixed once the client is built.
///
/// Loadable from TOML:
///
/// ```toml
/// endpoint = "https://api.example.com/batch"
/// timeout = 3000
/// max-queue-size = 25
///
/// [query]
/// format = "json"
///
/// [params]
/// lang = "en"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// URL the batches are posted to.
    pub endpoint: String,

    /// Fixed query parameters appended to the endpoint, written without further encoding.
    pub query: IndexMap<String, String>,

    /// Fixed body parameters every call starts from.
    pub params: ParamMap,

    /// Exchange timeout in milliseconds, at least 1.
    pub timeout: u64,

    pub client_id: Option<String>,

    pub secret: Option<String>,

    /// Extra headers handed to the transport.
    pub headers: IndexMap<String, String>,

    /// Queue length that triggers an immediate flush.
    pub max_queue_size: Option<usize>,

    /// Milliseconds a batch stays open before being flushed. Zero flushes at the end of the
    /// current scheduling tick.
    pub batch_window: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            query: IndexMap::new(),
            params: ParamMap::new(),
            timeout: DEFAULT_TIMEOUT_MILLIS,
            client_id: None,
            secret: None,
            headers: IndexMap::new(),
            max_queue_size: None,
            batch_window: 0,
        }
    }
}

impl Config {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Default::default() }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be at least 1 ms".to_string()));
        }
        if self.max_queue_size == Some(0) {
            return Err(Error::Config("max-queue-size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = duration_millis(timeout);
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = Some(max_queue_size);
        self
    }

    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = duration_millis(window);
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    #[inline]
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window)
    }

    /// Parameters of a call: the fixed params as base, `call` params on top.
    pub fn merge_params(&self, call: &ParamMap) -> ParamMap {
        merge_params(&self.params, call)
    }
}
