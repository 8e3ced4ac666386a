use crate::response::CallResult;
use std::time::Duration;
use thiserror::Error;

/// A parameter value the wire format cannot represent.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot encode parameter `{key}`: unsupported {kind}")]
pub struct EncodeError {
    pub key: String,
    pub kind: &'static str,
}

impl EncodeError {
    pub fn new(key: impl Into<String>, kind: &'static str) -> Self {
        Self { key: key.into(), kind }
    }
}

/// Failure of a whole network exchange, as reported by a [`Transport`](crate::transport::Transport).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}: {1}")]
    Status(u16, String),

    #[error("{0}")]
    General(String),
}

impl From<String> for TransportError {
    fn from(value: String) -> Self {
        TransportError::General(value)
    }
}

impl From<&str> for TransportError {
    fn from(value: &str) -> Self {
        TransportError::General(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid method name `{0}`")]
    InvalidMethod(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed response body: {0}")]
    Protocol(String),

    #[error("call failed with stat `{}`", .0.stat.as_deref().unwrap_or_default())]
    Application(CallResult),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a tokio runtime is required to schedule batch flushes")]
    NoRuntime,

    #[error("the call was dropped before being settled")]
    Dropped,
}

impl Error {
    /// The application result carried by a rejected call, if any.
    pub fn application_result(&self) -> Option<&CallResult> {
        match self {
            Error::Application(result) => Some(result),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}
