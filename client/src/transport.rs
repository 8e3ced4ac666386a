use crate::error::TransportError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::{fmt::Debug, sync::Arc, time::Duration};

pub const CLIENT_ID_HEADER: &str = "X-Client-Id";
pub const CLIENT_SECRET_HEADER: &str = "X-Client-Secret";

/// Everything a transport needs to perform one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRequest {
    /// Endpoint with its query string.
    pub url: String,
    /// Framed batch body, to be sent as a POST payload.
    pub body: String,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    /// Caller supplied headers.
    pub headers: IndexMap<String, String>,
    pub timeout: Duration,
}

impl ExchangeRequest {
    /// All headers to send: client id and secret first, caller headers after.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let client_id = self.client_id.as_deref().map(|x| (CLIENT_ID_HEADER, x));
        let secret = self.secret.as_deref().map(|x| (CLIENT_SECRET_HEADER, x));
        client_id.into_iter().chain(secret).chain(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Performs the actual network exchange of a batch.
///
/// Implementations return the raw response body, or fail the exchange as a whole.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn exchange(&self, request: ExchangeRequest) -> Result<String, TransportError>;
}

pub type DynTransport = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_order() {
        let mut headers = IndexMap::new();
        headers.insert("Cookie".to_string(), "sid=1".to_string());
        let request = ExchangeRequest {
            url: "http://x".to_string(),
            body: "\n".to_string(),
            client_id: Some("app".to_string()),
            secret: None,
            headers,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.headers().collect::<Vec<_>>(), vec![(CLIENT_ID_HEADER, "app"), ("Cookie", "sid=1")]);
    }
}
