//! Transport to the remote collector.
//!
//! The coordinator only distinguishes success from failure; the error
//! variants exist for logging.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::timeout;

/// Body key holding the ordered list of per-event objects.
pub const LOCATIONS_KEY: &str = "locations";

/// Default request timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while posting a batch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Collector answered with a non-2xx status.
    #[error("collector responded with status {0}")]
    Status(u16),

    /// Timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Client could not be built or the request was rejected locally.
    #[error("client error: {0}")]
    Client(String),
}

/// Descriptor of one outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    /// Collector endpoint.
    pub url: String,
    /// JSON body fields.
    pub body: Map<String, Value>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl PostRequest {
    /// Request carrying `events` under the `locations` key.
    pub fn locations(
        url: impl Into<String>,
        events: Vec<Value>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        let mut body = Map::new();
        body.insert(LOCATIONS_KEY.to_string(), Value::Array(events));
        Self {
            url: url.into(),
            body,
            headers,
        }
    }

    /// Events carried under the `locations` key.
    pub fn events(&self) -> &[Value] {
        self.body
            .get(LOCATIONS_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Sends request descriptors to the collector.
#[async_trait]
pub trait Poster: Send + Sync + 'static {
    /// Send one request. Any `Err` makes the caller re-buffer the batch.
    async fn post(&self, request: PostRequest) -> Result<(), TransportError>;
}

/// [`Poster`] that sends a JSON `POST` with reqwest.
#[derive(Clone)]
pub struct HttpPoster {
    client: Client,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPoster")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpPoster {
    /// Create a poster with the given request timeout.
    ///
    /// # Errors
    /// Returns `TransportError::Client` if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request_timeout,
        })
    }
}

#[async_trait]
impl Poster for HttpPoster {
    async fn post(&self, request: PostRequest) -> Result<(), TransportError> {
        let count = request.events().len();
        let mut builder = self
            .client
            .post(&request.url)
            .json(&Value::Object(request.body));

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = timeout(self.request_timeout, builder.send())
            .await
            .map_err(|_| TransportError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        tracing::debug!(url = %request.url, count, status = status.as_u16(), "Batch posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locations_request() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer token".to_string());

        let request = PostRequest::locations(
            "https://collector.example.com/locations",
            vec![json!({"latitude": 1.0}), json!({"latitude": 2.0})],
            headers,
        );

        assert_eq!(request.events().len(), 2);
        assert_eq!(request.events()[1]["latitude"], json!(2.0));
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer token")
        );
        assert_eq!(
            Value::Object(request.body.clone()),
            json!({"locations": [{"latitude": 1.0}, {"latitude": 2.0}]})
        );
    }

    #[test]
    fn test_events_missing_key() {
        let request = PostRequest {
            url: "http://localhost".to_string(),
            body: Map::new(),
            headers: BTreeMap::new(),
        };
        assert!(request.events().is_empty());
    }

    #[tokio::test]
    async fn test_http_poster_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let poster = HttpPoster::new(Duration::from_secs(2)).unwrap();
        let request =
            PostRequest::locations(format!("http://{addr}/"), vec![json!({})], BTreeMap::new());
        let result = poster.post(request).await;
        assert!(matches!(
            result,
            Err(TransportError::Request(_)) | Err(TransportError::Timeout)
        ));
    }
}
