//! HTTP transport abstraction for testability

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::types::{ProviderError, RequestDescriptor};

/// Default User-Agent string for HTTP requests.
/// Required by some tile servers that reject requests without a User-Agent.
pub const DEFAULT_USER_AGENT: &str = concat!("tileview/", env!("CARGO_PKG_VERSION"));

/// Failure below the HTTP status level: DNS, connect, TLS, reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Response body delivered chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Response head plus a body that has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    /// `Content-Length` as declared by the server, if any.
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl HttpResponse {
    /// Response with an in-memory body delivered as one chunk.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for asynchronous HTTP GET operations.
///
/// Returns as soon as the response head is available so the caller can
/// bound and cancel the body read separately.
pub trait HttpTransport: Send + Sync + 'static {
    fn send(
        &self,
        request: &RequestDescriptor,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// HTTP transport implementation using reqwest.
///
/// Time limits are applied per fetch by the caller, so the client itself has
/// no overall timeout, only a connect timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default user agent.
    ///
    /// Connection pooling and TCP settings are tuned for many small parallel
    /// requests against the same host.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProviderError::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        trace!(url = %request.uri, "HTTP GET request starting");

        let mut builder = self.client.get(&request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    url = %request.uri,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(TransportError(format!("Request failed: {}", e)));
            }
        };

        let status = response.status().as_u16();
        let content_length = response.content_length();
        debug!(url = %request.uri, status, content_length, "HTTP response received");

        let body = stream::unfold(Some(response), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(response))),
                Ok(None) => None,
                Err(e) => Some((
                    Err(TransportError(format!("Failed to read response: {}", e))),
                    None,
                )),
            }
        })
        .boxed();

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Scripted reply of [`MockTransport`].
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Status and body, split into `chunk` sized pieces. `declared`
        /// overrides the advertised `Content-Length`.
        Body {
            status: u16,
            body: Bytes,
            declared: Option<u64>,
            chunk: usize,
            chunk_delay: Duration,
        },
        Error(String),
        /// Never answers.
        Hang,
    }

    impl MockReply {
        pub fn ok(body: &'static [u8]) -> Self {
            Self::Body {
                status: 200,
                body: Bytes::from_static(body),
                declared: None,
                chunk: usize::MAX,
                chunk_delay: Duration::ZERO,
            }
        }

        pub fn status(status: u16) -> Self {
            Self::Body {
                status,
                body: Bytes::new(),
                declared: None,
                chunk: usize::MAX,
                chunk_delay: Duration::ZERO,
            }
        }
    }

    /// Mock transport answering from a script keyed by URI.
    pub struct MockTransport {
        replies: Mutex<HashMap<String, MockReply>>,
        fallback: MockReply,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockTransport {
        pub fn new(fallback: MockReply) -> Self {
            Self {
                replies: Mutex::new(HashMap::new()),
                fallback,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        /// Delay before the response head is returned.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn reply(&self, uri: &str, reply: MockReply) {
            self.replies.lock().insert(uri.to_string(), reply);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpTransport for MockTransport {
        async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .get(&request.uri)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match reply {
                MockReply::Hang => futures::future::pending().await,
                MockReply::Error(message) => Err(TransportError(message)),
                MockReply::Body {
                    status,
                    body,
                    declared,
                    chunk,
                    chunk_delay,
                } => {
                    let content_length = declared.or(Some(body.len() as u64));
                    let chunk = chunk.max(1);
                    let pieces: Vec<Bytes> = (0..body.len())
                        .step_by(chunk)
                        .map(|start| body.slice(start..(start + chunk).min(body.len())))
                        .collect();
                    let body = stream::iter(pieces)
                        .then(move |piece| async move {
                            if !chunk_delay.is_zero() {
                                tokio::time::sleep(chunk_delay).await;
                            }
                            Ok(piece)
                        })
                        .boxed();
                    Ok(HttpResponse {
                        status,
                        content_length,
                        body,
                    })
                }
            }
        }
    }

    #[tokio::test]
    async fn test_mock_transport_chunks_body() {
        let transport = MockTransport::new(MockReply::Body {
            status: 200,
            body: Bytes::from_static(b"abcdefghij"),
            declared: None,
            chunk: 4,
            chunk_delay: Duration::ZERO,
        });

        let response = transport
            .send(&RequestDescriptor::get("http://tiles.test/1"))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.content_length, Some(10));

        let chunks: Vec<Bytes> = response
            .body
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].as_ref(), b"ij");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_error() {
        let transport = MockTransport::new(MockReply::Error("refused".to_string()));
        let err = transport
            .send(&RequestDescriptor::get("http://tiles.test/1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "refused");
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[test]
    fn test_response_from_bytes() {
        let response = HttpResponse::from_bytes(404, Bytes::from_static(b"missing"));
        assert!(!response.is_success());
        assert_eq!(response.content_length, Some(7));
    }
}
