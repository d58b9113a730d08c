//! Cancellable, latency-bounded retrieval of one block.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::provider::{HttpResponse, HttpTransport, TileProvider};
use crate::region::MapBlock;

use super::budget::LatencyBudget;
use super::error::FetchError;

/// Upper bound on the buffer pre-allocated from `Content-Length`.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// What stopped a bounded phase early.
enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl Interrupt {
    fn into_error(self, uri: &str) -> FetchError {
        match self {
            Interrupt::Cancelled => FetchError::Cancelled,
            Interrupt::TimedOut(budget) => FetchError::Timeout {
                uri: uri.to_string(),
                budget,
            },
        }
    }
}

/// Runs `work` until it finishes, the limit passes or `cancel` fires,
/// whichever comes first.
async fn bounded<F: Future>(
    limit: Option<Duration>,
    cancel: &CancellationToken,
    work: F,
) -> Result<F::Output, Interrupt> {
    let limited = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| Interrupt::TimedOut(limit)),
            None => Ok(work.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        output = limited => output,
    }
}

/// Reads the whole body, failing if it is shorter than declared.
async fn read_body(uri: &str, response: HttpResponse) -> Result<Bytes, FetchError> {
    let declared = response.content_length;
    let capacity = declared.unwrap_or(0).min(MAX_PREALLOCATION) as usize;
    let mut buffer = BytesMut::with_capacity(capacity);

    let mut body = response.body;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| FetchError::Transport {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;
        buffer.extend_from_slice(&chunk);
    }

    let received = buffer.len() as u64;
    if let Some(expected) = declared {
        if received < expected {
            return Err(FetchError::Truncated {
                uri: uri.to_string(),
                expected,
                received,
            });
        }
    }
    Ok(buffer.freeze())
}

/// Retrieves block imagery from a provider over an HTTP transport.
pub struct TileFetcher<T: HttpTransport> {
    provider: Arc<dyn TileProvider>,
    transport: Arc<T>,
}

impl<T: HttpTransport> Clone for TileFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: HttpTransport> TileFetcher<T> {
    pub fn new(provider: Arc<dyn TileProvider>, transport: Arc<T>) -> Self {
        Self {
            provider,
            transport,
        }
    }

    pub fn provider(&self) -> &Arc<dyn TileProvider> {
        &self.provider
    }

    /// Fetches the imagery of `block`.
    ///
    /// The budget bounds the request and, separately, the body read. The
    /// cancellation token is checked before any I/O and raced against both
    /// phases. Failures are returned, never retried.
    #[instrument(level = "debug", skip_all, fields(fragment = block.fragment_id()))]
    pub async fn fetch(
        &self,
        block: &MapBlock,
        style: Option<&str>,
        budget: LatencyBudget,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let request = self.provider.build_request(block, style).ok_or_else(|| {
            FetchError::RequestConstruction {
                fragment_id: block.fragment_id().to_string(),
            }
        })?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let start = Instant::now();
        let limit = budget.limit();
        let uri = request.uri.as_str();

        let response = bounded(limit, cancel, self.transport.send(&request))
            .await
            .map_err(|interrupt| interrupt.into_error(uri))?
            .map_err(|e| FetchError::Transport {
                uri: uri.to_string(),
                message: e.to_string(),
            });
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(uri, error = %e, "Fetch failed");
                return Err(e);
            }
        };

        if !response.is_success() {
            warn!(uri, status = response.status, "HTTP error status");
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: response.status,
            });
        }

        let data = bounded(limit, cancel, read_body(uri, response))
            .await
            .map_err(|interrupt| interrupt.into_error(uri))
            .and_then(|body| body);

        match &data {
            Ok(bytes) => debug!(
                uri,
                bytes = bytes.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Fetch complete"
            ),
            Err(FetchError::Cancelled) => debug!(uri, "Fetch cancelled during body read"),
            Err(e) => warn!(uri, error = %e, "Fetch failed"),
        }
        data
    }
}
