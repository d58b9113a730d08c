//! Background purge of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::chain::TileCache;

/// Default interval between purge passes.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodically calls [`TileCache::purge_expired`] until cancelled.
#[derive(Debug)]
pub struct PurgeDaemon {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl PurgeDaemon {
    /// Spawns the daemon on the current runtime. The first pass runs one
    /// `interval` after start.
    pub fn spawn(cache: Arc<TileCache>, interval: Duration, shutdown: CancellationToken) -> Self {
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            run(cache, interval, token).await;
        });
        info!(interval_secs = interval.as_secs(), "Cache purge daemon started");
        Self { handle, shutdown }
    }

    /// Stops the daemon and waits for an in-progress pass to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

async fn run(cache: Arc<TileCache>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Cache purge daemon shutting down");
                break;
            }
            _ = ticker.tick() => {
                let result = cache.purge_expired().await;
                if result.entries_removed > 0 {
                    info!(
                        entries_removed = result.entries_removed,
                        bytes_freed = result.bytes_freed,
                        "Cache purge complete"
                    );
                }
            }
        }
    }
}
