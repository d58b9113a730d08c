//! The tile engine facade.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{PurgeDaemon, PurgeResult, TileCache};
use crate::config::{EngineConfig, DEFAULT_FETCH_CONCURRENCY};
use crate::coord::Projection;
use crate::fetch::{FetchError, LatencyBudget, RequestCoalescer, TileFetcher};
use crate::provider::{
    Credentials, HttpTransport, ProviderRegistry, ReqwestTransport, TileProvider,
};
use crate::region::{MapBlock, RegionBuild, RegionBuilder, RegionRequest, DEFAULT_DEBOUNCE_WINDOW};
use crate::telemetry::{EngineMetrics, TelemetrySnapshot};

use super::error::EngineError;
use super::loaded::{BlockFailure, LoadedRegion};

/// Builds regions for one provider and loads their imagery through the
/// cache chain and the network.
///
/// ```text
/// RegionRequest ──► RegionBuilder ──► RegionBuild
///                                        │ blocks
///                                        ▼
///                   TileCache ──miss──► RequestCoalescer ──► TileFetcher
///                      ▲                                         │
///                      └──────────────── write-back ◄────────────┘
/// ```
pub struct TileEngine<T: HttpTransport = ReqwestTransport> {
    builder: RegionBuilder,
    fetcher: TileFetcher<T>,
    cache: Arc<TileCache>,
    coalescer: RequestCoalescer,
    metrics: Arc<EngineMetrics>,
    budget: LatencyBudget,
    concurrency: usize,
    debounce: Duration,
    last_build: Mutex<Option<RegionBuild>>,
    shutdown: CancellationToken,
    purge_daemon: Option<PurgeDaemon>,
}

impl TileEngine<ReqwestTransport> {
    /// Creates an engine from configuration: the provider through
    /// `registry`, an HTTP transport, the cache tiers and, if configured,
    /// the purge daemon.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn from_config(
        config: &EngineConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, EngineError> {
        let provider = registry.create(&config.provider)?;
        let transport = Arc::new(ReqwestTransport::with_user_agent(&config.fetch.user_agent)?);
        let cache = Arc::new(TileCache::from_configs(&config.cache.tiers).await?);

        let mut engine = Self::new(provider, transport, cache)
            .with_latency_budget(config.fetch.latency_budget())
            .with_concurrency(config.fetch.concurrency)
            .with_debounce(config.region.debounce);
        if let Some(interval) = config.cache.purge_interval {
            engine.start_purge_daemon(interval);
        }

        info!(
            provider = engine.provider().name(),
            tiers = config.cache.tiers.len(),
            concurrency = engine.concurrency,
            "Tile engine started"
        );
        Ok(engine)
    }
}

impl<T: HttpTransport> TileEngine<T> {
    pub fn new(provider: Arc<dyn TileProvider>, transport: Arc<T>, cache: Arc<TileCache>) -> Self {
        let projection = Arc::new(provider.projection().clone());
        Self {
            builder: RegionBuilder::new(projection),
            fetcher: TileFetcher::new(provider, transport),
            cache,
            coalescer: RequestCoalescer::new(),
            metrics: Arc::new(EngineMetrics::new()),
            budget: LatencyBudget::Default,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            debounce: DEFAULT_DEBOUNCE_WINDOW,
            last_build: Mutex::new(None),
            shutdown: CancellationToken::new(),
            purge_daemon: None,
        }
    }

    pub fn with_latency_budget(mut self, budget: LatencyBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Maximum block retrievals in flight for one load; at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Starts purging expired cache entries every `interval` until the
    /// engine shuts down. Replaces a daemon started earlier.
    pub fn start_purge_daemon(&mut self, interval: Duration) {
        let daemon = PurgeDaemon::spawn(
            Arc::clone(&self.cache),
            interval,
            self.shutdown.child_token(),
        );
        if let Some(previous) = self.purge_daemon.replace(daemon) {
            tokio::spawn(previous.shutdown());
        }
    }

    pub fn provider(&self) -> &Arc<dyn TileProvider> {
        self.fetcher.provider()
    }

    pub fn projection(&self) -> &Projection {
        self.builder.projection()
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn latency_budget(&self) -> LatencyBudget {
        self.budget
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce
    }

    /// Token cancelled when the engine shuts down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Offers credentials to the provider.
    pub fn authenticate(&self, credentials: &Credentials) -> bool {
        let accepted = self.provider().authenticate(credentials);
        if !accepted {
            warn!(provider = self.provider().name(), "Provider rejected credentials");
        }
        accepted
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// The most recent build returned by [`TileEngine::build`].
    pub fn last_build(&self) -> Option<RegionBuild> {
        self.last_build.lock().clone()
    }

    /// Builds the region for `request`, classifying it against the previous
    /// build. Never fails; clamping is reported in the build's warnings.
    pub fn build(&self, request: &RegionRequest) -> RegionBuild {
        let mut last = self.last_build.lock();
        let build = self.builder.build(request, last.as_ref());
        *last = Some(build.clone());
        drop(last);

        self.metrics.build_completed();
        build
    }

    /// Loads the imagery of every block in `build`.
    ///
    /// Each block is looked up in the cache first; misses are fetched (one
    /// fetch per fragment id across concurrent loads) and written back.
    /// Up to the configured concurrency of retrievals run at once. Results
    /// are returned in grid order; failures are listed per block.
    #[instrument(level = "debug", skip_all, fields(blocks = build.blocks.len(), change = ?build.change))]
    pub async fn load(&self, build: &RegionBuild, cancel: &CancellationToken) -> LoadedRegion {
        let style = build.map_style();
        let retrievals: Vec<_> = build
            .blocks
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, block)| async move {
                let result = self.retrieve(&block, style, cancel).await;
                (position, block, result)
            })
            .collect();
        let mut results: Vec<(usize, MapBlock, Result<Bytes, FetchError>)> = stream::iter(retrievals)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(position, _, _)| *position);

        let mut blocks = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (_, mut block, result) in results {
            match result {
                Ok(data) => block.set_image(data),
                Err(error) => failures.push(BlockFailure {
                    fragment_id: block.fragment_id().to_string(),
                    error,
                }),
            }
            blocks.push(block);
        }

        let cancelled = cancel.is_cancelled();
        let loaded = LoadedRegion {
            blocks,
            failures,
            offset: build.offset,
            rotation: build.rotation,
            change: build.change,
            cancelled,
        };
        debug!(
            loaded = loaded.loaded_count(),
            failed = loaded.failures.len(),
            cancelled,
            "Region load finished"
        );
        loaded
    }

    /// Builds the region for `request` and loads it.
    pub async fn request(&self, request: &RegionRequest, cancel: &CancellationToken) -> LoadedRegion {
        let build = self.build(request);
        self.load(&build, cancel).await
    }

    /// Retrieves one block: already attached imagery, then the cache, then
    /// a coalesced fetch whose result is written back to the cache.
    async fn retrieve(
        &self,
        block: &MapBlock,
        style: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        if let Some(image) = block.image() {
            return Ok(image.clone());
        }

        let key = block.fragment_id();
        if let Some(hit) = self.cache.load(key).await {
            self.metrics.cache_hit();
            return Ok(hit.data);
        }
        self.metrics.cache_miss();

        let outcome = self
            .coalescer
            .run(key, cancel, || async move {
                self.metrics.fetch_started();
                let result = self.fetcher.fetch(block, style, self.budget, cancel).await;
                match &result {
                    Ok(data) => {
                        self.metrics.fetch_succeeded(data.len() as u64);
                        self.cache.store(key, data.clone()).await;
                    }
                    Err(FetchError::Cancelled) => self.metrics.fetch_cancelled(),
                    Err(_) => self.metrics.fetch_failed(),
                }
                result
            })
            .await;

        if outcome.shared {
            self.metrics.coalesced_wait();
        }
        outcome.result
    }

    /// Purges expired entries from every cache tier now.
    pub async fn purge_expired(&self) -> PurgeResult {
        self.cache.purge_expired().await
    }

    /// Stops background work and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(daemon) = self.purge_daemon.take() {
            daemon.shutdown().await;
        }
        info!("Tile engine shut down");
    }
}

impl<T: HttpTransport> Drop for TileEngine<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<T: HttpTransport> std::fmt::Debug for TileEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileEngine")
            .field("provider", &self.provider().name())
            .field("cache", &self.cache)
            .field("budget", &self.budget)
            .field("concurrency", &self.concurrency)
            .field("coalescer", &self.coalescer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryTier, Quota};
    use crate::coord::LatLong;
    use crate::provider::{
        MockReply, MockTransport, ProviderSettings, XyzTemplateProvider, XYZ_TEMPLATE_KIND,
    };
    use crate::region::ChangeKind;

    fn engine(transport: MockTransport) -> (TileEngine<MockTransport>, Arc<MockTransport>) {
        let settings =
            ProviderSettings::new(XYZ_TEMPLATE_KIND, "test", "http://tiles.test/{z}/{x}/{y}");
        let provider: Arc<dyn TileProvider> =
            Arc::new(XyzTemplateProvider::from_settings(&settings).unwrap());
        let transport = Arc::new(transport);
        let cache = Arc::new(TileCache::new(vec![Arc::new(MemoryTier::new(
            "memory",
            Quota::unlimited(),
        ))]));
        (
            TileEngine::new(provider, Arc::clone(&transport), cache),
            transport,
        )
    }

    /// 512×512 view at scale 1 covers the whole 2×2 world.
    fn world_request() -> RegionRequest {
        RegionRequest::new(LatLong::new(0.0, 0.0), 512, 512, 1)
    }

    #[tokio::test]
    async fn test_request_loads_every_block_in_grid_order() {
        let (engine, transport) = engine(MockTransport::new(MockReply::ok(b"tile")));

        let loaded = engine
            .request(&world_request(), &CancellationToken::new())
            .await;

        assert_eq!(loaded.change, ChangeKind::LoadRequired);
        assert_eq!(loaded.blocks.len(), 4);
        assert!(loaded.is_complete());
        assert!(loaded.failures.is_empty());
        assert_eq!(transport.calls(), 4);

        let positions: Vec<(usize, usize)> = loaded
            .blocks
            .iter()
            .filter_map(MapBlock::as_tile)
            .map(|tile| (tile.grid_row, tile.grid_column))
            .collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[tokio::test]
    async fn test_second_load_served_from_cache() {
        let (engine, transport) = engine(MockTransport::new(MockReply::ok(b"tile")));
        let cancel = CancellationToken::new();

        engine.request(&world_request(), &cancel).await;
        let again = engine.request(&world_request(), &cancel).await;

        assert_eq!(again.change, ChangeKind::NoChange);
        assert!(again.is_complete());
        assert_eq!(transport.calls(), 4);

        let telemetry = engine.telemetry();
        assert_eq!(telemetry.cache_misses, 4);
        assert_eq!(telemetry.cache_hits, 4);
        assert_eq!(telemetry.fetches_succeeded, 4);
        assert_eq!(telemetry.bytes_downloaded, 16);
    }

    #[tokio::test]
    async fn test_failures_reported_per_block() {
        let (engine, transport) = engine(MockTransport::new(MockReply::ok(b"tile")));
        transport.reply("http://tiles.test/1/0/0", MockReply::status(404));

        let loaded = engine
            .request(&world_request(), &CancellationToken::new())
            .await;

        assert_eq!(loaded.loaded_count(), 3);
        assert_eq!(loaded.failures.len(), 1);
        let failed = &loaded.failures[0];
        assert!(matches!(failed.error, FetchError::Status { status: 404, .. }));
        assert!(loaded.failure(&failed.fragment_id).is_some());
        assert_eq!(engine.telemetry().fetches_failed, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (engine, transport) = engine(MockTransport::new(MockReply::status(503)));
        let cancel = CancellationToken::new();

        let build = engine.build(&world_request());
        engine.load(&build, &cancel).await;
        engine.load(&build, &cancel).await;

        assert_eq!(transport.calls(), 8);
        assert_eq!(engine.cache().stats()[0].stats.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_load_stores_nothing() {
        let (engine, _transport) = engine(MockTransport::new(MockReply::Hang));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let loaded = engine.request(&world_request(), &cancel).await;

        assert!(loaded.cancelled);
        assert_eq!(loaded.loaded_count(), 0);
        assert!(loaded
            .failures
            .iter()
            .all(|failure| failure.error == FetchError::Cancelled));
        assert_eq!(engine.cache().stats()[0].stats.entries, 0);
        assert_eq!(engine.telemetry().fetches_cancelled, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_loads_share_fetches() {
        let (engine, transport) = engine(
            MockTransport::new(MockReply::ok(b"tile")).with_delay(Duration::from_millis(50)),
        );
        let engine = Arc::new(engine);
        let build = engine.build(&world_request());
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(engine.load(&build, &cancel), engine.load(&build, &cancel));

        assert!(first.is_complete());
        assert!(second.is_complete());
        assert_eq!(transport.calls(), 4);
        assert_eq!(engine.telemetry().coalesced_waits, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_budget_applies() {
        let (engine, _transport) = engine(
            MockTransport::new(MockReply::ok(b"tile")).with_delay(Duration::from_secs(5)),
        );
        let engine = engine.with_latency_budget(LatencyBudget::from_millis(100));

        let loaded = engine
            .request(&world_request(), &CancellationToken::new())
            .await;
        assert_eq!(loaded.failures.len(), 4);
        assert!(loaded
            .failures
            .iter()
            .all(|failure| matches!(failure.error, FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_view_loads_nothing() {
        let (engine, transport) = engine(MockTransport::new(MockReply::ok(b"tile")));
        let request = RegionRequest::new(LatLong::new(0.0, 0.0), 0, 100, 3);

        let loaded = engine.request(&request, &CancellationToken::new()).await;
        assert_eq!(loaded.change, ChangeKind::Empty);
        assert!(loaded.blocks.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_build_remembers_last() {
        let (engine, _transport) = engine(MockTransport::new(MockReply::ok(b"tile")));
        assert!(engine.last_build().is_none());
        let build = engine.build(&world_request());
        assert_eq!(engine.last_build(), Some(build));
        assert_eq!(engine.telemetry().builds, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_purge_daemon() {
        let (mut engine, _transport) = engine(MockTransport::new(MockReply::ok(b"tile")));
        engine.start_purge_daemon(Duration::from_secs(60));
        let token = engine.shutdown_token().clone();
        engine.shutdown().await;
        assert!(token.is_cancelled());
    }
}
