//! Engine flow from an INI file through real HTTP and both cache tiers.
//!
//! These tests verify:
//! - configuration → engine → loaded region in grid order
//! - disk tier persistence across engine restarts
//! - per-block failures are reported and never cached
//! - a view session delivers the settled view
//!
//! Run with: `cargo test --test engine_end_to_end`

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tileview::config::EngineConfig;
use tileview::engine::TileEngine;
use tileview::fetch::FetchError;
use tileview::provider::ProviderRegistry;
use tileview::region::ChangeKind;

use common::{world_request, TileServer};

fn config(server: &TileServer, disk: &Path) -> EngineConfig {
    let text = format!(
        "[provider]\n\
         kind = xyz-template\n\
         name = local\n\
         url_template = {template}\n\
         \n\
         [fetch]\n\
         latency_budget = 2000\n\
         concurrency = 2\n\
         \n\
         [region]\n\
         debounce = 50ms\n\
         \n\
         [cache.memory]\n\
         max_size = 1MB\n\
         retention = 1h\n\
         \n\
         [cache.disk]\n\
         storage = disk\n\
         directory = {disk}\n\
         max_size = 10MB\n\
         max_entries = 100\n",
        template = server.url_template(),
        disk = disk.display(),
    );
    EngineConfig::from_ini_str(&text).unwrap()
}

async fn engine(config: &EngineConfig) -> TileEngine {
    TileEngine::from_config(config, &ProviderRegistry::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_config_to_loaded_region() {
    let server = TileServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, dir.path());
    assert_eq!(config.cache.tiers.len(), 2);

    let engine = engine(&config).await;
    let loaded = engine
        .request(&world_request(1), &CancellationToken::new())
        .await;

    assert_eq!(loaded.change, ChangeKind::LoadRequired);
    assert!(loaded.is_complete());
    let bodies: Vec<String> = loaded
        .blocks
        .iter()
        .map(|block| String::from_utf8(block.image().unwrap().to_vec()).unwrap())
        .collect();
    assert_eq!(bodies, ["tile-1-0-0", "tile-1-1-0", "tile-1-0-1", "tile-1-1-1"]);

    let stats = engine.cache().stats();
    assert_eq!(stats[0].name, "memory");
    assert_eq!(stats[0].stats.entries, 4);
    assert_eq!(stats[1].name, "disk");
    assert_eq!(stats[1].stats.entries, 4);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_disk_tier_survives_restart() {
    let server = TileServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, dir.path());

    let first = engine(&config).await;
    let loaded = first
        .request(&world_request(1), &CancellationToken::new())
        .await;
    assert!(loaded.is_complete());
    first.shutdown().await;
    assert_eq!(server.requests(), 4);

    let second = engine(&config).await;
    let reloaded = second
        .request(&world_request(1), &CancellationToken::new())
        .await;

    assert_eq!(reloaded.blocks, loaded.blocks);
    assert_eq!(server.requests(), 4);
    let telemetry = second.telemetry();
    assert_eq!(telemetry.cache_hits, 4);
    assert_eq!(telemetry.fetches_started, 0);

    // Disk hits are promoted into the fresh memory tier.
    assert_eq!(second.cache().stats()[0].stats.entries, 4);
    second.shutdown().await;
}

#[tokio::test]
async fn test_failed_blocks_are_reported_and_retried_later() {
    let server = TileServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&config(&server, dir.path())).await;

    let loaded = engine
        .request(&world_request(2), &CancellationToken::new())
        .await;
    assert_eq!(loaded.loaded_count(), 0);
    assert_eq!(loaded.failures.len(), 16);
    assert!(loaded
        .failures
        .iter()
        .all(|failure| matches!(failure.error, FetchError::Status { status: 404, .. })));
    assert!(engine.cache().stats().iter().all(|tier| tier.stats.entries == 0));

    engine.load(&engine.build(&world_request(2)), &CancellationToken::new()).await;
    assert_eq!(server.requests(), 32);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_session_delivers_settled_view() {
    let server = TileServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine(&config(&server, dir.path())).await);
    assert_eq!(engine.debounce_window(), Duration::from_millis(50));

    let mut session = engine.session();
    session.submit(world_request(2));
    session.submit(world_request(1));

    let loaded = tokio::time::timeout(Duration::from_secs(10), session.next())
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.is_complete());
    assert_eq!(loaded.blocks.len(), 4);
    assert_eq!(engine.telemetry().builds, 1);

    session.close().await;
}
