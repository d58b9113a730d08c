//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tileview::coord::LatLong;
use tileview::provider::{ProviderSettings, XYZ_TEMPLATE_KIND};
use tileview::region::RegionRequest;

/// Minimal HTTP/1.1 tile server on a loopback port.
///
/// Routes by the scale segment of `/{z}/{x}/{y}`:
/// - `1`: 200 with body `tile-{z}-{x}-{y}`
/// - `2`: 404
/// - `3`: never answers
/// - `4`: declares 100 bytes, sends 4, closes
pub struct TileServer {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TileServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let _ = serve(stream, counter).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url_template(&self) -> String {
        format!("http://{}/{{z}}/{{x}}/{{y}}", self.addr)
    }

    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings::new(XYZ_TEMPLATE_KIND, "local", self.url_template())
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for TileServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, requests: Arc<AtomicUsize>) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    requests.fetch_add(1, Ordering::SeqCst);

    let head = String::from_utf8_lossy(&buffer);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match segments.first().copied() {
        Some("1") => {
            let body = format!("tile-{}", segments.join("-"));
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await?;
        }
        Some("3") => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Some("4") => {
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshor")
                .await?;
        }
        _ => {
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await?;
        }
    }
    stream.shutdown().await
}

/// View covering the whole world at `scale`: `2^scale` tiles per side.
pub fn world_request(scale: i32) -> RegionRequest {
    let side = 256u32 << scale;
    RegionRequest::new(LatLong::new(0.0, 0.0), side, side, scale)
}
