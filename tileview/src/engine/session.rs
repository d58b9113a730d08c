//! Debounced, cancel-on-supersede view loading.
//!
//! ```text
//! submit(req) ──► Debouncer ──settled──► build ──► load ──► results
//!                                          ▲         │
//!                                          └─ newer request cancels
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::provider::HttpTransport;
use crate::region::{ChangeKind, Debouncer, RegionRequest};

use super::loaded::LoadedRegion;
use super::tile_engine::TileEngine;

const RESULT_CAPACITY: usize = 4;

/// A stream of view requests turned into loaded regions.
///
/// Requests are debounced with the engine's window. A settled request that
/// arrives while the previous one is still loading cancels that load,
/// unless it is the same view. A view identical to the last one delivered
/// produces no result; a view whose load was cancelled is loaded again.
#[derive(Debug)]
pub struct ViewSession {
    debouncer: Debouncer<RegionRequest>,
    results: mpsc::Receiver<LoadedRegion>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ViewSession {
    pub(super) fn spawn<T: HttpTransport>(engine: Arc<TileEngine<T>>) -> Self {
        let (debouncer, settled) = Debouncer::spawn(engine.debounce_window());
        let (output, results) = mpsc::channel(RESULT_CAPACITY);
        let cancel = engine.shutdown_token().child_token();
        let task = tokio::spawn(run(engine, settled, output, cancel.clone()));
        Self {
            debouncer,
            results,
            task,
            cancel,
        }
    }

    /// Submits a view. Returns `false` once the session has stopped.
    pub fn submit(&self, request: RegionRequest) -> bool {
        self.debouncer.submit(request)
    }

    /// Next loaded region, `None` once the session has stopped.
    pub async fn next(&mut self) -> Option<LoadedRegion> {
        self.results.recv().await
    }

    /// Flushes the pending request, lets its load finish and stops.
    pub async fn close(self) {
        let Self {
            debouncer,
            mut results,
            task,
            ..
        } = self;
        debouncer.close().await;
        results.close();
        while results.recv().await.is_some() {}
        let _ = task.await;
    }

    /// Stops immediately, cancelling any in-flight load.
    pub async fn abort(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run<T: HttpTransport>(
    engine: Arc<TileEngine<T>>,
    mut settled: mpsc::Receiver<RegionRequest>,
    output: mpsc::Sender<LoadedRegion>,
    cancel: CancellationToken,
) {
    let mut pending: Option<RegionRequest> = None;
    let mut delivered: Option<RegionRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = settled.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            },
        };

        let build = engine.build(&request);
        if build.change == ChangeKind::NoChange && delivered.as_ref() == Some(&request) {
            trace!("View unchanged, nothing to load");
            continue;
        }

        let load_cancel = cancel.child_token();
        let load = engine.load(&build, &load_cancel);
        tokio::pin!(load);

        let loaded = loop {
            tokio::select! {
                loaded = &mut load => break Some(loaded),
                next = settled.recv() => match next {
                    Some(next) if next == request => {
                        trace!("Same view settled again, load continues");
                    }
                    Some(next) => {
                        debug!("View superseded, cancelling load");
                        load_cancel.cancel();
                        load.await;
                        pending = Some(next);
                        break None;
                    }
                    None => break Some(load.await),
                },
            }
        };

        match loaded {
            Some(loaded) => {
                delivered = (!loaded.cancelled).then_some(request);
                if output.send(loaded).await.is_err() {
                    break;
                }
            }
            None => delivered = None,
        }
    }
    trace!("View session stopped");
}

impl<T: HttpTransport> TileEngine<T> {
    /// Starts a [`ViewSession`] using the engine's debounce window.
    pub fn session(self: &Arc<Self>) -> ViewSession {
        ViewSession::spawn(Arc::clone(self))
    }
}
