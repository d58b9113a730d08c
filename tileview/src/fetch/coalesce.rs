//! Request coalescing for block fetches.
//!
//! Overlapping builds ask for the same fragment at the same time. Only one
//! fetch per fragment id runs; every other caller waits for its result.
//!
//! ```text
//! caller A ─┐
//!           │                         leader
//! caller B ─┼──► RequestCoalescer ──► fetch ──┐
//!           │         ▲                       │
//! caller C ─┘         └──── broadcast ◄───────┘
//! ```
//!
//! The leader's own cancellation is not shared: when the leading fetch ends
//! in [`FetchError::Cancelled`] (or its future is dropped) the waiters are
//! released and re-enter, and one of them becomes the new leader.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::FetchError;

type FetchResult = Result<Bytes, FetchError>;

struct InFlight {
    id: u64,
    sender: broadcast::Sender<FetchResult>,
}

/// Result of a coalesced fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedFetch {
    pub result: FetchResult,
    /// `true` when the result came from another caller's fetch.
    pub shared: bool,
}

enum Role {
    Leader(u64, broadcast::Sender<FetchResult>),
    Waiter(broadcast::Receiver<FetchResult>),
}

/// Removes the in-flight entry if the leader's future is dropped early.
struct LeaderGuard<'a> {
    in_flight: &'a DashMap<String, InFlight>,
    key: &'a str,
    id: u64,
    armed: bool,
}

impl LeaderGuard<'_> {
    fn release(&mut self) {
        if self.armed {
            self.armed = false;
            self.in_flight.remove_if(self.key, |_, entry| entry.id == self.id);
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tracks in-flight fetches by fragment id.
#[derive(Default)]
pub struct RequestCoalescer {
    in_flight: DashMap<String, InFlight>,
    next_id: AtomicU64,
    started: AtomicU64,
    coalesced: AtomicU64,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fetch` for `key` unless a fetch for the same key is in flight,
    /// in which case its result is awaited instead.
    ///
    /// `fetch` is called at most once. `cancel` only bounds this caller's
    /// wait; it is expected to be wired into `fetch` as well.
    pub async fn run<F, Fut>(&self, key: &str, cancel: &CancellationToken, fetch: F) -> CoalescedFetch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult>,
    {
        loop {
            let role = match self.in_flight.entry(key.to_string()) {
                Entry::Occupied(entry) => Role::Waiter(entry.get().sender.subscribe()),
                Entry::Vacant(entry) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (sender, _) = broadcast::channel(1);
                    entry.insert(InFlight {
                        id,
                        sender: sender.clone(),
                    });
                    Role::Leader(id, sender)
                }
            };

            match role {
                Role::Leader(id, sender) => {
                    self.started.fetch_add(1, Ordering::Relaxed);
                    let mut guard = LeaderGuard {
                        in_flight: &self.in_flight,
                        key,
                        id,
                        armed: true,
                    };

                    let result = fetch().await;
                    guard.release();

                    if !result.as_ref().is_err_and(FetchError::is_cancelled) {
                        let waiters = sender.send(result.clone()).unwrap_or(0);
                        if waiters > 0 {
                            debug!(key, waiters, "Broadcast fetch result to coalesced waiters");
                        }
                    }
                    return CoalescedFetch {
                        result,
                        shared: false,
                    };
                }
                Role::Waiter(mut receiver) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "Coalescing fetch, waiting for in-flight request");

                    let received = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return CoalescedFetch {
                                result: Err(FetchError::Cancelled),
                                shared: true,
                            };
                        }
                        received = receiver.recv() => received,
                    };

                    match received {
                        Ok(result) => {
                            return CoalescedFetch {
                                result,
                                shared: true,
                            }
                        }
                        Err(_) => {
                            debug!(key, "Leading fetch abandoned, re-entering");
                        }
                    }
                }
            }
        }
    }

    /// Number of fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Fetches started as leader so far.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Waits that joined another caller's fetch so far.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RequestCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.in_flight.len())
            .field("started", &self.started())
            .field("coalesced", &self.coalesced())
            .finish()
    }
}
