//! Reconcile queue
//!
//! Requests are keyed by [`ReconcileRequest`] and coalesced:
//! - a request already waiting is not queued twice
//! - a request being processed is re-queued once, after `done()`
//! - hand-off to workers is bounded by a token bucket
//!
//! Workers loop on `get()` / `done()` until `shut_down()`.

pub mod rate_limiter;

use crate::apis::metrics::{record_queue_coalesced, set_queue_depth};
use crate::config::QueueConfig;
use common::ReconcileRequest;
use rate_limiter::TokenBucket;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Sink for reconcile requests
pub trait ReconcileQueue: Send + Sync {
    fn add(&self, request: ReconcileRequest);
}

#[derive(Debug, Default)]
struct QueueState {
    /// FIFO of requests ready to hand out
    items: VecDeque<ReconcileRequest>,
    /// Requests waiting to be processed (queued, or re-added while processing)
    dirty: HashSet<ReconcileRequest>,
    /// Requests currently held by a worker
    processing: HashSet<ReconcileRequest>,
    shutting_down: bool,
}

/// Coalescing, rate-limited work queue
pub struct GroupQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limiter: TokenBucket,
}

impl GroupQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            limiter: TokenBucket::new(config.qps, config.burst),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Queue mutex poisoned, recovering (data is still valid)");
            poisoned.into_inner()
        })
    }

    /// Number of requests ready to hand out
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Wait for the next request
    ///
    /// Returns `None` once the queue is shut down and drained. The caller
    /// must call [`GroupQueue::done`] when finished with the request.
    pub async fn get(&self) -> Option<ReconcileRequest> {
        loop {
            let notified = self.notify.notified();

            let next = {
                let mut state = self.lock();
                match state.items.pop_front() {
                    Some(request) => {
                        state.dirty.remove(&request);
                        state.processing.insert(request.clone());
                        set_queue_depth(state.items.len());
                        Some(request)
                    }
                    None if state.shutting_down => return None,
                    None => None,
                }
            };

            if let Some(request) = next {
                self.limiter.acquire().await;
                return Some(request);
            }
            notified.await;
        }
    }

    /// Mark a request as processed, re-queuing it if it was added meanwhile
    pub fn done(&self, request: &ReconcileRequest) {
        let mut state = self.lock();
        state.processing.remove(request);

        if state.dirty.contains(request) {
            state.items.push_back(request.clone());
            set_queue_depth(state.items.len());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stop accepting requests and wake every waiting worker
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        debug!("Reconcile queue shutting down");
        self.notify.notify_waiters();
    }
}

impl ReconcileQueue for GroupQueue {
    fn add(&self, request: ReconcileRequest) {
        let mut state = self.lock();
        if state.shutting_down {
            return;
        }

        if state.dirty.contains(&request) {
            record_queue_coalesced("pending");
            return;
        }
        state.dirty.insert(request.clone());

        if state.processing.contains(&request) {
            record_queue_coalesced("processing");
            return;
        }

        state.items.push_back(request);
        set_queue_depth(state.items.len());
        drop(state);
        self.notify.notify_one();
    }
}
