//! Token Bucket Rate Limiter for the reconcile queue
//!
//! Bounds how fast requests are handed to workers:
//! - Configurable rate (requests per second)
//! - Burst capacity (max tokens in bucket)
//!
//! Algorithm: https://en.wikipedia.org/wiki/Token_bucket
//!
//! Example:
//! ```rust,ignore
//! let bucket = TokenBucket::new(10.0, 100); // 10 rps, burst 100
//! bucket.acquire().await;
//! ```

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

lazy_static! {
    /// Global metrics registry for the queue rate limiter
    static ref RATE_LIMITER_REGISTRY: Registry = Registry::new();

    /// Dequeues that had to wait for a token
    #[allow(clippy::expect_used)]
    static ref RATE_LIMIT_THROTTLED_TOTAL: IntCounter = {
        let counter = IntCounter::new(
            "rauta_reconcile_queue_throttled_total",
            "Total number of dequeues delayed by the reconcile queue rate limiter",
        )
        .unwrap_or_else(|e| {
            eprintln!("WARN: Failed to create rauta_reconcile_queue_throttled_total counter: {}", e);
            #[allow(clippy::expect_used)]
            {
                IntCounter::new(
                    "rauta_reconcile_queue_throttled_total_fallback",
                    "Fallback metric for throttled dequeues",
                )
                .expect("Fallback metric creation should never fail - if this panics, Prometheus is broken")
            }
        });
        if let Err(e) = RATE_LIMITER_REGISTRY.register(Box::new(counter.clone())) {
            eprintln!("WARN: Failed to register rauta_reconcile_queue_throttled_total counter: {}", e);
        }
        counter
    };

    /// Tokens currently available to the queue
    ///
    /// - Value near capacity: queue is idle or lightly loaded
    /// - Value at 0: dequeues are being throttled
    #[allow(clippy::expect_used)]
    static ref RATE_LIMIT_TOKENS_AVAILABLE: IntGauge = {
        let gauge = IntGauge::new(
            "rauta_reconcile_queue_tokens_available",
            "Current tokens available in the reconcile queue rate limiter",
        )
        .unwrap_or_else(|e| {
            eprintln!("WARN: Failed to create rauta_reconcile_queue_tokens_available gauge: {}", e);
            #[allow(clippy::expect_used)]
            {
                IntGauge::new(
                    "rauta_reconcile_queue_tokens_available_fallback",
                    "Fallback metric for queue tokens",
                )
                .expect("Fallback metric creation should never fail - if this panics, Prometheus is broken")
            }
        });
        if let Err(e) = RATE_LIMITER_REGISTRY.register(Box::new(gauge.clone())) {
            eprintln!("WARN: Failed to register rauta_reconcile_queue_tokens_available gauge: {}", e);
        }
        gauge
    };
}

/// Export the rate limiter metrics registry (for global /metrics endpoint)
pub fn rate_limiter_registry() -> &'static Registry {
    &RATE_LIMITER_REGISTRY
}

/// Safe RwLock read helper that recovers from poisoning
#[inline]
fn safe_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned during read, recovering (data is still valid)");
        poisoned.into_inner()
    })
}

/// Safe RwLock write helper that recovers from poisoning
#[inline]
fn safe_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned during write, recovering (data is still valid)");
        poisoned.into_inner()
    })
}

/// Token bucket for rate limiting
///
/// Thread-safe via interior mutability.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens (burst capacity)
    capacity: f64,
    /// Current tokens available
    tokens: RwLock<f64>,
    /// Refill rate (tokens per second)
    refill_rate: f64,
    /// Last refill timestamp
    last_refill: RwLock<Instant>,
}

impl TokenBucket {
    /// Create a new token bucket, starting full
    ///
    /// # Arguments
    /// * `rate` - Tokens per second (e.g., 10.0 = 10 dequeues/sec)
    /// * `burst` - Maximum burst capacity (tokens)
    pub fn new(rate: f64, burst: u64) -> Self {
        let capacity = burst as f64;
        Self {
            capacity,
            tokens: RwLock::new(capacity),
            refill_rate: rate,
            last_refill: RwLock::new(Instant::now()),
        }
    }

    /// Try to take one token without waiting
    pub fn try_acquire(&self) -> bool {
        self.refill();

        let mut tokens = safe_write(&self.tokens);
        let acquired = if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        };
        RATE_LIMIT_TOKENS_AVAILABLE.set(*tokens as i64);
        acquired
    }

    /// Take one token, sleeping until one is available
    pub async fn acquire(&self) {
        if self.try_acquire() {
            return;
        }

        RATE_LIMIT_THROTTLED_TOTAL.inc();
        loop {
            tokio::time::sleep(self.time_until_available()).await;
            if self.try_acquire() {
                return;
            }
        }
    }

    /// Time until one token will be available
    pub fn time_until_available(&self) -> Duration {
        self.refill();

        let tokens = *safe_read(&self.tokens);
        if tokens >= 1.0 || self.refill_rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - tokens) / self.refill_rate)
    }

    /// Refill tokens based on elapsed time
    fn refill(&self) {
        let now = Instant::now();
        let mut last_refill = safe_write(&self.last_refill);
        let elapsed = now.duration_since(*last_refill);

        let tokens_to_add = elapsed.as_secs_f64() * self.refill_rate;

        if tokens_to_add > 0.0 {
            let mut tokens = safe_write(&self.tokens);
            *tokens = (*tokens + tokens_to_add).min(self.capacity);
            *last_refill = now;
        }
    }

    /// Get current token count (for testing/metrics)
    pub fn available_tokens(&self) -> f64 {
        self.refill();
        *safe_read(&self.tokens)
    }
}
