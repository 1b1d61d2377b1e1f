//! Per-client rate limiting with idle eviction.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::ExtensionRejection, ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::{self, Instant};

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::lifecycle::{BackgroundTasks, ShutdownCoordinator};
use crate::observability::metrics;
use crate::security::SecurityError;

/// How often idle clients are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Clients unseen for longer than this are dropped by the sweep.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(180);

/// A token bucket refilled continuously at `rate` per second up to `capacity`.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct RateClient {
    bucket: TokenBucket,
    last_seen: Instant,
}

struct ClientTable {
    clients: Mutex<HashMap<String, RateClient>>,
    rate: f64,
    burst: f64,
}

impl ClientTable {
    fn admit(&self, key: &str, now: Instant) -> Result<Admission, SecurityError> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| SecurityError::LockPoisoned("rate limiter table"))?;

        let client = clients.entry(key.to_string()).or_insert_with(|| RateClient {
            bucket: TokenBucket::new(self.burst, now),
            last_seen: now,
        });
        client.last_seen = now;

        if client.bucket.try_acquire(self.burst, self.rate, now) {
            Ok(Admission::Allow)
        } else {
            Ok(Admission::Reject)
        }
    }

    fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let Ok(mut clients) = self.clients.lock() else {
            tracing::error!("Rate limiter table poisoned, skipping sweep");
            return 0;
        };
        let before = clients.len();
        clients.retain(|_, client| now.saturating_duration_since(client.last_seen) <= idle);
        metrics::record_rate_limiter_clients(clients.len());
        before - clients.len()
    }

    fn len(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject,
}

/// Token-bucket admission control keyed by client address.
///
/// A disabled limiter holds no table at all, so admission is a plain
/// passthrough with no locking. Clones share the same table.
#[derive(Clone)]
pub struct RateLimiter {
    table: Option<Arc<ClientTable>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            table: Some(Arc::new(ClientTable {
                clients: Mutex::new(HashMap::new()),
                rate: config.requests_per_second,
                burst: f64::from(config.burst),
            })),
        }
    }

    pub fn disabled() -> Self {
        Self { table: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.table.is_some()
    }

    /// Withdraw one token for `key`, creating its bucket on first sight.
    pub fn admit(&self, key: &str) -> Result<Admission, SecurityError> {
        match &self.table {
            None => Ok(Admission::Allow),
            Some(table) => table.admit(key, Instant::now()),
        }
    }

    /// Drop clients idle for longer than `idle`. Returns how many were removed.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        self.table
            .as_ref()
            .map_or(0, |table| table.sweep(Instant::now(), idle))
    }

    /// Number of tracked clients.
    pub fn client_count(&self) -> usize {
        self.table.as_ref().map_or(0, |table| table.len())
    }

    /// Start the periodic idle sweep.
    ///
    /// The task stops when shutdown begins or once every limiter handle
    /// has been dropped. It is registered with `tasks` for the duration.
    pub fn spawn_eviction(&self, tasks: &BackgroundTasks, shutdown: &ShutdownCoordinator) {
        let Some(table) = &self.table else {
            return;
        };
        let table: Weak<ClientTable> = Arc::downgrade(table);
        let shutdown = shutdown.clone();

        tasks.spawn("rate_limit_eviction", async move {
            let mut ticker = time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(table) = table.upgrade() else {
                            tracing::debug!("Rate limiter dropped, stopping eviction");
                            break;
                        };
                        let evicted = table.sweep(Instant::now(), IDLE_THRESHOLD);
                        if evicted > 0 {
                            tracing::debug!(evicted, "Evicted idle rate limit clients");
                        }
                    }
                    _ = shutdown.draining() => {
                        tracing::debug!("Eviction task received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });
    }
}

/// Middleware applying the limiter to the peer IP.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    peer: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let Ok(ConnectInfo(addr)) = peer else {
        return ApiError::from(SecurityError::MissingClientAddress).into_response();
    };
    let key = addr.ip().to_string();

    match limiter.admit(&key) {
        Ok(Admission::Allow) => next.run(request).await,
        Ok(Admission::Reject) => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            ApiError::from(SecurityError::RateLimitExceeded).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_reject() {
        let limiter = limiter(2.0, 4);
        for _ in 0..4 {
            assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Allow);
        }
        assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Reject);

        // Another client has its own bucket.
        assert_eq!(limiter.admit("10.0.0.2").unwrap(), Admission::Allow);
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_refills_over_time() {
        let limiter = limiter(2.0, 1);
        assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Allow);
        assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Reject);

        time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Allow);
        assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Reject);
    }

    #[test]
    fn disabled_always_allows() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests_per_second: 1.0,
            burst: 1,
        });
        assert!(!limiter.is_enabled());
        for _ in 0..10_000 {
            assert_eq!(limiter.admit("10.0.0.1").unwrap(), Admission::Allow);
        }
        assert_eq!(limiter.client_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clients_are_evicted() {
        let limiter = limiter(10.0, 10);
        limiter.admit("idle").unwrap();
        time::advance(Duration::from_secs(120)).await;
        limiter.admit("active").unwrap();
        time::advance(Duration::from_secs(61)).await;

        let evicted = limiter.evict_idle(IDLE_THRESHOLD);
        assert_eq!(evicted, 1);
        assert_eq!(limiter.client_count(), 1);
        // "active" was seen 61s ago and survives.
        assert_eq!(limiter.admit("active").unwrap(), Admission::Allow);
        assert_eq!(limiter.client_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_task_sweeps_and_stops() {
        let tasks = BackgroundTasks::new();
        let shutdown = ShutdownCoordinator::new(tasks.clone(), Duration::from_secs(1), None);
        let limiter = limiter(10.0, 10);
        limiter.spawn_eviction(&tasks, &shutdown);
        assert_eq!(tasks.pending(), 1);

        limiter.admit("10.0.0.9").unwrap();
        time::sleep(IDLE_THRESHOLD + SWEEP_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(limiter.client_count(), 0);

        shutdown.begin_drain();
        tasks.wait_idle().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_task_exits_when_limiter_dropped() {
        let tasks = BackgroundTasks::new();
        let shutdown = ShutdownCoordinator::new(tasks.clone(), Duration::from_secs(1), None);
        let limiter = limiter(10.0, 10);
        limiter.spawn_eviction(&tasks, &shutdown);
        drop(limiter);

        time::sleep(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        tasks.wait_idle().await;
        assert_eq!(tasks.pending(), 0);
    }
}
