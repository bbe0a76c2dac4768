//! Fixed-window rate limiting keyed by client address.
//!
//! Each client key owns a counter and the instant its window opened. A
//! request arriving after the window elapsed opens a new one; otherwise the
//! counter is incremented and compared against the limit. The check and the
//! increment happen under the key's map entry, so concurrent requests from
//! one client cannot both squeeze under the limit.

use crate::config::RateLimitConfig;
use crate::error::{ApiError, Result};
use crate::pipeline::{RequestContext, Stage};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use dashmap::DashMap;
use metrics::counter;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

/// Monotonic time source
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u64,
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Time until the current window closes
    pub reset_after: Duration,
}

impl RateLimitStatus {
    /// Whole seconds until the window resets, never zero for a throttled client
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 || secs == 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// `X-RateLimit-*` headers for an allowed response
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_after_secs()));
    }
}

/// Shared per-client window table
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u64,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_requests,
            Duration::from_secs(config.window_secs),
            Arc::new(SystemClock),
        )
    }

    /// Count one request for `key` and report whether it is within the limit
    pub fn check(&self, key: &str) -> RateLimitStatus {
        let now = self.clock.now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        let window = entry.value_mut();

        if now.saturating_duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }
        window.count += 1;

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(window.started_at));
        RateLimitStatus {
            allowed: window.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_after,
        }
    }

    /// Drop windows that have fully elapsed; returns how many were evicted
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started_at) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Identify the client a request is counted against.
///
/// Forwarding headers are client-controlled, so they are only believed when
/// the service is deployed behind a proxy that overwrites them.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
            });
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Pipeline stage enforcing the limiter
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    enabled: bool,
    trust_proxy_headers: bool,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            enabled: config.enabled,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }
}

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<()> {
        ctx.client_key = client_key(&ctx.headers, ctx.peer_addr, self.trust_proxy_headers);
        if !self.enabled {
            return Ok(());
        }

        let status = self.limiter.check(&ctx.client_key);
        ctx.rate_limit = Some(status);
        if status.allowed {
            return Ok(());
        }

        counter!("mesto_rate_limit_throttled_total").increment(1);
        warn!(client = %ctx.client_key, "Rate limit exceeded");
        Err(ApiError::RateLimitExceeded {
            client: ctx.client_key.clone(),
            retry_after_secs: status.reset_after_secs(),
        })
    }
}

/// Periodically evict elapsed windows so idle clients do not accumulate
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = limiter.sweep();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = limiter.tracked_clients(), "Swept rate limit windows");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn limiter(max: u64, clock: &ManualClock) -> RateLimiter {
        RateLimiter::new(max, Duration::from_secs(900), Arc::new(clock.clone()))
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let clock = ManualClock::new();
        let limiter = limiter(3, &clock);

        for expected_remaining in [2, 1, 0] {
            let status = limiter.check("10.0.0.1");
            assert!(status.allowed);
            assert_eq!(status.remaining, expected_remaining);
        }
        let status = limiter.check("10.0.0.1");
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);
    }

    #[test]
    fn test_window_resets_after_elapsed() {
        let clock = ManualClock::new();
        let limiter = limiter(1, &clock);

        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);

        clock.advance(Duration::from_secs(899));
        assert!(!limiter.check("a").allowed);

        clock.advance(Duration::from_secs(1));
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let clock = ManualClock::new();
        let limiter = limiter(1, &clock);

        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
    }

    #[test]
    fn test_retry_after_counts_remaining_window() {
        let clock = ManualClock::new();
        let limiter = limiter(1, &clock);
        limiter.check("a");
        clock.advance(Duration::from_millis(100_500));

        let status = limiter.check("a");
        assert!(!status.allowed);
        assert_eq!(status.reset_after_secs(), 800);
    }

    #[test]
    fn test_sweep_evicts_only_elapsed_windows() {
        let clock = ManualClock::new();
        let limiter = limiter(5, &clock);
        limiter.check("old");
        clock.advance(Duration::from_secs(600));
        limiter.check("fresh");
        clock.advance(Duration::from_secs(300));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let clock = ManualClock::new();
        let limiter = Arc::new(limiter(50, &clock));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..25).filter(|_| limiter.check("shared").allowed).count())
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_client_key_ignores_forwarding_headers_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        let peer = Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9)), 5000));

        assert_eq!(client_key(&headers, peer, false), "192.168.1.9");
        assert_eq!(client_key(&headers, peer, true), "1.2.3.4");
        assert_eq!(client_key(&HeaderMap::new(), None, false), "unknown");
    }

    #[test]
    fn test_client_key_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_key(&headers, None, true), "5.6.7.8");
    }

    #[test]
    fn test_headers_applied() {
        let status = RateLimitStatus {
            allowed: true,
            limit: 50,
            remaining: 49,
            reset_after: Duration::from_secs(900),
        };
        let mut headers = HeaderMap::new();
        status.apply_headers(&mut headers);
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "50");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "49");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "900");
    }
}
