//! Per-client fixed-window rate limiting.
//!
//! Every client key owns a counter and the instant its current window opened.
//! A window admits `max_requests` requests; the next request after the window
//! has elapsed opens a fresh one. Because windows are fixed rather than sliding,
//! a client can get up to twice the limit through in any window-length interval
//! that straddles a boundary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Counter state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub count: u32,
    pub window_start: Instant,
}

impl ClientWindow {
    fn open(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Over the limit; `retry_after` is what remains of the current window.
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Fixed-window counter keyed by client identity.
pub struct RateLimiter {
    clients: DashMap<String, ClientWindow>,
    max_requests: u32,
    window: Duration,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_requests,
            window,
            enabled: true,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_requests, Duration::from_millis(config.window_ms))
        }
    }

    /// Count one request from `key` at `now` and decide whether it may proceed.
    pub fn check(&self, key: &str, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allow;
        }

        match self.clients.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ClientWindow::open(now));
                Decision::Allow
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                let elapsed = now.saturating_duration_since(record.window_start);

                if elapsed >= self.window {
                    *record = ClientWindow::open(now);
                    Decision::Allow
                } else if record.count < self.max_requests {
                    record.count += 1;
                    Decision::Allow
                } else {
                    Decision::Reject {
                        retry_after: self.window - elapsed,
                    }
                }
            }
        }
    }

    /// Drop every record whose window has already run out.
    ///
    /// Such a record would be reset by its next `check` anyway, so eviction
    /// never changes a decision. Returns the number of records removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, record| now.saturating_duration_since(record.window_start) < self.window);
        before.saturating_sub(self.clients.len())
    }

    /// Current record for `key`, if any.
    pub fn window_for(&self, key: &str) -> Option<ClientWindow> {
        self.clients.get(key).map(|record| *record)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Periodically evict stale records until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, every: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?every, "Client record sweeper starting");

        let mut ticker = time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep(time::Instant::now().into_std());
                    let remaining = self.tracked_clients();
                    metrics::set_tracked_clients(remaining);
                    if removed > 0 {
                        tracing::debug!(removed, remaining, "Evicted stale client records");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Client record sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Limiter plus the way client keys are derived from requests.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub client_header: Option<String>,
}

/// Identify the client behind a request.
///
/// A configured trusted header wins (first comma-separated element, as in
/// `X-Forwarded-For`); otherwise the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, client_header: Option<&str>) -> String {
    let from_header = client_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (from_header, peer) {
        (Some(value), _) => value.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Middleware consulting the limiter before a request may be admitted.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.client_header.as_deref());

    match state.limiter.check(&key, Instant::now()) {
        Decision::Allow => next.run(request).await,
        Decision::Reject { retry_after } => {
            tracing::warn!(client = %key, retry_after = ?retry_after, "Rate limit exceeded");
            metrics::record_rate_limited();
            too_many_requests(retry_after)
        }
    }
}

fn too_many_requests(retry_after: Duration) -> Response {
    // Whole seconds, rounded up, never zero.
    let secs = retry_after.as_millis().div_ceil(1000).max(1);

    let mut response = Response::new(Body::from("Too many requests. Please try again later."));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::RETRY_AFTER, HeaderValue::from(secs as u64));
    response
}
