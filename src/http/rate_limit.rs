//! Per-client sliding-window request limiter for the API routes.

use super::AppState;
use crate::constants::MAX_TRACKED_CLIENTS;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    /// Rejected; the client may retry after this many seconds.
    Limited { retry_after: u64 },
}

/// Clients are keyed by IP; requests without a known peer share one bucket.
pub type ClientKey = Option<IpAddr>;

#[derive(Debug)]
struct Buckets {
    hits: HashMap<ClientKey, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

/// Allows at most `max` requests per client in any `window`.
///
/// Each check prunes that client's expired timestamps. Once per window the
/// whole table is swept so clients that went quiet stop taking memory.
///
/// The table never holds more than `max_tracked` clients. A new client
/// arriving at the cap forces a sweep; if the table is still full, the
/// request is limited until the earliest tracked hit expires.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: usize,
    max_tracked: usize,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: usize) -> Self {
        Self {
            window,
            max,
            max_tracked: MAX_TRACKED_CLIENTS,
            buckets: Mutex::new(Buckets {
                hits: HashMap::new(),
                last_sweep: None,
            }),
        }
    }

    /// Replaces the cap on distinct tracked clients.
    pub fn with_max_tracked_clients(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    /// Records a request from `key` at `now` if it fits in the window.
    pub fn check(&self, key: ClientKey, now: Instant) -> Decision {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let sweep_due = buckets
            .last_sweep
            .map_or(true, |last| now.duration_since(last) >= self.window);
        if sweep_due {
            sweep(&mut buckets, now, self.window);
        }

        if !buckets.hits.contains_key(&key) && buckets.hits.len() >= self.max_tracked {
            debug!(tracked = buckets.hits.len(), "Tracked client cap reached, forcing sweep");
            sweep(&mut buckets, now, self.window);
            if buckets.hits.len() >= self.max_tracked {
                let wait = buckets
                    .hits
                    .values()
                    .filter_map(|hits| hits.front())
                    .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                    .min()
                    .unwrap_or(self.window);
                return Decision::Limited {
                    retry_after: ceil_secs(wait).max(1),
                };
            }
        }

        let hits = buckets.hits.entry(key).or_default();
        prune(hits, now, self.window);

        if hits.len() >= self.max {
            let oldest = hits.front().copied().unwrap_or(now);
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            return Decision::Limited {
                retry_after: ceil_secs(wait).max(1),
            };
        }

        hits.push_back(now);
        Decision::Allowed {
            remaining: self.max - hits.len(),
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        match self.buckets.lock() {
            Ok(guard) => guard.hits.len(),
            Err(poisoned) => poisoned.into_inner().hits.len(),
        }
    }
}

fn sweep(buckets: &mut Buckets, now: Instant, window: Duration) {
    buckets.hits.retain(|_, hits| {
        prune(hits, now, window);
        !hits.is_empty()
    });
    buckets.last_sweep = Some(now);
}

fn prune(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = hits.front() {
        if now.duration_since(oldest) >= window {
            hits.pop_front();
        } else {
            break;
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Middleware enforcing the limiter on every request it wraps.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match state.limiter.check(key, Instant::now()) {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            warn!(client = ?key, retry_after, "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests. Please try again later.",
                    "retryAfter": retry_after,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}
