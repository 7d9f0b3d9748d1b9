//! Fixed-window rate limiter keyed by client id.
//!
//! Each client gets `max_requests` calls per window, anchored at its first
//! request. Exceeding the quota blocks the client until that window ends.
//! Expired state is evicted lazily on later calls; there is no timer.

use crate::error::{SecurityError, SecurityResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default requests per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 100;
/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
/// Longest accepted window, one day.
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, ClientWindow>,
    blocked: HashMap<String, Instant>,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimitRejection {
    /// The request just exhausted the quota and started a block.
    RateLimited { remaining_secs: u64 },
    /// The client was already blocked.
    AlreadyBlocked { remaining_secs: u64 },
}

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub message: String,
    pub rejection: Option<RateLimitRejection>,
}

impl Admission {
    fn allow(message: String) -> Self {
        Self {
            allowed: true,
            message,
            rejection: None,
        }
    }

    fn deny(rejection: RateLimitRejection, message: String) -> Self {
        Self {
            allowed: false,
            message,
            rejection: Some(rejection),
        }
    }

    /// Convert into a `Result` so callers can propagate refusals with `?`.
    pub fn into_result(self) -> SecurityResult<()> {
        match self.rejection {
            None => Ok(()),
            Some(RateLimitRejection::RateLimited { remaining_secs }) => {
                Err(SecurityError::RateLimited {
                    remaining_secs,
                    message: self.message,
                })
            }
            Some(RateLimitRejection::AlreadyBlocked { remaining_secs }) => {
                Err(SecurityError::AlreadyBlocked {
                    remaining_secs,
                    message: self.message,
                })
            }
        }
    }
}

/// Read-only snapshot of a client's quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub blocked: bool,
    pub requests_used: u32,
    pub requests_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_reset_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_block_time: Option<u64>,
}

/// Per-client fixed-window rate limiter.
///
/// Both maps live behind one mutex; every call is a single short critical
/// section with no I/O.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<LimiterState>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS)
    }
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// Zero values are clamped to 1 and the window to [`MAX_WINDOW_SECONDS`];
    /// configuration rejects out-of-range values earlier.
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: Duration::from_secs(window_seconds.clamp(1, MAX_WINDOW_SECONDS)),
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs()
    }

    /// Check and record a request for `client_id`.
    pub fn is_allowed(&self, client_id: &str) -> Admission {
        self.is_allowed_at(client_id, Instant::now())
    }

    /// Same as [`is_allowed`](Self::is_allowed) with an explicit clock.
    pub fn is_allowed_at(&self, client_id: &str, now: Instant) -> Admission {
        let mut state = self.state.lock();

        if let Some(&blocked_until) = state.blocked.get(client_id) {
            if blocked_until > now {
                let remaining_secs = blocked_until.duration_since(now).as_secs();
                warn!(
                    client_id,
                    remaining_seconds = remaining_secs,
                    "Rate limit exceeded, client still blocked"
                );
                return Admission::deny(
                    RateLimitRejection::AlreadyBlocked { remaining_secs },
                    format!("Rate limit exceeded. Try again in {remaining_secs} seconds."),
                );
            }
            state.blocked.remove(client_id);
            info!(client_id, "Rate limit block expired");
        }

        let window = self.window;
        state
            .windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < window);

        let Some(entry) = state.windows.get_mut(client_id) else {
            state.windows.insert(
                client_id.to_string(),
                ClientWindow {
                    count: 1,
                    window_start: now,
                    last_seen: now,
                },
            );
            return Admission::allow("Request allowed".to_string());
        };

        if entry.count < self.max_requests {
            entry.count += 1;
            entry.last_seen = now;
            return Admission::allow(format!(
                "Request allowed ({}/{})",
                entry.count, self.max_requests
            ));
        }

        let blocked_until = self.window_end(entry.window_start, now);
        let remaining_secs = blocked_until.saturating_duration_since(now).as_secs();
        state.blocked.insert(client_id.to_string(), blocked_until);

        warn!(
            client_id,
            max_requests = self.max_requests,
            window_seconds = window.as_secs(),
            remaining_seconds = remaining_secs,
            "Rate limit exceeded, client blocked"
        );

        Admission::deny(
            RateLimitRejection::RateLimited { remaining_secs },
            format!(
                "Rate limit exceeded ({} requests per {}s). Try again in {} seconds.",
                self.max_requests,
                window.as_secs(),
                remaining_secs
            ),
        )
    }

    /// Snapshot of `client_id`'s quota. Never mutates state.
    pub fn get_client_status(&self, client_id: &str) -> RateLimitStatus {
        self.get_client_status_at(client_id, Instant::now())
    }

    /// Same as [`get_client_status`](Self::get_client_status) with an explicit clock.
    pub fn get_client_status_at(&self, client_id: &str, now: Instant) -> RateLimitStatus {
        let state = self.state.lock();

        if let Some(&blocked_until) = state.blocked.get(client_id) {
            if blocked_until > now {
                return RateLimitStatus {
                    blocked: true,
                    requests_used: self.max_requests,
                    requests_remaining: 0,
                    window_reset_in: None,
                    remaining_block_time: Some(blocked_until.duration_since(now).as_secs()),
                };
            }
        }

        match state.windows.get(client_id) {
            Some(w) if now.saturating_duration_since(w.window_start) < self.window => {
                let reset_at = self.window_end(w.window_start, now);
                RateLimitStatus {
                    blocked: false,
                    requests_used: w.count,
                    requests_remaining: self.max_requests.saturating_sub(w.count),
                    window_reset_in: Some(reset_at.saturating_duration_since(now).as_secs()),
                    remaining_block_time: None,
                }
            }
            _ => RateLimitStatus {
                blocked: false,
                requests_used: 0,
                requests_remaining: self.max_requests,
                window_reset_in: Some(self.window.as_secs()),
                remaining_block_time: None,
            },
        }
    }

    /// End of the window that opened at `start`. If that instant is not
    /// representable the window is treated as ending `window` after `now`.
    fn window_end(&self, start: Instant, now: Instant) -> Instant {
        start
            .checked_add(self.window)
            .or_else(|| now.checked_add(self.window))
            .unwrap_or(now)
    }

    /// Number of clients with live state (windowed or blocked).
    pub fn tracked_clients(&self) -> usize {
        let state = self.state.lock();
        let mut count = state.windows.len();
        count += state
            .blocked
            .keys()
            .filter(|k| !state.windows.contains_key(*k))
            .count();
        count
    }
}

/// Rate limiter builder.
pub struct RateLimiterBuilder {
    max_requests: u32,
    window_seconds: u64,
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl RateLimiterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_requests(mut self, max: u32) -> Self {
        self.max_requests = max;
        self
    }

    pub fn window_seconds(mut self, seconds: u64) -> Self {
        self.window_seconds = seconds;
        self
    }

    pub fn build(self) -> RateLimiter {
        RateLimiter::new(self.max_requests, self.window_seconds)
    }
}
