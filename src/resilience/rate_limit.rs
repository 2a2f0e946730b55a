//! Fixed-window rate limiter.
//!
//! Counts successful dispatches inside a window of `window_secs` and reports
//! when the quota is used up. This is a fixed window, not a sliding window or
//! token bucket: calls straddling a window boundary can reach about twice the
//! nominal rate for a short time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::resilience::clock::ClockAnchor;

#[derive(Debug)]
struct Window {
    start: Instant,
    request_count: u32,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Self {
            start: now,
            request_count: 0,
        }
    }
}

/// Point-in-time view of the limiter, for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub requests_this_window: u32,
    pub window_start: SystemTime,
}

/// Shared quota for one downstream dependency.
#[derive(Debug)]
pub struct RateLimiter {
    config: ArcSwap<RateLimitConfig>,
    clock: ClockAnchor,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            clock: ClockAnchor::now(),
            window: Mutex::new(Window::fresh(Instant::now())),
        }
    }

    /// Replace the quota and window length. The current count is kept.
    pub fn update_config(&self, config: RateLimitConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<RateLimitConfig> {
        self.config.load_full()
    }

    /// True if the quota of the current window is used up.
    ///
    /// A stale window (older than `window_secs`) is rolled over first, so
    /// this is false again once a window has elapsed, whatever the count.
    pub fn would_exceed(&self) -> bool {
        self.would_exceed_at(Instant::now())
    }

    pub fn would_exceed_at(&self, now: Instant) -> bool {
        let config = self.config.load();
        let mut window = self.lock();
        if now.saturating_duration_since(window.start) > config.window() {
            *window = Window::fresh(now);
            return false;
        }
        window.request_count >= config.max_requests_per_window
    }

    /// How long a caller must wait before dispatching, `None` if the quota
    /// allows a call now.
    ///
    /// Same rules as [`would_exceed`](Self::would_exceed) followed by
    /// [`time_until_reset`](Self::time_until_reset), under a single lock, so a
    /// concurrent reset cannot slip in between the check and the wait.
    pub fn wait_needed(&self) -> Option<Duration> {
        self.wait_needed_at(Instant::now())
    }

    pub fn wait_needed_at(&self, now: Instant) -> Option<Duration> {
        let config = self.config.load();
        let mut window = self.lock();
        let age = now.saturating_duration_since(window.start);
        if age > config.window() {
            *window = Window::fresh(now);
            return None;
        }
        if window.request_count >= config.max_requests_per_window {
            Some(config.window().saturating_sub(age))
        } else {
            None
        }
    }

    /// Count one dispatched call against the current window.
    pub fn record_request(&self) {
        let mut window = self.lock();
        window.request_count = window.request_count.saturating_add(1);
    }

    /// Time left in the current window, zero once it has elapsed.
    pub fn time_until_reset(&self) -> Duration {
        self.time_until_reset_at(Instant::now())
    }

    pub fn time_until_reset_at(&self, now: Instant) -> Duration {
        let window_len = self.config.load().window();
        let window = self.lock();
        window_len.saturating_sub(now.saturating_duration_since(window.start))
    }

    /// Start a new window after waiting out the current one.
    ///
    /// Only resets if the current window has actually elapsed, so several
    /// callers that waited on the same window reset it once between them.
    /// Returns whether this call performed the reset.
    pub fn reset_window(&self) -> bool {
        self.reset_window_at(Instant::now())
    }

    pub fn reset_window_at(&self, now: Instant) -> bool {
        let window_len = self.config.load().window();
        let mut window = self.lock();
        if now.saturating_duration_since(window.start) >= window_len {
            *window = Window::fresh(now);
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let window = self.lock();
        WindowSnapshot {
            requests_this_window: window.request_count,
            window_start: self.clock.wall_at(window.start),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window.lock().expect("rate limiter mutex poisoned")
    }
}
