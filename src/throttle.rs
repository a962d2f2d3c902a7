//! Per-identity sliding-window request throttle.
//!
//! Each identity gets an independent budget of `max_requests` admissions
//! per `window_secs`. Admissions older than the window are discarded on
//! every call. A single lock guards the whole map, so calls for the same
//! identity are mutually exclusive.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub window_secs: i64,
    pub max_requests: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            max_requests: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

pub struct RequestThrottle {
    window: Duration,
    cap: usize,
    history: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RequestThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            window: Duration::seconds(config.window_secs.max(1)),
            cap: config.max_requests,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window.num_seconds()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Admit or reject one request for `identity` at `now`.
    pub fn admit(&self, identity: &str, now: DateTime<Utc>) -> bool {
        self.try_admit(identity, now).is_ok()
    }

    /// Like `admit`, but a rejection says how long until the oldest
    /// admission leaves the window.
    pub fn try_admit(&self, identity: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let stamps = history.entry(identity.to_string()).or_default();

        while stamps.front().is_some_and(|t| now - *t >= self.window) {
            stamps.pop_front();
        }

        if stamps.len() >= self.cap {
            let retry_after_secs = stamps
                .front()
                .and_then(|oldest| oldest.checked_add_signed(self.window))
                .map(|expiry| (expiry - now).num_seconds().max(1))
                .unwrap_or(self.window.num_seconds());
            warn!(
                identity = identity,
                in_window = stamps.len(),
                retry_after_secs,
                "Request throttled"
            );
            return Err(EngineError::ThrottleExceeded {
                identity: identity.to_string(),
                retry_after_secs,
            });
        }

        stamps.push_back(now);
        debug!(identity = identity, in_window = stamps.len(), "Request admitted");
        Ok(())
    }

    /// Drop identities whose admissions have all left the window. Returns
    /// how many were removed.
    pub fn purge_idle(&self, now: DateTime<Utc>) -> usize {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let before = history.len();
        history.retain(|_, stamps| stamps.back().is_some_and(|t| now - *t < self.window));
        before - history.len()
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
