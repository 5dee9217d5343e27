//! Call-budget tracking and client-side pacing.
//!
//! Every response from the theme service carries an `x-api-call-limit`
//! header of the form `used/capacity`. The client records the most recent
//! value here and, once the remaining budget runs low, delays outgoing
//! calls proportionally so bursts self-throttle before the server has to
//! reject anything.

use std::time::Duration;

use crate::config::LimitsConfig;

/// Response header carrying the call budget.
pub const CALL_LIMIT_HEADER: &str = "x-api-call-limit";

/// Most recent call-budget signal from the server.
///
/// Single writer: response handling inside the API client. Readers only
/// compute the pacing delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub used: u32,
    pub capacity: u32,
}

impl RateLimitState {
    /// Parse a `used/capacity` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let (used, capacity) = value.trim().split_once('/')?;
        Some(Self {
            used: used.trim().parse().ok()?,
            capacity: capacity.trim().parse().ok()?,
        })
    }

    /// Replace this state with the value from the latest response.
    ///
    /// Malformed headers are ignored; the previous window's signal stays
    /// in effect rather than resetting pacing.
    pub fn update(&mut self, header: &str) {
        if let Some(next) = Self::parse(header) {
            *self = next;
        }
    }

    /// Calls left in the current window.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }

    /// Pacing delay to apply before the next call, if the budget is low.
    ///
    /// Below the low-water mark the delay grows as `capacity / remaining`,
    /// so the final few calls in a window are spread out the most.
    pub fn pacing_delay(&self, limits: &LimitsConfig) -> Option<Duration> {
        if self.capacity == 0 {
            return None;
        }
        let remaining = self.remaining();
        let low_water = (f64::from(self.capacity) * limits.low_water).ceil() as u32;
        if remaining > low_water {
            return None;
        }
        let factor = f64::from(self.capacity) / f64::from(remaining.max(1));
        Some(Duration::from_millis(
            (limits.call_delay_ms as f64 * factor) as u64,
        ))
    }
}

/// Injectable sleep, so tests can assert exact backoff delays without
/// real timers.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocking sleep used outside tests.
pub struct SystemSleeper;

impl Sleeper for SystemSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
