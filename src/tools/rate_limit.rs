//! Per-tool rate limiting.
//!
//! Fixed windows of one minute and one hour per tool name. A call is
//! admitted only if both windows have room; admitted calls count against
//! both.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self { start: now, count: 0 }
    }

    /// Reset if expired, then report the wait in ms when `limit` is reached.
    fn check(&mut self, now: Instant, length: Duration, limit: u32) -> Option<u64> {
        let elapsed = now.duration_since(self.start);
        if elapsed >= length {
            *self = Window::new(now);
            return None;
        }
        if self.count >= limit {
            return Some((length - elapsed).as_millis() as u64);
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct ToolWindows {
    minute: Window,
    hour: Window,
}

/// Rate limiter shared by all invocations of a [`ToolInvoker`](super::ToolInvoker).
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, ToolWindows>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one call or return the retry-after delay in milliseconds.
    pub fn try_acquire(&self, tool: &str, per_minute: Option<u32>, per_hour: Option<u32>) -> Result<(), u64> {
        if per_minute.is_none() && per_hour.is_none() {
            return Ok(());
        }

        let now = Instant::now();
        let mut windows = self.windows.lock();
        let entry = windows.entry(tool.to_string()).or_insert_with(|| ToolWindows {
            minute: Window::new(now),
            hour: Window::new(now),
        });

        if let Some(limit) = per_minute {
            if let Some(wait) = entry.minute.check(now, MINUTE, limit) {
                return Err(wait);
            }
        }
        if let Some(limit) = per_hour {
            if let Some(wait) = entry.hour.check(now, HOUR, limit) {
                return Err(wait);
            }
        }

        entry.minute.count += 1;
        entry.hour.count += 1;
        Ok(())
    }

    /// Calls admitted in the current minute window.
    pub fn current_minute_count(&self, tool: &str) -> u32 {
        self.windows.lock().get(tool).map_or(0, |w| w.minute.count)
    }
}
