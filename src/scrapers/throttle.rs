use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;

/// Request pacing for one upstream, owned by a single run.
///
/// Two rules apply: consecutive requests are at least `min_interval` apart,
/// and at most `budget` requests start within one `window`.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<Budget>,
}

#[derive(Debug)]
struct Budget {
    min_interval: Duration,
    budget: u32,
    window: Duration,
    window_start: Option<Instant>,
    used: u32,
    last: Option<Instant>,
}

impl Budget {
    /// Book a slot for a request wanting to start at `now`; returns how long to wait.
    fn reserve(&mut self, now: Instant) -> Duration {
        let mut start = now;

        if let Some(last) = self.last {
            start = start.max(last + self.min_interval);
        }

        match self.window_start {
            Some(ws) if start.duration_since(ws) < self.window => {
                if self.used >= self.budget {
                    start = ws + self.window;
                    self.window_start = Some(start);
                    self.used = 0;
                }
            }
            _ => {
                self.window_start = Some(start);
                self.used = 0;
            }
        }

        self.used += 1;
        self.last = Some(start);
        start.duration_since(now)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration, budget: u32, window: Duration) -> Self {
        Self {
            state: Mutex::new(Budget {
                min_interval,
                budget: budget.max(1),
                window,
                window_start: None,
                used: 0,
                last: None,
            }),
        }
    }

    /// Only space requests out
    pub fn with_interval(min_interval: Duration) -> Self {
        Self::new(min_interval, u32::MAX, Duration::from_secs(60))
    }

    /// Only cap requests per minute
    pub fn per_minute(budget: u32) -> Self {
        Self::new(Duration::ZERO, budget, Duration::from_secs(60))
    }

    /// Wait until the next request may start
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.reserve(Instant::now())
        };

        if wait >= Duration::from_secs(1) {
            info!("Request budget spent, pausing {:?}", wait);
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
