use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Admission log: the instants of every permit handed out in the last window
struct Window {
    admitted: VecDeque<Instant>,
    quota: usize,
}

impl Window {
    /// Take a permit, or report how long until the oldest one leaves the window
    fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() < self.quota {
            self.admitted.push_back(now);
            return Ok(());
        }
        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err(WINDOW.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

/// Admission gate for outbound REST calls.
///
/// At most `quota` permits are granted in any rolling one-second window,
/// regardless of how many tasks are asking.
pub struct RateLimiter {
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let quota = requests_per_second.max(1) as usize;
        Self {
            window: Mutex::new(Window {
                admitted: VecDeque::with_capacity(quota),
                quota,
            }),
        }
    }

    /// Take a permit if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.window.lock().try_admit(Instant::now()).is_ok()
    }

    /// Wait as long as needed for a permit
    pub async fn acquire(&self) {
        loop {
            let wait = match self.window.lock().try_admit(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Wait up to `timeout` for a permit. A zero timeout never waits.
    pub async fn acquire_timeout(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return self.try_acquire();
        }
        tokio::time::timeout(timeout, self.acquire()).await.is_ok()
    }

    /// Permits free in the current window
    pub fn available(&self) -> usize {
        let mut window = self.window.lock();
        let now = Instant::now();
        window
            .admitted
            .retain(|admitted| now.saturating_duration_since(*admitted) < WINDOW);
        window.quota - window.admitted.len()
    }
}
