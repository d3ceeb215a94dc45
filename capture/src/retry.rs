use log::warn;
use std::{fmt::Display, thread, time::Duration};

/// Bounded retry with exponential backoff for reads of files another
/// process rewrites in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    initial_delay: Duration,
    backoff: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts two seconds apart.
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff: 1.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Total attempts, including the first one (at least 1).
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Delay before the second attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Factor applied to the delay after every failed attempt. Values
    /// below 1 (and NaN) are treated as 1.
    #[must_use]
    pub fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff.max(1.0);
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delays slept between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let first = self.initial_delay.min(self.max_delay);
        std::iter::successors(Some(first), |delay| Some(self.next_delay(*delay)))
            .take(self.attempts.saturating_sub(1) as usize)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff)
            .map_or(self.max_delay, |next| next.min(self.max_delay))
    }

    /// Calls `op` until it succeeds or attempts run out, returning the
    /// last error.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!("attempt {attempt} to {what} failed ({e}), retrying in {delay:?}");
                        thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}
