use rand::Rng;
use std::time::Duration;

/// Capped exponential backoff for automatic reconnection.
///
/// Delay for attempt `n` (zero based) is `base * 2^n`, spread by up to
/// `jitter * delay` in either direction. Once `max_attempts` delays have been
/// handed out, [`Backoff::next_delay`] returns `None` until [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32, jitter: f64) -> Self {
        Self {
            base,
            max_attempts,
            // negative jitter would make gen_range panic
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }

        let delay = self.base.saturating_mul(2u32.saturating_pow(self.attempt));
        self.attempt += 1;

        let spread = delay.as_secs_f64() * self.jitter;
        if spread > 0.0 {
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            Some(Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0)))
        } else {
            Some(delay)
        }
    }

    /// Call after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
