use std::time::Duration;

use rand::Rng;

use crate::endpoint::Endpoint;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before each scheduled reconnection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay for every attempt.
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`. With `jitter` the delay is
    /// drawn uniformly from `[0, delay]`.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Backoff {
    /// Delay before attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max, jitter } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let delay = base.saturating_mul(1u32 << exponent).min(max);
                if jitter && !delay.is_zero() {
                    let millis = delay.as_millis() as u64;
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                } else {
                    delay
                }
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub endpoint: Endpoint,
    pub backoff: Backoff,
    /// Consecutive failures tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// An attempt still pending after this long counts as failed.
    pub connect_timeout: Duration,
}

impl SupervisorConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            backoff: Backoff::default(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stream_server() {
        let config = SupervisorConfig::default();
        assert_eq!(config.endpoint.url(), "ws://127.0.0.1:8000/api/ws/matches");
        assert_eq!(config.backoff.delay(1), Duration::from_secs(3));
        assert_eq!(config.backoff.delay(5), Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn exponential_doubles_until_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(5),
            jitter: false,
        };
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| backoff.delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, [500, 1000, 2000, 4000, 5000, 5000]);
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_the_computed_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(1),
            jitter: true,
        };
        for attempt in 1..=10 {
            let doubled = Duration::from_millis(200 * (1u64 << (attempt - 1).min(3)));
            let ceiling = doubled.min(Duration::from_secs(1));
            assert!(backoff.delay(attempt) <= ceiling);
        }
    }
}
