use crate::config::StreamConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_millis(1000),
		}
	}
}

impl From<&StreamConfig> for RetryConfig {
	fn from(config: &StreamConfig) -> Self {
		Self {
			max_attempts: config.max_reconnect_attempts,
			base_delay: config.base_reconnect_delay,
		}
	}
}

/// Stateless exponential backoff: `base_delay * 2^attempt`, no jitter.
///
/// The attempt counter itself lives in the connection manager; this type only
/// answers "may we retry" and "how long to wait".
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
	config: RetryConfig,
}

impl BackoffPolicy {
	#[must_use]
	pub const fn new(config: RetryConfig) -> Self {
		Self { config }
	}

	/// Whether another automatic reconnect may be scheduled after `attempt_count` consecutive failures
	#[must_use]
	pub const fn should_retry(&self, attempt_count: u32) -> bool {
		attempt_count < self.config.max_attempts
	}

	/// Delay before reconnect number `attempt`, saturating instead of overflowing
	#[must_use]
	pub fn delay(&self, attempt: u32) -> Duration {
		self.config.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
	}

	/// Advance the counter for a new failure and return the delay to wait, or
	/// `None` once the attempt bound is exhausted.
	pub fn next_delay(&self, attempt_count: &mut u32) -> Option<Duration> {
		if !self.should_retry(*attempt_count) {
			return None;
		}
		*attempt_count += 1;
		Some(self.delay(*attempt_count))
	}

	#[must_use]
	pub const fn max_attempts(&self) -> u32 {
		self.config.max_attempts
	}
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::new(RetryConfig::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delay_doubles_from_base() {
		let policy = BackoffPolicy::default();
		assert_eq!(policy.delay(0), Duration::from_millis(1000));
		assert_eq!(policy.delay(1), Duration::from_millis(2000));
		assert_eq!(policy.delay(3), Duration::from_millis(8000));
	}

	#[test]
	fn test_next_delay_sequence_is_bounded() {
		let policy = BackoffPolicy::default();
		let mut attempts = 0;
		let delays: Vec<u128> = std::iter::from_fn(|| policy.next_delay(&mut attempts)).map(|d| d.as_millis()).collect();

		assert_eq!(delays, vec![2000, 4000, 8000, 16000, 32000]);
		assert_eq!(attempts, 5);
		assert!(policy.next_delay(&mut attempts).is_none());
		assert_eq!(attempts, 5, "exhausted policy must not advance the counter");
	}

	#[test]
	fn test_zero_attempts_never_retries() {
		let policy = BackoffPolicy::new(RetryConfig {
			max_attempts: 0,
			base_delay: Duration::from_millis(10),
		});
		let mut attempts = 0;
		assert!(policy.next_delay(&mut attempts).is_none());
	}

	#[test]
	fn test_delay_saturates() {
		let policy = BackoffPolicy::default();
		assert_eq!(policy.delay(u32::MAX), Duration::from_secs(u64::from(u32::MAX)));
		assert_eq!(policy.delay(64), policy.delay(32));
	}
}
