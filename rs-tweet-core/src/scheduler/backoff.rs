use std::time::Duration;

/// Exponential delay applied after failed cycles.
///
/// The n-th consecutive failure waits `base * 2^(n-1)`, capped at `max`.
/// A success resets the counter.
#[derive(Clone, Debug)]
pub struct Backoff {
	base: Duration,
	max: Duration,
	failures: u32,
}

impl Backoff {
	pub fn new(base: Duration, max: Duration) -> Self {
		Self { base, max, failures: 0 }
	}

	pub fn failures(&self) -> u32 {
		self.failures
	}

	/// Records a failure and returns the delay before the next cycle.
	pub fn fail(&mut self) -> Duration {
		self.failures = self.failures.saturating_add(1);
		self.delay()
	}

	pub fn reset(&mut self) {
		self.failures = 0;
	}

	/// Delay for the current failure count (zero when healthy).
	pub fn delay(&self) -> Duration {
		if self.failures == 0 {
			return Duration::ZERO;
		}
		let exponent = (self.failures - 1).min(20);
		self.base.saturating_mul(1 << exponent).min(self.max)
	}
}
