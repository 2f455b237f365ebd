use std::time::Duration;

use serde::Deserialize;

use crate::model::composer::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_LENGTH};
use crate::model::generator::DEFAULT_MAX_STEPS;

/// Tuning of one ingest → build → compose → publish pass and of the pacing
/// between passes.
///
/// Keys are camelCase when deserialized (`tweetCount`, `maxMessageLength`,
/// ...). Missing keys take their default.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
	/// Fragments to ingest per cycle.
	pub tweet_count: usize,
	pub sleep_interval_minutes: u64,
	pub max_message_length: usize,
	pub sentence_separator: String,
	pub max_generation_steps: usize,
	/// Window size `k` of the chain model.
	pub order: usize,
	pub max_compose_attempts: usize,
	pub backoff_base_secs: u64,
	pub backoff_max_secs: u64,
	/// Bound on every external call: opening a stream, each stream event,
	/// opening a publisher and publishing.
	pub io_timeout_secs: u64,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			tweet_count: 10_000,
			sleep_interval_minutes: 15,
			max_message_length: DEFAULT_MAX_LENGTH,
			sentence_separator: "\n".to_owned(),
			max_generation_steps: DEFAULT_MAX_STEPS,
			order: 1,
			max_compose_attempts: DEFAULT_MAX_ATTEMPTS,
			backoff_base_secs: 30,
			backoff_max_secs: 900,
			io_timeout_secs: 90,
		}
	}
}

impl PipelineConfig {
	pub fn sleep_interval(&self) -> Duration {
		Duration::from_secs(self.sleep_interval_minutes.saturating_mul(60))
	}

	pub fn backoff_base(&self) -> Duration {
		Duration::from_secs(self.backoff_base_secs)
	}

	pub fn backoff_max(&self) -> Duration {
		Duration::from_secs(self.backoff_max_secs)
	}

	pub fn io_timeout(&self) -> Duration {
		Duration::from_secs(self.io_timeout_secs)
	}

	/// Checks that every bound is usable.
	///
	/// # Errors
	/// Returns a description of the first invalid value.
	pub fn validate(&self) -> Result<(), String> {
		let at_least_one = [
			("tweetCount", self.tweet_count as u64),
			("maxMessageLength", self.max_message_length as u64),
			("maxGenerationSteps", self.max_generation_steps as u64),
			("order", self.order as u64),
			("maxComposeAttempts", self.max_compose_attempts as u64),
			("ioTimeoutSecs", self.io_timeout_secs),
		];
		for (name, value) in at_least_one {
			if value < 1 {
				return Err(format!("{name} must be >= 1, got {value}"));
			}
		}

		if self.sentence_separator.is_empty() {
			return Err("sentenceSeparator cannot be empty".to_owned());
		}
		if self.backoff_base_secs > self.backoff_max_secs {
			return Err(format!(
				"backoffBaseSecs ({}) cannot exceed backoffMaxSecs ({})",
				self.backoff_base_secs, self.backoff_max_secs
			));
		}
		Ok(())
	}
}
