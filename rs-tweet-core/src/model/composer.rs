use log::trace;
use rand::Rng;

use super::chain_model::ChainModel;
use super::generator::{generate, DEFAULT_MAX_STEPS};

/// Default character budget of a message.
pub const DEFAULT_MAX_LENGTH: usize = 140;

/// Default number of candidate utterances tried after the first one.
pub const DEFAULT_MAX_ATTEMPTS: usize = 64;

/// Assembles length-bounded messages out of generated utterances.
///
/// # Behavior
/// - The first utterance is truncated to the budget when it does not fit.
/// - Further utterances are appended, separated by a single space, while the
///   result stays strictly shorter than the budget.
/// - Composition stops at the first candidate that does not fit, or after
///   `max_attempts` candidates.
///
/// Lengths are counted in characters, never bytes.
#[derive(Clone, Debug)]
pub struct MessageComposer {
	/// Step guard handed to every walk.
	pub max_steps: usize,
	/// Upper bound on candidates generated after the first utterance.
	pub max_attempts: usize,
}

impl Default for MessageComposer {
	fn default() -> Self {
		Self {
			max_steps: DEFAULT_MAX_STEPS,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
		}
	}
}

impl MessageComposer {
	pub fn new(max_steps: usize, max_attempts: usize) -> Self {
		Self { max_steps, max_attempts }
	}

	/// Composes a message of at most `max_length` characters.
	///
	/// An empty model always produces an empty message.
	pub fn compose<R: Rng + ?Sized>(&self, model: &ChainModel, max_length: usize, rng: &mut R) -> String {
		if model.is_empty() || max_length == 0 {
			return String::new();
		}

		let mut message = generate(model, self.max_steps, rng).text();
		let mut length = message.chars().count();
		if length >= max_length {
			return truncate_chars(&message, max_length);
		}

		for attempt in 0..self.max_attempts {
			let candidate = generate(model, self.max_steps, rng).text();
			if candidate.is_empty() {
				continue;
			}

			let candidate_length = candidate.chars().count();
			if length + 1 + candidate_length >= max_length {
				trace!("candidate of {candidate_length} chars does not fit after {attempt} attempts");
				break;
			}

			if message.is_empty() {
				message = candidate;
				length = candidate_length;
			} else {
				message.push(' ');
				message.push_str(&candidate);
				length += 1 + candidate_length;
			}
		}

		message
	}
}

/// Returns the first `max` characters of `s` (UTF-8 safe).
fn truncate_chars(s: &str, max: usize) -> String {
	match s.char_indices().nth(max) {
		Some((index, _)) => s[..index].to_owned(),
		None => s.to_owned(),
	}
}
