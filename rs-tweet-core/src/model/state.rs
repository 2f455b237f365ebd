use std::collections::BTreeMap;

use rand::Rng;

use crate::error::ModelError;

/// Outcome of a single step in the chain: either another token or the end
/// of the sentence.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Transition {
	Token(String),
	End,
}

/// Represents a state in a chain model.
///
/// A `State` corresponds to a window of the previous `k` tokens (`key`,
/// tokens joined by a single space) and stores every observed successor.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - Each transition occurrence count is strictly positive
/// - Iteration over transitions is ordered, so sampling with a seeded
///   generator is reproducible
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
	/// Identifier of the state (window of tokens).
	key: String,
	/// Outgoing transitions with their number of observations.
	/// Example: { Token("cat") => 2, End => 1 }
	transitions: BTreeMap<Transition, usize>,
}

impl State {
	/// Creates a new empty state for the given window.
	pub fn new(key: &str) -> Self {
		Self {
			key: key.to_owned(),
			transitions: BTreeMap::new(),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	/// Records one occurrence of `next`.
	pub fn add_transition(&mut self, next: Transition) {
		*self.transitions.entry(next).or_insert(0) += 1;
	}

	/// Number of times `next` was observed after this state.
	pub fn weight(&self, next: &Transition) -> usize {
		self.transitions.get(next).copied().unwrap_or(0)
	}

	/// Iterates over `(successor, occurrences)` in a stable order.
	pub fn transitions(&self) -> impl Iterator<Item = (&Transition, usize)> {
		self.transitions.iter().map(|(next, occurrence)| (next, *occurrence))
	}

	/// Picks the next step using weighted random sampling.
	///
	/// The probability of selecting a successor is proportional to its
	/// occurrence count. Returns `None` if the state has no transitions.
	pub fn predict<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Transition> {
		sample_weighted(&self.transitions, rng)
	}

	/// Merges another state with the same key into this one, summing counts.
	///
	/// # Errors
	/// Returns an error if the state keys do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), ModelError> {
		if self.key != other.key {
			return Err(ModelError::KeyMismatch {
				left: self.key.clone(),
				right: other.key.clone(),
			});
		}

		for (next, occurrence) in &other.transitions {
			*self.transitions.entry(next.clone()).or_insert(0) += *occurrence;
		}

		Ok(())
	}
}

/// Draws a key from `weights` with probability proportional to its value.
///
/// Performs an O(n) scan with a cumulative subtraction over a single
/// `random_range` draw. Returns `None` on an empty or zero-weight map.
pub(crate) fn sample_weighted<'a, K, R>(weights: &'a BTreeMap<K, usize>, rng: &mut R) -> Option<&'a K>
where
	R: Rng + ?Sized,
{
	let total: usize = weights.values().sum();
	if total == 0 {
		return None;
	}

	let mut r = rng.random_range(0..total);
	for (key, occurrence) in weights {
		if r < *occurrence {
			return Some(key);
		}
		r -= occurrence;
	}

	// Unreachable while r < total
	weights.keys().next_back()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn token(s: &str) -> Transition {
		Transition::Token(s.to_owned())
	}

	#[test]
	fn add_transition_counts_occurrences() {
		let mut state = State::new("cat");
		state.add_transition(token("sat"));
		state.add_transition(token("ran"));
		state.add_transition(token("sat"));

		assert_eq!(state.weight(&token("sat")), 2);
		assert_eq!(state.weight(&token("ran")), 1);
		assert_eq!(state.weight(&Transition::End), 0);
	}

	#[test]
	fn predict_only_returns_observed_successors() {
		let mut state = State::new("cat");
		state.add_transition(token("sat"));
		state.add_transition(Transition::End);

		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..200 {
			let next = state.predict(&mut rng).cloned();
			assert!(next == Some(token("sat")) || next == Some(Transition::End));
		}
	}

	#[test]
	fn predict_on_empty_state_is_none() {
		let state = State::new("lonely");
		let mut rng = StdRng::seed_from_u64(1);
		assert!(state.predict(&mut rng).is_none());
	}

	#[test]
	fn sampling_follows_weights() {
		let mut state = State::new("x");
		for _ in 0..9 {
			state.add_transition(token("heavy"));
		}
		state.add_transition(token("light"));

		let mut rng = StdRng::seed_from_u64(42);
		let heavy = (0..10_000)
			.filter(|_| state.predict(&mut rng) == Some(&token("heavy")))
			.count();
		assert!((8_500..9_500).contains(&heavy), "heavy drawn {heavy} times");
	}

	#[test]
	fn merge_sums_counts_and_checks_keys() {
		let mut left = State::new("the");
		left.add_transition(token("cat"));
		let mut right = State::new("the");
		right.add_transition(token("cat"));
		right.add_transition(token("dog"));

		left.merge(&right).unwrap();
		assert_eq!(left.weight(&token("cat")), 2);
		assert_eq!(left.weight(&token("dog")), 1);

		let other = State::new("a");
		assert!(matches!(left.merge(&other), Err(ModelError::KeyMismatch { .. })));
	}
}
