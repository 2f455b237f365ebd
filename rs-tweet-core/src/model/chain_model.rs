use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

use log::debug;
use rand::Rng;

use super::state::{sample_weighted, State, Transition};
use crate::error::ModelError;

/// Corpora with fewer sentences than this are learned on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// A word-level Markov chain of order `k`.
///
/// The `ChainModel` stores one [`State`] per observed window of `k` tokens and
/// a weighted set of sentence-start windows. It is produced by a
/// [`ChainBuilder`] and never changes afterwards.
///
/// # Invariants
/// - `order` is always >= 1
/// - Every start window and every window reachable from it has at least one
///   outgoing transition (possibly only `End`)
/// - Maps are ordered, so two models built from the same text compare equal
///   and iterate identically
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainModel {
	/// Window size (number of previous tokens forming a state)
	order: usize,

	/// Sentence-start windows and how often each opened a sentence
	starts: BTreeMap<String, usize>,

	/// Mapping from a window to its corresponding state
	states: BTreeMap<String, State>,
}

impl ChainModel {
	fn empty(order: usize) -> Self {
		Self {
			order,
			starts: BTreeMap::new(),
			states: BTreeMap::new(),
		}
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// `true` when no sentence was learned; such a model generates nothing.
	pub fn is_empty(&self) -> bool {
		self.starts.is_empty()
	}

	pub fn state_count(&self) -> usize {
		self.states.len()
	}

	/// Looks up the state for a window (tokens joined by a single space).
	pub fn state(&self, key: &str) -> Option<&State> {
		self.states.get(key)
	}

	pub fn states(&self) -> impl Iterator<Item = &State> {
		self.states.values()
	}

	/// Weight of `key` in the start distribution (0 when absent).
	pub fn start_weight(&self, key: &str) -> usize {
		self.starts.get(key).copied().unwrap_or(0)
	}

	pub fn starts(&self) -> impl Iterator<Item = (&str, usize)> {
		self.starts.iter().map(|(key, weight)| (key.as_str(), *weight))
	}

	/// Draws a start window proportionally to its weight.
	pub(crate) fn pick_start<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		sample_weighted(&self.starts, rng).map(String::as_str)
	}

	/// Learns one sentence.
	///
	/// Registers its first `min(k, len)` tokens as a start window, then one
	/// transition per position: window → next token, or window → `End` at
	/// the last token. Sentences without tokens are ignored.
	fn add_sentence(&mut self, sentence: &str) {
		let tokens: Vec<&str> = sentence.split_whitespace().collect();
		if tokens.is_empty() {
			return;
		}

		let head = tokens.len().min(self.order);
		*self.starts.entry(tokens[..head].join(" ")).or_insert(0) += 1;

		for i in head - 1..tokens.len() {
			let window = tokens[i + 1 - head..=i].join(" ");
			let next = match tokens.get(i + 1) {
				Some(token) => Transition::Token((*token).to_owned()),
				None => Transition::End,
			};
			self.states
				.entry(window)
				.or_insert_with_key(|key| State::new(key))
				.add_transition(next);
		}
	}

	/// Merges another model of the same order into this one.
	///
	/// Occurrence counts for matching windows and transitions are summed, so
	/// the merge order never changes the result.
	///
	/// # Errors
	/// Returns an error if the model orders do not match.
	pub(crate) fn merge(&mut self, other: &Self) -> Result<(), ModelError> {
		if self.order != other.order {
			return Err(ModelError::OrderMismatch {
				left: self.order,
				right: other.order,
			});
		}

		for (key, weight) in &other.starts {
			*self.starts.entry(key.clone()).or_insert(0) += *weight;
		}

		for (key, state) in &other.states {
			if let Some(existing) = self.states.get_mut(key) {
				existing.merge(state)?;
			} else {
				self.states.insert(key.clone(), state.clone());
			}
		}

		Ok(())
	}

	#[cfg(test)]
	pub(crate) fn insert_transition(&mut self, key: &str, next: Transition, start: bool) {
		if start {
			*self.starts.entry(key.to_owned()).or_insert(0) += 1;
		}
		self.states
			.entry(key.to_owned())
			.or_insert_with(|| State::new(key))
			.add_transition(next);
	}

	#[cfg(test)]
	pub(crate) fn with_order(order: usize) -> Self {
		Self::empty(order)
	}
}

/// Builds [`ChainModel`]s from frozen corpus text.
///
/// No randomness is involved: the same text, separator and order always
/// produce an identical model.
#[derive(Clone, Debug)]
pub struct ChainBuilder {
	order: usize,
	parallel_threshold: usize,
}

impl ChainBuilder {
	/// Creates a builder for windows of `order` tokens.
	///
	/// # Errors
	/// Returns an error if `order < 1`.
	pub fn new(order: usize) -> Result<Self, ModelError> {
		if order < 1 {
			return Err(ModelError::InvalidOrder(order));
		}
		Ok(Self {
			order,
			parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
		})
	}

	/// Sets the sentence count from which learning is spread over threads.
	pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
		self.parallel_threshold = threshold.max(1);
		self
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Splits `corpus` into sentences on `separator` and learns all of them.
	///
	/// An empty separator treats the whole corpus as a single sentence.
	/// An empty corpus yields an empty model.
	pub fn build(&self, corpus: &str, separator: &str) -> ChainModel {
		let sentences: Vec<&str> = if separator.is_empty() {
			vec![corpus]
		} else {
			corpus.split(separator).collect()
		};
		let sentences: Vec<&str> = sentences
			.into_iter()
			.filter(|s| !s.trim().is_empty())
			.collect();

		let model = if sentences.len() < self.parallel_threshold {
			let mut model = ChainModel::empty(self.order);
			for sentence in &sentences {
				model.add_sentence(sentence);
			}
			model
		} else {
			self.build_parallel(&sentences)
		};

		debug!(
			"built order-{} model: {} sentences, {} states, {} start windows",
			self.order,
			sentences.len(),
			model.state_count(),
			model.starts.len()
		);
		model
	}

	/// Splits sentences into chunks (based on CPU cores * factor), learns a
	/// partial model per chunk on its own thread and merges the partials.
	fn build_parallel(&self, sentences: &[&str]) -> ChainModel {
		let chunks = num_cpus::get() * 8;
		let chunk_size = sentences.len().div_ceil(chunks).max(1);
		let order = self.order;

		let (tx, rx) = mpsc::channel();
		let spawned = thread::scope(|scope| {
			let mut spawned = 0;
			for chunk in sentences.chunks(chunk_size) {
				let tx = tx.clone();
				scope.spawn(move || {
					let mut partial = ChainModel::empty(order);
					for sentence in chunk {
						partial.add_sentence(sentence);
					}
					let sent = tx.send(partial);
					debug_assert!(sent.is_ok(), "receiver dropped before the scope ended");
				});
				spawned += 1;
			}
			spawned
		});
		drop(tx);

		let mut model = ChainModel::empty(order);
		let mut merged = 0;
		for partial in rx.iter() {
			let result = model.merge(&partial);
			debug_assert!(result.is_ok(), "partial model built with another order");
			merged += 1;
		}
		debug_assert_eq!(merged, spawned, "a partial model was lost");
		model
	}
}
