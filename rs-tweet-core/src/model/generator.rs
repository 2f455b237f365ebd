use rand::Rng;

use super::chain_model::ChainModel;
use super::state::Transition;

/// Default step guard for a single random walk.
pub const DEFAULT_MAX_STEPS: usize = 50;

/// Why a walk stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
	/// `End` was drawn.
	End,
	/// `max_steps` tokens were emitted first.
	StepLimit,
	/// The model has no start windows.
	EmptyModel,
}

/// One generated sequence of tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
	tokens: Vec<String>,
	termination: Termination,
}

impl Utterance {
	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	pub fn termination(&self) -> Termination {
		self.termination
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Tokens joined by a single space.
	pub fn text(&self) -> String {
		self.tokens.join(" ")
	}
}

/// Performs a bounded random walk over `model`.
///
/// # Behavior
/// - An empty model returns an empty utterance immediately.
/// - A start window is drawn proportionally to its weight and its tokens
///   are emitted.
/// - The next token is then drawn from the state of the last `k` emitted
///   tokens, until `End` is drawn or `max_steps` tokens were emitted.
///
/// # Notes
/// - Both output length and running time are bounded by `max_steps`, even
///   when the table contains cycles that never reach `End`.
/// - `max_steps == 0` always yields an empty utterance.
pub fn generate<R: Rng + ?Sized>(model: &ChainModel, max_steps: usize, rng: &mut R) -> Utterance {
	let start = match model.pick_start(rng) {
		Some(start) => start,
		None => {
			return Utterance {
				tokens: Vec::new(),
				termination: Termination::EmptyModel,
			};
		}
	};

	let mut tokens: Vec<String> = start.split(' ').map(str::to_owned).collect();
	if tokens.len() >= max_steps {
		tokens.truncate(max_steps);
		return Utterance {
			tokens,
			termination: Termination::StepLimit,
		};
	}

	let order = model.order();
	let mut window = start.to_owned();
	loop {
		// A missing state cannot happen for a built model; treat it as the end
		let next = model.state(&window).and_then(|state| state.predict(rng));
		match next {
			Some(Transition::Token(token)) => tokens.push(token.clone()),
			Some(Transition::End) | None => {
				return Utterance {
					tokens,
					termination: Termination::End,
				};
			}
		}

		if tokens.len() >= max_steps {
			return Utterance {
				tokens,
				termination: Termination::StepLimit,
			};
		}

		let keep = tokens.len().min(order);
		window = tokens[tokens.len() - keep..].join(" ");
	}
}
