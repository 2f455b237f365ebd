//! Statistical side of the pipeline.
//!
//! This module provides a word-level Markov chain text generator, including:
//! - Chain states with weighted transitions (`State`, `Transition`)
//! - Order-`k` models and their builder (`ChainModel`, `ChainBuilder`)
//! - Bounded random walks (`generate`, `Utterance`)
//! - Length-constrained message assembly (`MessageComposer`)

/// Order-`k` chain model and the builder turning corpus text into one.
///
/// Handles sentence splitting, tokenization, transition counting and
/// parallel learning of large corpora.
pub mod chain_model;

/// Greedy, length-bounded concatenation of generated utterances.
pub mod composer;

/// Bounded random walk over a chain model.
pub mod generator;

/// Single chain state (window of tokens) and weighted sampling.
mod state;

pub use chain_model::{ChainBuilder, ChainModel};
pub use composer::MessageComposer;
pub use generator::{generate, Termination, Utterance};
pub use state::{State, Transition};
