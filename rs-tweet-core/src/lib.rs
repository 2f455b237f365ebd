//! Corpus-to-utterance pipeline for a text-publishing bot.
//!
//! This crate provides:
//! - A corpus buffer fed by a streaming source with a count-based stop
//! - A word-level Markov chain builder of configurable order
//! - Bounded random-walk generation and length-constrained composition
//! - A cycling scheduler with per-cycle failure isolation and backoff
//! - The session traits the scheduler talks to, plus an offline replay session
//!
//! Network sessions, credentials and process setup live in the binary crate.

/// Pipeline tuning (counts, budgets, delays).
pub mod config;

/// Append-only corpus buffer and frozen corpus.
pub mod corpus;

/// Error taxonomy shared by the pipeline and its collaborators.
pub mod error;

/// Chain model, generator and composer.
pub mod model;

/// Cycle scheduler, backoff and status snapshot.
pub mod scheduler;

/// Session, stream and publisher interfaces.
pub mod session;

/// File helpers for the replay session.
///
/// Not exposed
pub(crate) mod io;

pub use config::PipelineConfig;
pub use scheduler::{CycleOutcome, Scheduler};
