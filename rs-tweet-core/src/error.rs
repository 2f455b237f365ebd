use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The credential descriptor or token file is missing or malformed.
///
/// Fatal, only raised at startup.
#[derive(Error, Debug)]
pub enum CredentialError {
	#[error("cannot read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("malformed credentials in {path}: {reason}")]
	Malformed { path: PathBuf, reason: String },
}

/// The authorization handshake was rejected or could not complete.
///
/// Fatal, only raised at startup.
#[derive(Error, Debug)]
pub enum AuthError {
	#[error("authorization rejected ({status}): {body}")]
	Rejected { status: u16, body: String },

	#[error("authorization transport failure: {0}")]
	Transport(String),

	#[error("cannot cache token in {path}: {source}")]
	TokenCache {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// The streaming source failed during an ingestion session.
#[derive(Error, Debug)]
pub enum IngestionError {
	#[error("cannot open stream: {0}")]
	Open(String),

	#[error("stream transport failure: {0}")]
	Transport(String),

	#[error("stream closed by the remote end")]
	Closed,

	#[error("stream stalled for {0:?}")]
	Timeout(Duration),
}

/// The corpus produced nothing publishable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("corpus of {fragments} fragments produced an empty message")]
pub struct EmptyModelError {
	pub fragments: usize,
}

/// Why the publish interface refused a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
	Duplicate,
	TooLong,
	RateLimited,
	Other { status: u16, body: String },
}

impl fmt::Display for RejectionReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RejectionReason::Duplicate => f.write_str("duplicate content"),
			RejectionReason::TooLong => f.write_str("message too long"),
			RejectionReason::RateLimited => f.write_str("rate limited"),
			RejectionReason::Other { status, body } => write!(f, "status {status}: {body}"),
		}
	}
}

/// The publish interface rejected the message or could not be reached.
#[derive(Error, Debug)]
pub enum PublishError {
	#[error("publish rejected: {0}")]
	Rejected(RejectionReason),

	#[error("publish transport failure: {0}")]
	Transport(String),

	#[error("publish timed out after {0:?}")]
	Timeout(Duration),
}

/// Misuse of the chain model API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
	#[error("order must be >= 1, got {0}")]
	InvalidOrder(usize),

	#[error("order mismatch: {left} vs {right}")]
	OrderMismatch { left: usize, right: usize },

	#[error("state key mismatch: {left:?} vs {right:?}")]
	KeyMismatch { left: String, right: String },
}

/// Any failure that aborts a single scheduler cycle.
///
/// None of these are fatal: the scheduler logs them and backs off.
#[derive(Error, Debug)]
pub enum CycleError {
	#[error(transparent)]
	Ingestion(#[from] IngestionError),

	#[error(transparent)]
	EmptyModel(#[from] EmptyModelError),

	#[error(transparent)]
	Publish(#[from] PublishError),
}
