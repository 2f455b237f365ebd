use std::path::PathBuf;
use std::vec;

use log::info;

use super::{FeedEvent, IterSource, Publisher, Session};
use crate::error::{IngestionError, PublishError, RejectionReason};
use crate::io::{append_line, read_file};

/// Offline [`Session`] backed by local files.
///
/// # Behavior
/// - Every stream replays the lines of `source` from the top, one event per
///   line. The file is re-read each time, so it can be edited between cycles.
/// - Published messages are logged and, when `output` is set, appended to
///   that file one per line.
#[derive(Clone, Debug)]
pub struct ReplaySession {
	source: PathBuf,
	output: Option<PathBuf>,
}

impl ReplaySession {
	pub fn new(source: impl Into<PathBuf>, output: Option<PathBuf>) -> Self {
		Self {
			source: source.into(),
			output,
		}
	}
}

/// Event stream over the lines of the replayed file.
pub type ReplayStream = IterSource<vec::IntoIter<Result<FeedEvent, IngestionError>>>;

impl Session for ReplaySession {
	type Stream = ReplayStream;
	type Publisher = ReplayPublisher;

	async fn open_stream(&self) -> Result<Self::Stream, IngestionError> {
		let lines = read_file(&self.source)
			.map_err(|e| IngestionError::Open(format!("{}: {e}", self.source.display())))?;
		let events: Vec<_> = lines.into_iter().map(|line| Ok(FeedEvent::with_text(line))).collect();
		Ok(IterSource::new(events.into_iter()))
	}

	async fn open_publisher(&self) -> Result<Self::Publisher, PublishError> {
		Ok(ReplayPublisher {
			output: self.output.clone(),
		})
	}
}

/// Writes messages to the log and optionally to a file.
#[derive(Debug)]
pub struct ReplayPublisher {
	output: Option<PathBuf>,
}

impl Publisher for ReplayPublisher {
	async fn publish(&mut self, message: &str) -> Result<(), PublishError> {
		if message.contains('\n') {
			// One message per line in the output file
			return Err(PublishError::Rejected(RejectionReason::Other {
				status: 400,
				body: "message spans several lines".to_owned(),
			}));
		}

		info!("replay publish: {message}");
		if let Some(path) = &self.output {
			append_line(path, message)
				.map_err(|e| PublishError::Transport(format!("{}: {e}", path.display())))?;
		}
		Ok(())
	}
}
