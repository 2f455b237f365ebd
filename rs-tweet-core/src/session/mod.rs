//! Boundaries towards the outside world.
//!
//! A [`Session`] hands out one fragment stream and one publisher per cycle.
//! The scheduler only talks to these traits, so a live network session and
//! the offline [`replay::ReplaySession`] are interchangeable.

use serde::Deserialize;

use crate::error::{IngestionError, PublishError};

/// Offline session replaying a local text file.
pub mod replay;

/// One item of the feed. Only `text` matters; everything else is ignored.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedEvent {
	#[serde(default)]
	pub text: Option<String>,
}

impl FeedEvent {
	pub fn with_text(text: impl Into<String>) -> Self {
		Self { text: Some(text.into()) }
	}
}

/// A stream of fragment-bearing events.
#[allow(async_fn_in_trait)]
pub trait FragmentSource {
	/// Waits for the next event.
	///
	/// `Ok(None)` means the stream ended cleanly.
	async fn next_event(&mut self) -> Result<Option<FeedEvent>, IngestionError>;
}

/// Accepts composed messages for publication.
#[allow(async_fn_in_trait)]
pub trait Publisher {
	async fn publish(&mut self, message: &str) -> Result<(), PublishError>;
}

/// An authenticated handle able to open both sides of a cycle.
#[allow(async_fn_in_trait)]
pub trait Session {
	type Stream: FragmentSource;
	type Publisher: Publisher;

	async fn open_stream(&self) -> Result<Self::Stream, IngestionError>;

	async fn open_publisher(&self) -> Result<Self::Publisher, PublishError>;
}

/// Adapts an iterator of events into a [`FragmentSource`].
#[derive(Debug)]
pub struct IterSource<I> {
	events: I,
}

impl<I> IterSource<I> {
	pub fn new(events: I) -> Self {
		Self { events }
	}
}

impl<I> FragmentSource for IterSource<I>
where
	I: Iterator<Item = Result<FeedEvent, IngestionError>>,
{
	async fn next_event(&mut self) -> Result<Option<FeedEvent>, IngestionError> {
		self.events.next().transpose()
	}
}
