use std::time::Duration;

use log::debug;

use crate::error::IngestionError;
use crate::session::FragmentSource;

/// Append-only accumulator for the fragments of one ingestion session.
///
/// Fragments are kept in arrival order. [`CorpusBuffer::snapshot`] joins
/// them with the sentence separator, so a fragment never runs into the next
/// one when the text is split into sentences.
#[derive(Debug)]
pub struct CorpusBuffer {
	separator: String,
	fragments: Vec<String>,
	idle_timeout: Option<Duration>,
}

impl CorpusBuffer {
	pub fn new(separator: &str) -> Self {
		Self {
			separator: separator.to_owned(),
			fragments: Vec::new(),
			idle_timeout: None,
		}
	}

	/// Fails ingestion when the source stays silent longer than `timeout`.
	pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
		self.idle_timeout = Some(timeout);
		self
	}

	/// Adds a fragment. Empty fragments are ignored and `false` is returned.
	pub fn append(&mut self, fragment: &str) -> bool {
		if fragment.is_empty() {
			return false;
		}
		self.fragments.push(fragment.to_owned());
		true
	}

	pub fn clear(&mut self) {
		self.fragments.clear();
	}

	pub fn len(&self) -> usize {
		self.fragments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fragments.is_empty()
	}

	pub fn fragments(&self) -> &[String] {
		&self.fragments
	}

	/// The text collected so far.
	///
	/// Fragments are joined with the separator rather than glued together,
	/// so the last word of one fragment never fuses with the first word of
	/// the next.
	pub fn snapshot(&self) -> String {
		self.fragments.join(&self.separator)
	}

	/// Pulls events from `source` until `target` fragments were appended.
	///
	/// # Behavior
	/// - The buffer is cleared first.
	/// - Events without text, or with empty text, do not count.
	/// - A clean end of stream stops early; the count actually appended is
	///   returned.
	///
	/// # Errors
	/// Source failures and idle timeouts propagate. Whatever was appended
	/// before stays in the buffer; callers are expected to drop it.
	pub async fn ingest<S>(&mut self, source: &mut S, target: usize) -> Result<usize, IngestionError>
	where
		S: FragmentSource,
	{
		self.clear();

		while self.fragments.len() < target {
			let event = match self.idle_timeout {
				Some(limit) => tokio::time::timeout(limit, source.next_event())
					.await
					.map_err(|_| IngestionError::Timeout(limit))??,
				None => source.next_event().await?,
			};

			match event {
				Some(event) => {
					if let Some(text) = event.text {
						if self.append(&text) && self.fragments.len() % 1000 == 0 {
							debug!("ingested {} of {target} fragments", self.fragments.len());
						}
					}
				}
				None => {
					debug!("source ended after {} of {target} fragments", self.fragments.len());
					break;
				}
			}
		}

		Ok(self.fragments.len())
	}

	/// Ends the ingestion session, producing a read-only [`Corpus`].
	pub fn freeze(self) -> Corpus {
		Corpus {
			text: self.snapshot(),
			fragments: self.fragments.len(),
		}
	}
}

/// Frozen text of one ingestion session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Corpus {
	text: String,
	fragments: usize,
}

impl Corpus {
	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn fragment_count(&self) -> usize {
		self.fragments
	}

	pub fn is_empty(&self) -> bool {
		self.fragments == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::{FeedEvent, IterSource};

	fn events(texts: &[Option<&str>]) -> Vec<Result<FeedEvent, IngestionError>> {
		texts
			.iter()
			.map(|text| Ok(FeedEvent { text: text.map(str::to_owned) }))
			.collect()
	}

	struct Stalled;

	impl FragmentSource for Stalled {
		async fn next_event(&mut self) -> Result<Option<FeedEvent>, IngestionError> {
			std::future::pending().await
		}
	}

	#[test]
	fn append_ignores_empty_fragments() {
		let mut buffer = CorpusBuffer::new("\n");
		assert!(buffer.append("hello world"));
		assert!(!buffer.append(""));
		assert!(buffer.append("again"));

		assert_eq!(buffer.len(), 2);
		assert_eq!(buffer.snapshot(), "hello world\nagain");

		buffer.clear();
		assert!(buffer.is_empty());
		assert_eq!(buffer.snapshot(), "");
	}

	#[tokio::test]
	async fn ingest_stops_at_target_and_keeps_order() {
		let mut source = IterSource::new(
			events(&[Some("one"), None, Some(""), Some("two"), Some("three"), Some("four")]).into_iter(),
		);
		let mut buffer = CorpusBuffer::new("\n");
		buffer.append("stale");

		let count = buffer.ingest(&mut source, 3).await.unwrap();
		assert_eq!(count, 3);
		assert_eq!(buffer.fragments(), ["one", "two", "three"]);

		// The fourth event was never pulled
		assert_eq!(source.next_event().await.unwrap(), Some(FeedEvent::with_text("four")));
	}

	#[tokio::test]
	async fn ingest_exact_target_then_exhaustion() {
		let mut source = IterSource::new(events(&[Some("a b"), Some("c d")]).into_iter());
		let mut buffer = CorpusBuffer::new("\n");

		assert_eq!(buffer.ingest(&mut source, 2).await.unwrap(), 2);
		let corpus = buffer.freeze();
		assert_eq!(corpus.text(), "a b\nc d");
		assert_eq!(corpus.fragment_count(), 2);
	}

	#[tokio::test]
	async fn ingest_returns_short_count_on_clean_end() {
		let mut source = IterSource::new(events(&[Some("only")]).into_iter());
		let mut buffer = CorpusBuffer::new("\n");
		assert_eq!(buffer.ingest(&mut source, 10).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn ingest_propagates_source_failure() {
		let mut feed = events(&[Some("one")]);
		feed.push(Err(IngestionError::Transport("connection reset".to_owned())));
		feed.extend(events(&[Some("never")]));
		let mut source = IterSource::new(feed.into_iter());
		let mut buffer = CorpusBuffer::new("\n");

		let err = buffer.ingest(&mut source, 5).await.unwrap_err();
		assert!(matches!(err, IngestionError::Transport(_)));
		assert_eq!(buffer.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_source_times_out() {
		let mut buffer = CorpusBuffer::new("\n").with_idle_timeout(Duration::from_secs(30));
		let err = buffer.ingest(&mut Stalled, 1).await.unwrap_err();
		assert!(matches!(err, IngestionError::Timeout(d) if d == Duration::from_secs(30)));
	}

	#[test]
	fn empty_corpus_freezes_empty() {
		let corpus = CorpusBuffer::new("\n").freeze();
		assert!(corpus.is_empty());
		assert_eq!(corpus.text(), "");
	}
}
