//! The cycling scheduler driving the whole pipeline.
//!
//! Each cycle ingests a fresh corpus, builds a chain model from it, composes
//! one message and publishes it. A failed cycle is logged and followed by an
//! exponential backoff; the next cycle always runs.

use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::PipelineConfig;
use crate::corpus::CorpusBuffer;
use crate::error::{CycleError, EmptyModelError, IngestionError, ModelError, PublishError};
use crate::model::chain_model::ChainBuilder;
use crate::model::composer::MessageComposer;
use crate::session::{Publisher, Session};

/// Exponential delay between failed cycles.
pub mod backoff;

/// Shared, serializable view of the scheduler state.
pub mod status;

use backoff::Backoff;
use status::{update_status, Phase, SharedStatus};

/// How a cycle that did not fail ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
	Published(String),
	/// A stop was requested while waiting on the stream.
	Interrupted,
}

/// Runs ingest → build → compose → publish cycles over a [`Session`].
///
/// # Notes
/// - Corpus and model are fresh values each cycle; only the backoff counter
///   and the status snapshot survive between cycles.
/// - Stop requests are honored while ingesting and while sleeping, never in
///   the middle of a publish.
pub struct Scheduler<S> {
	session: S,
	config: PipelineConfig,
	builder: ChainBuilder,
	composer: MessageComposer,
	backoff: Backoff,
	status: SharedStatus,
}

impl<S: Session> Scheduler<S> {
	/// # Errors
	/// Returns an error if the configured order is invalid.
	pub fn new(session: S, config: PipelineConfig) -> Result<Self, ModelError> {
		let builder = ChainBuilder::new(config.order)?;
		let composer = MessageComposer::new(config.max_generation_steps, config.max_compose_attempts);
		let backoff = Backoff::new(config.backoff_base(), config.backoff_max());
		Ok(Self {
			session,
			config,
			builder,
			composer,
			backoff,
			status: SharedStatus::default(),
		})
	}

	/// Reports progress into `status` instead of a private snapshot.
	pub fn with_status(mut self, status: SharedStatus) -> Self {
		self.status = status;
		self
	}

	pub fn status(&self) -> SharedStatus {
		self.status.clone()
	}

	pub fn backoff(&self) -> &Backoff {
		&self.backoff
	}

	/// Cycles until `shutdown` turns `true`.
	pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
		info!(
			"scheduler started: {} fragments per cycle, one message every {:?}",
			self.config.tweet_count,
			self.config.sleep_interval()
		);

		while !*shutdown.borrow() {
			let delay = match self.run_cycle(&mut shutdown).await {
				Ok(CycleOutcome::Published(message)) => {
					self.backoff.reset();
					info!("published {} chars: {message}", message.chars().count());
					update_status(&self.status, |status| {
						status.phase = Phase::Sleeping;
						status.cycles += 1;
						status.published += 1;
						status.consecutive_failures = 0;
						status.last_message = Some(message);
					});
					self.config.sleep_interval()
				}
				Ok(CycleOutcome::Interrupted) => break,
				Err(e) => {
					let delay = self.backoff.fail();
					let failures = self.backoff.failures();
					warn!("cycle failed ({failures} in a row), retrying in {delay:?}: {e}");
					update_status(&self.status, |status| {
						status.phase = Phase::BackingOff;
						status.cycles += 1;
						status.failed += 1;
						status.consecutive_failures = failures;
						status.last_error = Some(e.to_string());
					});
					delay
				}
			};

			tokio::select! {
				biased;
				_ = stop_requested(&mut shutdown) => break,
				_ = tokio::time::sleep(delay) => {}
			}
		}

		update_status(&self.status, |status| status.phase = Phase::Stopped);
		info!("scheduler stopped");
	}

	/// Runs a single cycle.
	///
	/// # Errors
	/// - `Ingestion` when the stream cannot be opened, fails or stalls
	/// - `EmptyModel` when the corpus yields an empty message; nothing is
	///   published in that case
	/// - `Publish` when the publisher cannot be opened, rejects the message
	///   or times out
	pub async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleOutcome, CycleError> {
		let io_timeout = self.config.io_timeout();
		let separator = self.config.sentence_separator.as_str();
		let target = self.config.tweet_count;

		update_status(&self.status, |status| status.phase = Phase::Ingesting);
		let mut buffer = CorpusBuffer::new(separator).with_idle_timeout(io_timeout);
		let received = tokio::select! {
			biased;
			_ = stop_requested(shutdown) => {
				info!("stop requested during ingestion");
				return Ok(CycleOutcome::Interrupted);
			}
			result = ingest_from(&self.session, &mut buffer, io_timeout, target) => result?,
		};
		if received < target {
			warn!("stream ended early: {received} of {target} fragments");
		}
		let corpus = buffer.freeze();

		update_status(&self.status, |status| status.phase = Phase::Building);
		let model = self.builder.build(corpus.text(), separator);

		update_status(&self.status, |status| status.phase = Phase::Composing);
		let message = self
			.composer
			.compose(&model, self.config.max_message_length, &mut rand::rng());
		if message.is_empty() {
			return Err(EmptyModelError {
				fragments: corpus.fragment_count(),
			}
			.into());
		}

		update_status(&self.status, |status| status.phase = Phase::Publishing);
		let mut publisher = timeout(io_timeout, self.session.open_publisher())
			.await
			.map_err(|_| PublishError::Timeout(io_timeout))??;
		timeout(io_timeout, publisher.publish(&message))
			.await
			.map_err(|_| PublishError::Timeout(io_timeout))??;

		Ok(CycleOutcome::Published(message))
	}
}

/// Opens a stream on `session` and fills `buffer` from it.
///
/// Opening counts as part of the ingestion wait, so both steps are raced
/// against stop requests together.
async fn ingest_from<S: Session>(
	session: &S,
	buffer: &mut CorpusBuffer,
	io_timeout: Duration,
	target: usize,
) -> Result<usize, IngestionError> {
	let mut stream = timeout(io_timeout, session.open_stream())
		.await
		.map_err(|_| IngestionError::Timeout(io_timeout))??;
	buffer.ingest(&mut stream, target).await
}

/// Resolves once a stop was requested. A dropped sender never stops.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
	if shutdown.wait_for(|stop| *stop).await.is_err() {
		std::future::pending::<()>().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RejectionReason;
	use crate::session::{FeedEvent, FragmentSource, IterSource};
	use std::sync::{Arc, Mutex};
	use std::vec;
	use super::status::read_status;

	#[derive(Default)]
	struct Recorder {
		opens: usize,
		publish_calls: usize,
		published: Vec<String>,
		reject_calls: Vec<usize>,
		stop_after_opens: Option<usize>,
		stop_after_publishes: Option<usize>,
		stop: Option<watch::Sender<bool>>,
	}

	impl Recorder {
		fn request_stop(&mut self) {
			if let Some(stop) = &self.stop {
				let _ = stop.send(true);
			}
		}
	}

	struct ScriptedSession {
		fragments: Vec<&'static str>,
		stream_fails: bool,
		/// The stream goes silent once its fragments are used up.
		stream_stalls: bool,
		open_hangs: bool,
		publish_hangs: bool,
		recorder: Arc<Mutex<Recorder>>,
	}

	impl ScriptedSession {
		fn new(fragments: Vec<&'static str>) -> Self {
			Self {
				fragments,
				stream_fails: false,
				stream_stalls: false,
				open_hangs: false,
				publish_hangs: false,
				recorder: Arc::default(),
			}
		}
	}

	struct ScriptedStream {
		events: IterSource<vec::IntoIter<Result<FeedEvent, IngestionError>>>,
		stalls: bool,
	}

	impl FragmentSource for ScriptedStream {
		async fn next_event(&mut self) -> Result<Option<FeedEvent>, IngestionError> {
			match self.events.next_event().await? {
				None if self.stalls => std::future::pending().await,
				event => Ok(event),
			}
		}
	}

	struct ScriptedPublisher {
		hangs: bool,
		recorder: Arc<Mutex<Recorder>>,
	}

	impl Session for ScriptedSession {
		type Stream = ScriptedStream;
		type Publisher = ScriptedPublisher;

		async fn open_stream(&self) -> Result<Self::Stream, IngestionError> {
			{
				let mut recorder = self.recorder.lock().unwrap();
				recorder.opens += 1;
				if recorder.stop_after_opens == Some(recorder.opens) {
					recorder.request_stop();
				}
			}
			if self.open_hangs {
				std::future::pending::<()>().await;
			}

			let mut events: Vec<_> = self
				.fragments
				.iter()
				.map(|text| Ok(FeedEvent::with_text(*text)))
				.collect();
			if self.stream_fails {
				events.insert(events.len().min(1), Err(IngestionError::Transport("reset".to_owned())));
			}
			Ok(ScriptedStream {
				events: IterSource::new(events.into_iter()),
				stalls: self.stream_stalls,
			})
		}

		async fn open_publisher(&self) -> Result<Self::Publisher, PublishError> {
			Ok(ScriptedPublisher {
				hangs: self.publish_hangs,
				recorder: self.recorder.clone(),
			})
		}
	}

	impl Publisher for ScriptedPublisher {
		async fn publish(&mut self, message: &str) -> Result<(), PublishError> {
			if self.hangs {
				std::future::pending::<()>().await;
			}

			let mut recorder = self.recorder.lock().unwrap();
			let call = recorder.publish_calls;
			recorder.publish_calls += 1;
			if recorder.stop_after_publishes == Some(recorder.publish_calls) {
				recorder.request_stop();
			}
			if recorder.reject_calls.contains(&call) {
				return Err(PublishError::Rejected(RejectionReason::Duplicate));
			}
			recorder.published.push(message.to_owned());
			Ok(())
		}
	}

	fn config(tweet_count: usize) -> PipelineConfig {
		PipelineConfig {
			tweet_count,
			..PipelineConfig::default()
		}
	}

	#[tokio::test]
	async fn cycle_publishes_message_within_budget() {
		let session = ScriptedSession::new(vec!["the cat sat", "the cat ran", "ignored"]);
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(2)).unwrap();
		let (_stop, mut shutdown) = watch::channel(false);

		let outcome = scheduler.run_cycle(&mut shutdown).await.unwrap();
		let CycleOutcome::Published(message) = outcome else {
			panic!("expected a published message");
		};

		assert!(message.chars().count() <= 140);
		for utterance in message.split("the ").filter(|s| !s.is_empty()) {
			assert!(["cat sat", "cat ran"].contains(&utterance.trim()), "{message:?}");
		}
		assert_eq!(recorder.lock().unwrap().published, vec![message]);
	}

	#[tokio::test]
	async fn empty_corpus_is_not_published() {
		let session = ScriptedSession::new(vec![]);
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(10)).unwrap();
		let (_stop, mut shutdown) = watch::channel(false);

		let err = scheduler.run_cycle(&mut shutdown).await.unwrap_err();
		assert!(matches!(err, CycleError::EmptyModel(EmptyModelError { fragments: 0 })));
		assert_eq!(recorder.lock().unwrap().publish_calls, 0);
	}

	#[tokio::test]
	async fn stream_failure_aborts_cycle_before_publish() {
		let mut session = ScriptedSession::new(vec!["a b", "c d", "e f"]);
		session.stream_fails = true;
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(3)).unwrap();
		let (_stop, mut shutdown) = watch::channel(false);

		let err = scheduler.run_cycle(&mut shutdown).await.unwrap_err();
		assert!(matches!(err, CycleError::Ingestion(IngestionError::Transport(_))));
		assert_eq!(recorder.lock().unwrap().publish_calls, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_publish_times_out() {
		let mut session = ScriptedSession::new(vec!["hello world"]);
		session.publish_hangs = true;
		let mut scheduler = Scheduler::new(session, config(1)).unwrap();
		let (_stop, mut shutdown) = watch::channel(false);

		let err = scheduler.run_cycle(&mut shutdown).await.unwrap_err();
		assert!(matches!(err, CycleError::Publish(PublishError::Timeout(d)) if d == Duration::from_secs(90)));
	}

	#[tokio::test]
	async fn stop_before_ingestion_interrupts_cycle() {
		let session = ScriptedSession::new(vec!["a b"]);
		let mut scheduler = Scheduler::new(session, config(1)).unwrap();
		let (stop, mut shutdown) = watch::channel(false);
		stop.send(true).unwrap();

		let outcome = scheduler.run_cycle(&mut shutdown).await.unwrap();
		assert_eq!(outcome, CycleOutcome::Interrupted);
	}

	#[tokio::test(start_paused = true)]
	async fn stop_while_stream_is_silent_interrupts_cycle() {
		let mut session = ScriptedSession::new(vec!["the cat sat"]);
		session.stream_stalls = true;
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(5)).unwrap();
		let (stop, mut shutdown) = watch::channel(false);

		let started = tokio::time::Instant::now();
		let (outcome, _) = tokio::join!(scheduler.run_cycle(&mut shutdown), async move {
			tokio::time::sleep(Duration::from_secs(5)).await;
			stop.send(true).unwrap();
			stop
		});

		assert_eq!(outcome.unwrap(), CycleOutcome::Interrupted);
		assert_eq!(started.elapsed(), Duration::from_secs(5));
		assert_eq!(recorder.lock().unwrap().publish_calls, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn stop_while_opening_stream_is_not_a_failure() {
		let mut session = ScriptedSession::new(vec!["the cat sat"]);
		session.open_hangs = true;
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(1)).unwrap();
		let (stop, shutdown) = watch::channel(false);

		let started = tokio::time::Instant::now();
		tokio::join!(scheduler.run(shutdown), async move {
			tokio::time::sleep(Duration::from_secs(1)).await;
			stop.send(true).unwrap();
		});

		assert_eq!(started.elapsed(), Duration::from_secs(1));
		assert_eq!(recorder.lock().unwrap().opens, 1);
		assert_eq!(recorder.lock().unwrap().publish_calls, 0);

		let status = read_status(&scheduler.status());
		assert_eq!(status.phase, Phase::Stopped);
		assert_eq!(status.failed, 0);
		assert_eq!(status.last_error, None);
		assert_eq!(scheduler.backoff().failures(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn rejected_publish_does_not_prevent_next_cycle() {
		let session = ScriptedSession::new(vec!["the cat sat", "the cat ran"]);
		let recorder = session.recorder.clone();
		let (stop, shutdown) = watch::channel(false);
		{
			let mut recorder = recorder.lock().unwrap();
			recorder.reject_calls = vec![0];
			recorder.stop_after_publishes = Some(3);
			recorder.stop = Some(stop);
		}
		let mut scheduler = Scheduler::new(session, config(2)).unwrap();

		scheduler.run(shutdown).await;

		let recorder = recorder.lock().unwrap();
		assert_eq!(recorder.publish_calls, 3);
		assert_eq!(recorder.published.len(), 2);

		let status = read_status(&scheduler.status());
		assert_eq!(status.phase, Phase::Stopped);
		assert_eq!(status.cycles, 3);
		assert_eq!(status.failed, 1);
		assert_eq!(status.published, 2);
		assert_eq!(status.consecutive_failures, 0);
		assert!(status.last_error.unwrap().contains("duplicate"));
		assert_eq!(scheduler.backoff().failures(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn repeated_failures_back_off_exponentially() {
		let mut session = ScriptedSession::new(vec!["a b", "c d"]);
		session.stream_fails = true;
		let recorder = session.recorder.clone();
		let (stop, shutdown) = watch::channel(false);
		{
			let mut recorder = recorder.lock().unwrap();
			recorder.stop_after_opens = Some(4);
			recorder.stop = Some(stop);
		}
		let mut scheduler = Scheduler::new(session, config(2)).unwrap();

		let started = tokio::time::Instant::now();
		scheduler.run(shutdown).await;

		// 30s + 60s + 120s; the fourth cycle fails too but its 240s wait is cut by the stop
		assert_eq!(started.elapsed(), Duration::from_secs(210));
		let status = read_status(&scheduler.status());
		assert_eq!(status.failed, 4);
		assert_eq!(status.consecutive_failures, 4);
		assert_eq!(status.published, 0);
		assert_eq!(recorder.lock().unwrap().opens, 4);
	}

	#[tokio::test(start_paused = true)]
	async fn stop_during_sleep_ends_run_without_waiting() {
		let session = ScriptedSession::new(vec!["the cat sat"]);
		let recorder = session.recorder.clone();
		let mut scheduler = Scheduler::new(session, config(1)).unwrap();
		let (stop, shutdown) = watch::channel(false);

		let started = tokio::time::Instant::now();
		tokio::join!(scheduler.run(shutdown), async move {
			tokio::time::sleep(Duration::from_secs(60)).await;
			stop.send(true).unwrap();
		});

		assert_eq!(started.elapsed(), Duration::from_secs(60));
		let recorder = recorder.lock().unwrap();
		assert_eq!(recorder.published.len(), 1);
		assert!(recorder.published[0].starts_with("the cat sat"));
		assert_eq!(read_status(&scheduler.status()).phase, Phase::Stopped);
	}

	#[test]
	fn invalid_order_is_rejected() {
		let config = PipelineConfig { order: 0, ..PipelineConfig::default() };
		assert!(Scheduler::new(ScriptedSession::new(vec![]), config).is_err());
	}
}
