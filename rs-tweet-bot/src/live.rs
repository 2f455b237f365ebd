use std::path::Path;

use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use rs_tweet_core::error::{AuthError, IngestionError, PublishError, RejectionReason};
use rs_tweet_core::session::{FeedEvent, FragmentSource, Publisher, Session};
use serde::Deserialize;

use crate::config::Config;
use crate::credentials::{AccessToken, Credentials};
use crate::error::StartupError;

/// Network [`Session`]: a newline-delimited JSON stream for ingestion and a
/// form POST endpoint for publication, both authenticated with a bearer
/// token.
#[derive(Debug)]
pub struct HttpSession {
	client: Client,
	token: AccessToken,
	stream_url: String,
	publish_url: String,
}

impl HttpSession {
	/// Signs in and returns a ready session.
	///
	/// # Behavior
	/// - Uses the cached token file when present, otherwise performs the
	///   handshake and caches its result.
	/// - Calls `verifyUrl` when configured.
	///
	/// # Errors
	/// Any failure here is fatal: unreadable token cache, rejected handshake
	/// or verification.
	pub async fn connect(config: &Config, credentials: &Credentials) -> Result<Self, StartupError> {
		let client = Client::builder()
			.connect_timeout(config.pipeline.io_timeout())
			.user_agent(concat!("rs-tweet/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| AuthError::Transport(e.to_string()))?;

		let token = sign_in(&client, credentials, &config.token_path, &config.token_url).await?;
		if let Some(url) = &config.verify_url {
			verify(&client, &token, url).await?;
		}
		info!("signed in as {}", credentials.app_name);

		Ok(Self {
			client,
			token,
			stream_url: config.stream_url.clone(),
			publish_url: config.publish_url.clone(),
		})
	}
}

impl Session for HttpSession {
	type Stream = HttpFeed;
	type Publisher = HttpPublisher;

	async fn open_stream(&self) -> Result<Self::Stream, IngestionError> {
		let response = self
			.client
			.get(&self.stream_url)
			.bearer_auth(&self.token.token)
			.send()
			.await
			.map_err(|e| IngestionError::Open(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(IngestionError::Open(format!("stream answered {status}")));
		}
		debug!("stream opened on {}", self.stream_url);

		Ok(HttpFeed {
			response,
			pending: Vec::new(),
		})
	}

	async fn open_publisher(&self) -> Result<Self::Publisher, PublishError> {
		Ok(HttpPublisher {
			client: self.client.clone(),
			url: self.publish_url.clone(),
			token: self.token.token.clone(),
		})
	}
}

/// Live feed body, consumed chunk by chunk.
#[derive(Debug)]
pub struct HttpFeed {
	response: Response,
	/// Bytes received but not yet split into lines.
	pending: Vec<u8>,
}

impl FragmentSource for HttpFeed {
	async fn next_event(&mut self) -> Result<Option<FeedEvent>, IngestionError> {
		loop {
			if let Some(line) = take_line(&mut self.pending) {
				// Blank lines are keep-alives
				if line.trim().is_empty() {
					continue;
				}
				return Ok(Some(parse_event_line(&line)));
			}

			match self.response.chunk().await {
				Ok(Some(bytes)) => self.pending.extend_from_slice(&bytes),
				// The sample stream never ends on its own
				Ok(None) => return Err(IngestionError::Closed),
				Err(e) => return Err(IngestionError::Transport(e.to_string())),
			}
		}
	}
}

/// Publishes through a form POST (`status=<message>`).
#[derive(Debug)]
pub struct HttpPublisher {
	client: Client,
	url: String,
	token: String,
}

impl Publisher for HttpPublisher {
	async fn publish(&mut self, message: &str) -> Result<(), PublishError> {
		let response = self
			.client
			.post(&self.url)
			.bearer_auth(&self.token)
			.form(&[("status", message)])
			.send()
			.await
			.map_err(|e| PublishError::Transport(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(());
		}
		let body = response.text().await.unwrap_or_default();
		Err(PublishError::Rejected(classify_rejection(status, &body)))
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	token_secret: String,
}

/// Returns the cached token, or performs the handshake and caches it.
async fn sign_in(
	client: &Client,
	credentials: &Credentials,
	token_path: &Path,
	token_url: &str,
) -> Result<AccessToken, StartupError> {
	if token_path.exists() {
		debug!("using cached token from {}", token_path.display());
		return Ok(AccessToken::load(token_path)?);
	}

	info!("no token at {}, authorizing {}", token_path.display(), credentials.app_name);
	let token = handshake(client, credentials, token_url).await?;
	token.store(token_path).map_err(|source| AuthError::TokenCache {
		path: token_path.to_owned(),
		source,
	})?;
	Ok(token)
}

/// Exchanges the consumer key and secret for an access token.
async fn handshake(client: &Client, credentials: &Credentials, token_url: &str) -> Result<AccessToken, AuthError> {
	let response = client
		.post(token_url)
		.basic_auth(&credentials.consumer_key, Some(&credentials.consumer_secret))
		.form(&[("grant_type", "client_credentials")])
		.send()
		.await
		.map_err(|e| AuthError::Transport(e.to_string()))?;

	let status = response.status();
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		return Err(AuthError::Rejected {
			status: status.as_u16(),
			body,
		});
	}

	let body: TokenResponse = response
		.json()
		.await
		.map_err(|e| AuthError::Transport(e.to_string()))?;
	if body.access_token.trim().is_empty() {
		return Err(AuthError::Rejected {
			status: status.as_u16(),
			body: "empty access token".to_owned(),
		});
	}

	Ok(AccessToken {
		token: body.access_token,
		secret: body.token_secret,
	})
}

async fn verify(client: &Client, token: &AccessToken, url: &str) -> Result<(), AuthError> {
	let response = client
		.get(url)
		.bearer_auth(&token.token)
		.send()
		.await
		.map_err(|e| AuthError::Transport(e.to_string()))?;

	let status = response.status();
	if status.is_success() {
		return Ok(());
	}
	let body = response.text().await.unwrap_or_default();
	Err(AuthError::Rejected {
		status: status.as_u16(),
		body,
	})
}

/// Maps a refused publish to the reason reported upstream.
fn classify_rejection(status: StatusCode, body: &str) -> RejectionReason {
	match status {
		StatusCode::TOO_MANY_REQUESTS => RejectionReason::RateLimited,
		StatusCode::PAYLOAD_TOO_LARGE => RejectionReason::TooLong,
		StatusCode::FORBIDDEN if body.to_ascii_lowercase().contains("duplicate") => RejectionReason::Duplicate,
		_ => RejectionReason::Other {
			status: status.as_u16(),
			body: body.to_owned(),
		},
	}
}

/// Removes the first complete line from `pending`, if any.
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
	let end = pending.iter().position(|byte| *byte == b'\n')?;
	let line: Vec<u8> = pending.drain(..=end).collect();
	Some(String::from_utf8_lossy(&line).into_owned())
}

/// Parses one feed line. Anything unreadable counts as an event without text.
fn parse_event_line(line: &str) -> FeedEvent {
	serde_json::from_str(line).unwrap_or_else(|e| {
		debug!("skipping unreadable event: {e}");
		FeedEvent::default()
	})
}
