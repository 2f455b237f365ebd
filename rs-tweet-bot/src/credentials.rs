use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rs_tweet_core::error::CredentialError;
use serde::Deserialize;

/// Application identity, read from a JSON descriptor:
///
/// ```json
/// { "appname": "...", "consumerkey": "...", "consumersecret": "..." }
/// ```
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct Credentials {
	#[serde(rename = "appname")]
	pub app_name: String,
	#[serde(rename = "consumerkey")]
	pub consumer_key: String,
	#[serde(rename = "consumersecret")]
	pub consumer_secret: String,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("app_name", &self.app_name)
			.field("consumer_key", &self.consumer_key)
			.field("consumer_secret", &"<redacted>")
			.finish()
	}
}

impl Credentials {
	/// Reads and checks the descriptor at `path`.
	///
	/// # Errors
	/// Missing file, invalid JSON, missing or empty fields.
	pub fn load(path: &Path) -> Result<Self, CredentialError> {
		let raw = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
		Self::parse(path, &raw)
	}

	fn parse(path: &Path, raw: &str) -> Result<Self, CredentialError> {
		let credentials: Credentials =
			serde_json::from_str(raw).map_err(|e| malformed(path, e.to_string()))?;

		for (name, value) in [
			("appname", &credentials.app_name),
			("consumerkey", &credentials.consumer_key),
			("consumersecret", &credentials.consumer_secret),
		] {
			if value.trim().is_empty() {
				return Err(malformed(path, format!("{name} is empty")));
			}
		}
		Ok(credentials)
	}
}

/// User token cached on disk as two lines: access token, then access secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
	pub token: String,
	pub secret: String,
}

impl fmt::Debug for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("AccessToken(<redacted>)")
	}
}

impl AccessToken {
	/// Loads the token file. The secret line may be absent or empty.
	///
	/// # Errors
	/// Missing file or empty first line.
	pub fn load(path: &Path) -> Result<Self, CredentialError> {
		let raw = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
		let mut lines = raw.lines().map(str::trim);

		let token = lines.next().unwrap_or_default().to_owned();
		if token.is_empty() {
			return Err(malformed(path, "access token line is empty".to_owned()));
		}
		let secret = lines.next().unwrap_or_default().to_owned();
		Ok(Self { token, secret })
	}

	pub fn store(&self, path: &Path) -> io::Result<()> {
		fs::write(path, format!("{}\n{}\n", self.token, self.secret))
	}
}

fn io_error(path: &Path, source: io::Error) -> CredentialError {
	CredentialError::Io {
		path: PathBuf::from(path),
		source,
	}
}

fn malformed(path: &Path, reason: String) -> CredentialError {
	CredentialError::Malformed {
		path: PathBuf::from(path),
		reason,
	}
}
