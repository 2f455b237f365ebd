use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use rs_tweet_core::PipelineConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "RS_TWEET_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "rs-tweet.toml";

/// Which session implementation feeds the scheduler.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
	#[default]
	Live,
	Replay,
}

impl FromStr for SessionKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"live" => Ok(SessionKind::Live),
			"replay" => Ok(SessionKind::Replay),
			other => Err(format!("unknown session '{other}', expected 'live' or 'replay'")),
		}
	}
}

/// Full bot configuration: pipeline tuning plus collaborator settings.
///
/// Loaded from a TOML file with camelCase keys; every key is optional.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	#[serde(flatten)]
	pub pipeline: PipelineConfig,

	pub session: SessionKind,

	/// JSON credential descriptor (`appname`, `consumerkey`, `consumersecret`).
	pub credentials_path: PathBuf,
	/// Two-line token cache (access token, access secret).
	pub token_path: PathBuf,

	pub stream_url: String,
	pub publish_url: String,
	pub token_url: String,
	/// Called once at startup with the token when set.
	pub verify_url: Option<String>,

	pub replay_path: PathBuf,
	pub replay_output: Option<PathBuf>,

	/// Address of the status endpoint; empty disables it.
	pub status_bind: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			pipeline: PipelineConfig::default(),
			session: SessionKind::Live,
			credentials_path: PathBuf::from(".credentials"),
			token_path: PathBuf::from(".token"),
			stream_url: "https://stream.twitter.com/1.1/statuses/sample.json".to_owned(),
			publish_url: "https://api.twitter.com/1.1/statuses/update.json".to_owned(),
			token_url: "https://api.twitter.com/oauth2/token".to_owned(),
			verify_url: None,
			replay_path: PathBuf::from("data/replay.txt"),
			replay_output: None,
			status_bind: "127.0.0.1:5000".to_owned(),
		}
	}
}

impl Config {
	/// Loads the file named by `RS_TWEET_CONFIG` (or `rs-tweet.toml`),
	/// applies environment overrides and validates the result.
	///
	/// A missing file is not an error: defaults are used.
	pub fn load() -> Result<Self, ConfigError> {
		let path = read_non_empty_env(CONFIG_ENV)
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

		let mut config = if path.exists() {
			info!("loading configuration from {}", path.display());
			Self::from_file(&path)?
		} else {
			info!("no configuration at {}, using defaults", path.display());
			Self::default()
		};

		config.apply_overrides(|name| std::env::var(name).ok());
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_owned(),
			source,
		})?;
		Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_owned(),
			source,
		})
	}

	pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(raw)
	}

	/// Applies `RS_TWEET_*` overrides read through `lookup`.
	///
	/// Unparsable values are ignored with a warning.
	pub fn apply_overrides<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(value) = parse_override(&lookup, "RS_TWEET_TWEET_COUNT") {
			self.pipeline.tweet_count = value;
		}
		if let Some(value) = parse_override(&lookup, "RS_TWEET_SLEEP_INTERVAL_MINUTES") {
			self.pipeline.sleep_interval_minutes = value;
		}
		if let Some(value) = parse_override(&lookup, "RS_TWEET_SESSION") {
			self.session = value;
		}
		if let Some(value) = lookup("RS_TWEET_STATUS_BIND") {
			self.status_bind = value.trim().to_owned();
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.pipeline.validate().map_err(ConfigError::Invalid)?;
		if self.session == SessionKind::Live {
			for (name, url) in [
				("streamUrl", &self.stream_url),
				("publishUrl", &self.publish_url),
				("tokenUrl", &self.token_url),
			] {
				if url.trim().is_empty() {
					return Err(ConfigError::Invalid(format!("{name} cannot be empty")));
				}
			}
		}
		Ok(())
	}

	pub fn status_bind(&self) -> Option<&str> {
		Some(self.status_bind.trim()).filter(|bind| !bind.is_empty())
	}
}

#[must_use]
fn read_non_empty_env(name: &str) -> Option<String> {
	std::env::var(name)
		.ok()
		.map(|raw| raw.trim().to_string())
		.filter(|value| !value.is_empty())
}

fn parse_override<T, F>(lookup: &F, name: &str) -> Option<T>
where
	T: FromStr,
	T::Err: std::fmt::Display,
	F: Fn(&str) -> Option<String>,
{
	let raw = lookup(name)?;
	let raw = raw.trim();
	if raw.is_empty() {
		return None;
	}
	match raw.parse() {
		Ok(value) => Some(value),
		Err(e) => {
			warn!("ignoring {name}={raw}: {e}");
			None
		}
	}
}
