use std::io;
use std::path::PathBuf;

use rs_tweet_core::error::{AuthError, CredentialError, ModelError};
use thiserror::Error;

/// The configuration file cannot be read or holds unusable values.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("cannot read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("cannot parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Anything that prevents the bot from starting. Always fatal.
#[derive(Error, Debug)]
pub enum StartupError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error(transparent)]
	Model(#[from] ModelError),

	#[error("cannot start status endpoint: {0}")]
	Status(#[from] io::Error),
}
