use std::process::ExitCode;

use log::{error, info};
use rs_tweet_core::session::replay::ReplaySession;
use rs_tweet_core::session::Session;
use rs_tweet_core::Scheduler;
use tokio::sync::watch;

use crate::config::{Config, SessionKind};
use crate::credentials::Credentials;
use crate::error::StartupError;
use crate::live::HttpSession;

/// Configuration file, environment overrides and validation.
mod config;

/// Credential descriptor and token cache files.
mod credentials;

mod error;

/// Network session: feed stream, publisher and sign-in.
mod live;

/// Read-only HTTP view of the scheduler.
mod status;

/// Main entry point for the bot.
///
/// Loads the configuration, opens the configured session and cycles until
/// Ctrl-C. Exits non-zero only when startup fails.
#[actix_web::main]
async fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("fatal: {e}");
			ExitCode::FAILURE
		}
	}
}

async fn run() -> Result<(), StartupError> {
	let config = Config::load()?;

	match config.session {
		SessionKind::Live => {
			let credentials = Credentials::load(&config.credentials_path)?;
			let session = HttpSession::connect(&config, &credentials).await?;
			serve(session, &config).await
		}
		SessionKind::Replay => {
			info!("replaying {}", config.replay_path.display());
			let session = ReplaySession::new(&config.replay_path, config.replay_output.clone());
			serve(session, &config).await
		}
	}
}

/// Runs the scheduler over `session`, with the status endpoint alongside.
async fn serve<S: Session>(session: S, config: &Config) -> Result<(), StartupError> {
	let mut scheduler = Scheduler::new(session, config.pipeline.clone())?;

	let server = match config.status_bind() {
		Some(bind) => {
			let handle = status::start(bind, scheduler.status())?;
			info!("status endpoint on http://{bind}/v1/status");
			Some(handle)
		}
		None => None,
	};

	let (stop, shutdown) = watch::channel(false);
	actix_web::rt::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("stop requested, finishing the current step");
			let _ = stop.send(true);
		}
	});

	scheduler.run(shutdown).await;

	if let Some(handle) = server {
		handle.stop(true).await;
	}
	Ok(())
}
