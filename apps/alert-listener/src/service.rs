use crate::{Config, Error, Result};
use alert_stream::{AlertClient, ConnectionState};
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

pub mod handlers;
pub mod status;

/// Connects to the alerts stream, subscribes to the configured channels and
/// logs everything that arrives until interrupted.
pub struct AlertListener {
	config: Config,
	client: AlertClient,
	cancel_token: CancellationToken,
}

impl AlertListener {
	pub fn new(config: Config) -> Result<Self> {
		let client = AlertClient::new(config.stream_config()?)?;

		Ok(Self {
			config,
			client,
			cancel_token: CancellationToken::new(),
		})
	}

	pub const fn client(&self) -> &AlertClient {
		&self.client
	}

	/// Run until ctrl-c, or until the stream gives up reconnecting
	pub async fn run(self) -> Result<()> {
		let service = Arc::new(self);

		let shutdown_token = service.cancel_token.clone();
		tokio::spawn(async move {
			match tokio::signal::ctrl_c().await {
				Ok(()) => {
					tracing::info!("🛑 Shutdown signal received");
					shutdown_token.cancel();
				}
				Err(e) => {
					tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
				}
			}
		});

		let _alerts = service.client.scoped_handler(handlers::alert_logger(service.config.print_alerts));

		for subscription in &service.config.subscriptions {
			service.client.subscribe(subscription.channel_type.clone(), subscription.channel_id.clone()).await?;
		}
		tracing::info!("📋 {} channel subscriptions registered", service.config.subscriptions.len());

		service.client.connect(service.config.token.clone()).await?;

		let state_watcher = Arc::clone(&service).spawn_state_watcher();
		let status_reporter = Arc::clone(&service).spawn_status_reporter();

		service.cancel_token.cancelled().await;
		tracing::info!("🔄 Initiating graceful shutdown...");

		let outcome = match service.client.state() {
			ConnectionState::Failed { reason } => Err(Error::Failed(reason)),
			_ => Ok(()),
		};

		if let Err(e) = service.client.shutdown().await {
			tracing::warn!("⚠️ Error shutting down alert stream client: {}", e);
		}
		let (watcher_exit, reporter_exit) = tokio::join!(state_watcher, status_reporter);
		report_task_exit("state watcher", watcher_exit);
		report_task_exit("status reporter", reporter_exit);

		tracing::info!("✅ Graceful shutdown complete");
		outcome
	}
}

/// Log a background task that panicked or was cancelled; returns whether it exited cleanly
fn report_task_exit(task: &str, exit: std::result::Result<(), JoinError>) -> bool {
	match exit {
		Ok(()) => true,
		Err(e) if e.is_panic() => {
			tracing::error!("❌ {} task panicked: {}", task, e);
			false
		}
		Err(e) => {
			tracing::warn!("⚠️ {} task did not finish: {}", task, e);
			false
		}
	}
}
