use crate::AlertListener;
use alert_stream::ConnectionState;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

impl AlertListener {
	/// Log state transitions; a terminal failure stops the listener
	pub fn spawn_state_watcher(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut state = self.client.watch_state();

			loop {
				tokio::select! {
					() = self.cancel_token.cancelled() => break,
					changed = state.changed() => {
						if changed.is_err() {
							break;
						}
						let current = state.borrow_and_update().clone();
						match current {
							ConnectionState::Connected { .. } => tracing::info!("💚 Alert stream connected"),
							ConnectionState::Reconnecting { attempt, delay } => {
								tracing::warn!("💔 Alert stream lost, retry {} in {:?}", attempt, delay);
							}
							ConnectionState::Failed { reason } => {
								tracing::error!("❌ Alert stream failed permanently: {}", reason);
								self.cancel_token.cancel();
								break;
							}
							other => tracing::debug!("Alert stream {}", other),
						}
					}
				}
			}
		})
	}

	/// Periodically log a one-line connection summary
	pub fn spawn_status_reporter(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = interval(self.config.status_interval());
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				tokio::select! {
					() = self.cancel_token.cancelled() => break,
					_ = ticker.tick() => match self.client.connection_info().await {
						Ok(info) => tracing::info!(
							state = %info.state,
							subscriptions = info.subscriptions,
							handlers = info.handlers,
							uptime = ?info.uptime(),
							"📊 Alert stream status"
						),
						Err(e) => {
							tracing::warn!("⚠️ Status check failed: {}", e);
							break;
						}
					},
				}
			}
		})
	}
}
