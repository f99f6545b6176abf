//! Reconnecting client for the real-time alerts stream.
//!
//! An [`AlertClient`] owns one logical stream session. It opens the WebSocket
//! at `{base_url}/ws/alerts?token=...`, remembers channel subscriptions and
//! replays them after every reconnect, and fans inbound messages out to the
//! registered [`MessageHandler`]s. Lost connections are retried with
//! exponential backoff until `max_reconnect_attempts` consecutive failures,
//! after which the client parks in [`ConnectionState::Failed`].
//!
//! ```no_run
//! use alert_stream::{handler, AlertClient, StreamConfig};
//!
//! # async fn run() -> Result<(), alert_stream::ClientError> {
//! let client = AlertClient::new(StreamConfig::from_env()?)?;
//! client.add_message_handler(handler(|message| {
//! 	println!("{message}");
//! 	Ok(())
//! }));
//! client.subscribe("sport", "NFL").await?;
//! client.connect("secret-token").await?;
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

mod config;
mod core;
mod messages;
mod transport;

pub use crate::config::{parse_base_url, ConfigError, StreamConfig, ALERTS_PATH};
pub use crate::core::{
	handler, BackoffPolicy, ConnectionInfo, ConnectionState, DispatchReport, HandlerGuard, MessageDispatcher, MessageHandler, RetryConfig, Subscription,
	SubscriptionChange, SubscriptionRegistry,
};
pub use crate::messages::{ClientMessage, DecodeError, Message, ServerEvent};
#[cfg(feature = "websocket")]
pub use crate::transport::WsConnector;
pub use crate::transport::{Connector, Frame, FrameSink, FrameStream, Link, StreamMetrics, TransportError};

use crate::core::{ClientCommand, ConnectionManager};

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("auth token must not be empty")]
	EmptyToken,

	#[error("connection actor is no longer running")]
	ActorUnavailable,

	#[error("failed to serialize outbound message: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("failed to register metrics: {0}")]
	Metrics(#[from] prometheus::Error),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
}

/// Handle to a stream session.
///
/// Cheap to clone; every clone drives the same connection. The connection
/// actor is spawned on the current Tokio runtime and stops on [`shutdown`]
/// or once the last handle is dropped.
///
/// [`shutdown`]: AlertClient::shutdown
#[derive(Clone)]
pub struct AlertClient {
	commands: mpsc::Sender<ClientCommand>,
	state: watch::Receiver<ConnectionState>,
	dispatcher: Arc<MessageDispatcher>,
	metrics: Arc<StreamMetrics>,
}

impl AlertClient {
	/// Create a client that connects over WebSocket.
	///
	/// Must be called from within a Tokio runtime.
	#[cfg(feature = "websocket")]
	pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
		Self::with_connector(config, WsConnector)
	}

	/// Create a client over a custom transport
	pub fn with_connector<C: Connector>(config: StreamConfig, connector: C) -> Result<Self, ClientError> {
		let metrics = Arc::new(StreamMetrics::new()?);
		let dispatcher = Arc::new(MessageDispatcher::new(Arc::clone(&metrics)));
		let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
		let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

		let manager = ConnectionManager::new(config, Arc::new(connector), Arc::clone(&dispatcher), Arc::clone(&metrics), command_rx, state_tx);
		tokio::spawn(manager.run());

		Ok(Self {
			commands: command_tx,
			state: state_rx,
			dispatcher,
			metrics,
		})
	}

	/// Open the stream with `token`.
	///
	/// Returns once the request is queued; watch [`state`](Self::state) for the
	/// outcome. Ignored while already connecting or connected. During a backoff
	/// wait the pending retry is replaced by an immediate attempt.
	pub async fn connect(&self, token: impl Into<String>) -> Result<(), ClientError> {
		let token = token.into();
		if token.trim().is_empty() {
			return Err(ClientError::EmptyToken);
		}
		self.command(ClientCommand::Connect { token }).await
	}

	/// Close the stream and cancel any pending reconnect. Subscriptions and
	/// handlers are kept for the next `connect`.
	pub async fn disconnect(&self) -> Result<(), ClientError> {
		let (done, rx) = oneshot::channel();
		self.command(ClientCommand::Disconnect { done }).await?;
		rx.await.map_err(|_| ClientError::ActorUnavailable)
	}

	/// Record a channel subscription; sent immediately when connected and
	/// replayed on every later connection. Duplicates are ignored.
	pub async fn subscribe(&self, channel_type: impl Into<String>, channel_id: impl Into<String>) -> Result<(), ClientError> {
		let subscription = Subscription::new(channel_type, channel_id);
		self.command(ClientCommand::Subscribe { subscription }).await
	}

	/// Send an arbitrary JSON message. Silently dropped when not connected.
	pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ClientError> {
		let payload = serde_json::to_value(payload)?;
		self.command(ClientCommand::Send { payload }).await
	}

	/// Returns `false` if this exact handler is already registered
	pub fn add_message_handler(&self, handler: Arc<dyn MessageHandler>) -> bool {
		self.dispatcher.add_handler(handler)
	}

	pub fn remove_message_handler(&self, handler: &Arc<dyn MessageHandler>) -> bool {
		self.dispatcher.remove_handler(handler)
	}

	/// Register a handler for as long as the returned guard lives
	pub fn scoped_handler(&self, handler: Arc<dyn MessageHandler>) -> HandlerGuard {
		HandlerGuard::new(Arc::clone(&self.dispatcher), handler)
	}

	#[must_use]
	pub fn state(&self) -> ConnectionState {
		self.state.borrow().clone()
	}

	/// Receiver notified on every state transition
	#[must_use]
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.state.clone()
	}

	/// Wait until the connection state satisfies `predicate`
	pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<ConnectionState, ClientError>
	where
		F: FnMut(&ConnectionState) -> bool,
	{
		let mut state = self.state.clone();
		let matched = state.wait_for(|s| predicate(s)).await.map_err(|_| ClientError::ActorUnavailable)?;
		Ok(matched.clone())
	}

	pub async fn connection_info(&self) -> Result<ConnectionInfo, ClientError> {
		let (reply, rx) = oneshot::channel();
		self.command(ClientCommand::GetInfo { reply }).await?;
		rx.await.map_err(|_| ClientError::ActorUnavailable)
	}

	/// Subscriptions that will be replayed on the next connection
	pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ClientError> {
		let (reply, rx) = oneshot::channel();
		self.command(ClientCommand::GetSubscriptions { reply }).await?;
		rx.await.map_err(|_| ClientError::ActorUnavailable)
	}

	#[must_use]
	pub fn metrics(&self) -> &StreamMetrics {
		&self.metrics
	}

	/// Disconnect and stop the connection actor. Every clone becomes unusable.
	pub async fn shutdown(&self) -> Result<(), ClientError> {
		let (done, rx) = oneshot::channel();
		self.command(ClientCommand::Shutdown { done }).await?;
		rx.await.map_err(|_| ClientError::ActorUnavailable)
	}

	async fn command(&self, command: ClientCommand) -> Result<(), ClientError> {
		self.commands.send(command).await.map_err(|_| ClientError::ActorUnavailable)
	}
}
