use super::{BackoffPolicy, ClientCommand, ConnectionInfo, ConnectionState, MessageDispatcher, RetryConfig, SubscriptionRegistry};
use crate::config::StreamConfig;
use crate::messages::{ClientMessage, DecodeError, Message};
use crate::transport::{Connector, Frame, Link, StreamMetrics, TransportError};
use futures_util::{future, SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, trace, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type PendingOpen = Pin<Box<dyn Future<Output = Result<Link, TransportError>> + Send>>;

/// What the actor currently holds. Each resource lives only in the phase that
/// owns it: the open future while opening, the link while open, the retry
/// timer while waiting. Replacing the phase releases (and so cancels) it.
enum Phase {
	Idle,
	Opening {
		token: String,
		open: PendingOpen,
	},
	Open {
		token: String,
		link: Link,
		heartbeat: Option<Interval>,
		/// Reset by every inbound frame; `None` when the idle timeout is disabled
		idle: Option<Pin<Box<Sleep>>>,
	},
	Waiting {
		token: String,
		retry: Pin<Box<Sleep>>,
	},
	GaveUp,
}

enum LinkEvent {
	Opened(Result<Link, TransportError>),
	Inbound(Option<Result<Frame, TransportError>>),
	HeartbeatDue,
	IdleTimeout,
	RetryDue,
}

/// Resolves with the next transport or timer event for the current phase.
/// Cancel safe: everything it waits on is owned by the phase, not the future.
async fn next_link_event(phase: &mut Phase) -> LinkEvent {
	match phase {
		Phase::Opening { open, .. } => LinkEvent::Opened(open.await),
		Phase::Open { link, heartbeat, idle, .. } => {
			tokio::select! {
				frame = link.stream.next() => LinkEvent::Inbound(frame),
				() = tick(heartbeat) => LinkEvent::HeartbeatDue,
				() = expire(idle) => LinkEvent::IdleTimeout,
			}
		}
		Phase::Waiting { retry, .. } => {
			retry.as_mut().await;
			LinkEvent::RetryDue
		}
		Phase::Idle | Phase::GaveUp => future::pending().await,
	}
}

async fn tick(heartbeat: &mut Option<Interval>) {
	match heartbeat {
		Some(heartbeat) => {
			heartbeat.tick().await;
		}
		None => future::pending().await,
	}
}

async fn expire(idle: &mut Option<Pin<Box<Sleep>>>) {
	match idle {
		Some(deadline) => deadline.as_mut().await,
		None => future::pending().await,
	}
}

/// Actor owning the single stream connection of one client session.
///
/// All lifecycle state is mutated from `run`, one event at a time, so no
/// locking is involved: commands from handles, open completion, inbound
/// frames, heartbeat ticks and the backoff timer are multiplexed in one loop.
pub struct ConnectionManager {
	config: StreamConfig,
	backoff: BackoffPolicy,
	connector: Arc<dyn Connector>,
	registry: SubscriptionRegistry,
	dispatcher: Arc<MessageDispatcher>,
	metrics: Arc<StreamMetrics>,
	commands: mpsc::Receiver<ClientCommand>,
	state_tx: watch::Sender<ConnectionState>,
	phase: Phase,
	attempt_count: u32,
}

impl ConnectionManager {
	pub fn new(
		config: StreamConfig,
		connector: Arc<dyn Connector>,
		dispatcher: Arc<MessageDispatcher>,
		metrics: Arc<StreamMetrics>,
		commands: mpsc::Receiver<ClientCommand>,
		state_tx: watch::Sender<ConnectionState>,
	) -> Self {
		Self {
			backoff: BackoffPolicy::new(RetryConfig::from(&config)),
			config,
			connector,
			registry: SubscriptionRegistry::new(),
			dispatcher,
			metrics,
			commands,
			state_tx,
			phase: Phase::Idle,
			attempt_count: 0,
		}
	}

	/// Run the actor until shutdown or until every client handle is dropped
	pub async fn run(mut self) {
		loop {
			tokio::select! {
				command = self.commands.recv() => match command {
					Some(ClientCommand::Shutdown { done }) => {
						self.disconnect().await;
						let _ = done.send(());
						break;
					}
					Some(command) => self.handle_command(command).await,
					None => {
						self.disconnect().await;
						break;
					}
				},
				event = next_link_event(&mut self.phase) => self.handle_link_event(event).await,
			}
		}
		debug!("connection actor stopped");
	}

	async fn handle_command(&mut self, command: ClientCommand) {
		match command {
			ClientCommand::Connect { token } => self.connect(token),
			ClientCommand::Disconnect { done } => {
				self.disconnect().await;
				let _ = done.send(());
			}
			ClientCommand::Subscribe { subscription } => {
				let change = self.registry.subscribe(subscription.clone());
				self.metrics.subscriptions.set(i64::try_from(change.total).unwrap_or(i64::MAX));
				if !change.added {
					debug!("Already subscribed to {}", subscription);
				} else if matches!(self.phase, Phase::Open { .. }) {
					self.send_message(&ClientMessage::subscribe(&subscription)).await;
				} else {
					debug!("Subscription {} recorded, will be sent once connected", subscription);
				}
			}
			ClientCommand::Send { payload } => match serde_json::to_string(&payload) {
				Ok(text) => self.send_text(text).await,
				Err(e) => warn!("Dropping outbound payload that failed to serialize: {}", e),
			},
			ClientCommand::GetSubscriptions { reply } => {
				let _ = reply.send(self.registry.iter().cloned().collect());
			}
			ClientCommand::GetInfo { reply } => {
				let _ = reply.send(ConnectionInfo {
					state: self.state_tx.borrow().clone(),
					attempt_count: self.attempt_count,
					subscriptions: self.registry.len(),
					handlers: self.dispatcher.handler_count(),
				});
			}
			// Intercepted in `run`
			ClientCommand::Shutdown { done } => {
				let _ = done.send(());
			}
		}
	}

	async fn handle_link_event(&mut self, event: LinkEvent) {
		match event {
			LinkEvent::Opened(Ok(link)) => self.on_open(link).await,
			LinkEvent::Opened(Err(e)) => self.on_link_lost(&e),
			LinkEvent::Inbound(Some(Ok(frame))) => self.on_frame(frame).await,
			LinkEvent::Inbound(Some(Err(e))) => self.on_link_lost(&e),
			LinkEvent::Inbound(None) => self.on_link_lost(&TransportError::Ended),
			LinkEvent::HeartbeatDue => self.on_heartbeat().await,
			LinkEvent::IdleTimeout => {
				warn!("No activity on alert stream for {:?}, treating connection as dead", self.config.idle_timeout);
				self.on_link_lost(&TransportError::Idle(self.config.idle_timeout));
			}
			LinkEvent::RetryDue => {
				if let Some(token) = self.take_token() {
					self.open(token);
				}
			}
		}
	}

	fn connect(&mut self, token: String) {
		match self.phase {
			Phase::Opening { .. } | Phase::Open { .. } => {
				warn!("connect() called while already {}, ignoring", self.state_tx.borrow().name());
			}
			Phase::Waiting { .. } => {
				info!("connect() called during backoff, reconnecting immediately");
				self.open(token);
			}
			Phase::Idle | Phase::GaveUp => {
				self.attempt_count = 0;
				self.open(token);
			}
		}
	}

	/// Start opening a transport; replaces (and so cancels) whatever the phase held
	fn open(&mut self, token: String) {
		let url = self.config.stream_url(&token);
		let connector = Arc::clone(&self.connector);
		let open: PendingOpen = Box::pin(async move { connector.open(&url).await });

		self.metrics.connection_attempts.inc();
		info!("Connecting to alert stream at {} (attempt {})", self.config.base_url, self.attempt_count);

		self.phase = Phase::Opening { token, open };
		self.publish(ConnectionState::Connecting { attempt: self.attempt_count });
	}

	async fn on_open(&mut self, link: Link) {
		let Some(token) = self.take_token() else { return };

		self.attempt_count = 0;
		self.metrics.connections_established.inc();

		// A zero period or timeout disables the timer; `interval_at` rejects a zero period
		let heartbeat = self.config.heartbeat_interval.filter(|period| !period.is_zero()).map(|period| {
			let mut heartbeat = interval_at(Instant::now() + period, period);
			heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
			heartbeat
		});
		let idle = (!self.config.idle_timeout.is_zero()).then(|| Box::pin(sleep(self.config.idle_timeout)));
		self.phase = Phase::Open { token, link, heartbeat, idle };

		// Registry replay completes before Connected is published
		let replay: Vec<ClientMessage> = self.registry.iter().map(ClientMessage::subscribe).collect();
		for message in &replay {
			self.send_message(message).await;
			if !matches!(self.phase, Phase::Open { .. }) {
				return;
			}
		}

		info!("Connected to alert stream, replayed {} subscriptions", replay.len());
		self.publish(ConnectionState::Connected { connected_at: Instant::now() });
	}

	async fn on_frame(&mut self, frame: Frame) {
		if let Phase::Open { idle: Some(deadline), .. } = &mut self.phase {
			deadline.as_mut().reset(Instant::now() + self.config.idle_timeout);
		}

		match frame {
			Frame::Text(text) => self.on_data(Message::from_text(&text)),
			Frame::Binary(data) => self.on_data(Message::from_slice(&data)),
			Frame::Ping(payload) => {
				let sent = self.write(Frame::Pong(payload)).await;
				if let Err(e) = sent {
					self.on_link_lost(&e);
				}
			}
			Frame::Pong(_) => trace!("pong received"),
			Frame::Close(reason) => {
				info!("Alert stream closed by server: {}", reason.as_deref().unwrap_or("no reason"));
				self.on_link_lost(&TransportError::Closed { reason });
			}
		}
	}

	fn on_data(&self, decoded: Result<Message, DecodeError>) {
		self.metrics.frames_received.inc();
		match decoded {
			Ok(message) => {
				debug!("Received {} message", message);
				self.dispatcher.dispatch(&message);
			}
			Err(e) => {
				self.metrics.decode_failures.inc();
				warn!("Dropping malformed frame: {}", e);
			}
		}
	}

	async fn on_heartbeat(&mut self) {
		if !matches!(self.phase, Phase::Open { .. }) {
			return;
		}

		self.metrics.pings_sent.inc();
		self.send_message(&ClientMessage::ping()).await;
	}

	/// Close the transport or cancel the pending attempt, ending in `Disconnected`
	async fn disconnect(&mut self) {
		match std::mem::replace(&mut self.phase, Phase::Idle) {
			Phase::Open { mut link, .. } => {
				if tokio::time::timeout(CLOSE_TIMEOUT, link.sink.close()).await.is_err() {
					debug!("Timed out closing alert stream transport");
				}
				info!("Disconnected from alert stream");
			}
			Phase::Opening { .. } => info!("Disconnected, connection attempt abandoned"),
			Phase::Waiting { .. } => info!("Disconnected, pending reconnect cancelled"),
			Phase::Idle | Phase::GaveUp => debug!("disconnect() while not connected"),
		}
		self.publish(ConnectionState::Disconnected);
	}

	/// Transport failed or closed: schedule a retry or give up
	fn on_link_lost(&mut self, error: &TransportError) {
		let Some(token) = self.take_token() else { return };
		self.metrics.connection_failures.inc();

		match self.backoff.next_delay(&mut self.attempt_count) {
			Some(delay) => {
				warn!(
					"Alert stream connection lost: {}. Reconnecting in {:?} (attempt {}/{})",
					error,
					delay,
					self.attempt_count,
					self.backoff.max_attempts()
				);
				self.metrics.reconnects_scheduled.inc();
				self.phase = Phase::Waiting {
					token,
					retry: Box::pin(sleep(delay)),
				};
				self.publish(ConnectionState::Reconnecting {
					attempt: self.attempt_count,
					delay,
				});
			}
			None => {
				error!("Alert stream connection failed after {} reconnect attempts: {}", self.attempt_count, error);
				self.phase = Phase::GaveUp;
				self.publish(ConnectionState::Failed { reason: error.to_string() });
			}
		}
	}

	async fn send_message(&mut self, message: &ClientMessage) {
		match message.to_text() {
			Ok(text) => self.send_text(text).await,
			Err(e) => warn!("Failed to encode {:?}: {}", message, e),
		}
	}

	/// Best-effort send: dropped unless connected, failures go through reconnect
	async fn send_text(&mut self, text: String) {
		if !matches!(self.phase, Phase::Open { .. }) {
			self.metrics.messages_dropped.inc();
			debug!("Not connected, dropping outbound message");
			return;
		}

		let sent = self.write(Frame::Text(text)).await;
		match sent {
			Ok(()) => self.metrics.messages_sent.inc(),
			Err(e) => self.on_link_lost(&e),
		}
	}

	async fn write(&mut self, frame: Frame) -> Result<(), TransportError> {
		match &mut self.phase {
			Phase::Open { link, .. } => link.sink.send(frame).await,
			_ => Ok(()),
		}
	}

	/// Move out of the current phase, returning its token if it had one
	fn take_token(&mut self) -> Option<String> {
		match std::mem::replace(&mut self.phase, Phase::Idle) {
			Phase::Opening { token, .. } | Phase::Open { token, .. } | Phase::Waiting { token, .. } => Some(token),
			other => {
				self.phase = other;
				None
			}
		}
	}

	fn publish(&self, state: ConnectionState) {
		trace!("connection state -> {}", state);
		self.state_tx.send_replace(state);
	}
}
