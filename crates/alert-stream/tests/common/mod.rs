#![allow(dead_code)]

// In-memory transport for driving the client without a socket.
//
// `MockConnector` is handed to `AlertClient::with_connector`; the paired
// `MockServer` scripts whether each open succeeds, records when every attempt
// happened, and hands out a `MockSession` per accepted open so a test can push
// inbound frames, read what the client wrote, or drop the connection.

use alert_stream::{AlertClient, Connector, Frame, Link, StreamConfig, TransportError};
use async_trait::async_trait;
use futures_util::{future, sink, stream};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Accept,
	Refuse,
	/// The open never completes
	Hold,
}

struct Script {
	outcomes: VecDeque<Outcome>,
	fallback: Outcome,
	attempts: Vec<(Instant, Url)>,
}

pub struct MockConnector {
	script: Arc<Mutex<Script>>,
	sessions: UnboundedSender<MockSession>,
}

pub struct MockServer {
	script: Arc<Mutex<Script>>,
	sessions: UnboundedReceiver<MockSession>,
}

/// Server side of one accepted connection
pub struct MockSession {
	pub url: Url,
	inbound: UnboundedSender<Result<Frame, TransportError>>,
	outbound: UnboundedReceiver<Frame>,
}

/// Opens not covered by [`MockServer::script`] resolve to `fallback`
pub fn mock_transport(fallback: Outcome) -> (MockConnector, MockServer) {
	let script = Arc::new(Mutex::new(Script {
		outcomes: VecDeque::new(),
		fallback,
		attempts: Vec::new(),
	}));
	let (session_tx, session_rx) = mpsc::unbounded_channel();

	(
		MockConnector {
			script: Arc::clone(&script),
			sessions: session_tx,
		},
		MockServer { script, sessions: session_rx },
	)
}

/// Default config with heartbeats off so tests only see the frames they cause
pub fn test_config() -> StreamConfig {
	StreamConfig::default().with_heartbeat(None)
}

pub fn client(fallback: Outcome) -> (AlertClient, MockServer) {
	let (connector, server) = mock_transport(fallback);
	let client = AlertClient::with_connector(test_config(), connector).unwrap();
	(client, server)
}

/// Differences between consecutive instants
pub fn gaps(instants: &[Instant]) -> Vec<Duration> {
	instants.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[async_trait]
impl Connector for MockConnector {
	async fn open(&self, url: &Url) -> Result<Link, TransportError> {
		let outcome = {
			let mut script = self.script.lock().unwrap();
			script.attempts.push((Instant::now(), url.clone()));
			let fallback = script.fallback;
			script.outcomes.pop_front().unwrap_or(fallback)
		};

		match outcome {
			Outcome::Accept => {}
			Outcome::Refuse => return Err(TransportError::Refused("scripted refusal".into())),
			Outcome::Hold => return future::pending().await,
		}

		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Frame>();

		let sink = sink::unfold(outbound_tx, |tx, frame: Frame| async move {
			tx.send(frame).map_err(|_| TransportError::Ended)?;
			Ok::<_, TransportError>(tx)
		});
		let stream = stream::unfold(inbound_rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });

		let _ = self.sessions.send(MockSession {
			url: url.clone(),
			inbound: inbound_tx,
			outbound: outbound_rx,
		});

		Ok(Link::new(sink, stream))
	}
}

impl MockServer {
	/// Queue outcomes for the next opens, in order
	pub fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
		self.script.lock().unwrap().outcomes.extend(outcomes);
	}

	pub fn set_fallback(&self, fallback: Outcome) {
		self.script.lock().unwrap().fallback = fallback;
	}

	/// When each open was attempted
	pub fn attempts(&self) -> Vec<Instant> {
		self.script.lock().unwrap().attempts.iter().map(|(at, _)| *at).collect()
	}

	pub fn attempt_count(&self) -> usize {
		self.script.lock().unwrap().attempts.len()
	}

	/// Wait for the next accepted connection
	pub async fn accept(&mut self) -> MockSession {
		self.sessions.recv().await.expect("connector dropped")
	}
}

impl MockSession {
	pub fn push(&self, frame: Frame) {
		let _ = self.inbound.send(Ok(frame));
	}

	pub fn push_text(&self, text: &str) {
		self.push(Frame::Text(text.to_string()));
	}

	pub fn push_json(&self, value: &Value) {
		self.push_text(&value.to_string());
	}

	pub fn fail(&self, error: TransportError) {
		let _ = self.inbound.send(Err(error));
	}

	/// Drop the connection from the server side
	pub fn hang_up(self) {}

	/// Everything the client has written so far
	pub fn drain(&mut self) -> Vec<Frame> {
		let mut frames = Vec::new();
		loop {
			match self.outbound.try_recv() {
				Ok(frame) => frames.push(frame),
				Err(TryRecvError::Empty | TryRecvError::Disconnected) => return frames,
			}
		}
	}

	/// Text frames written so far, parsed as JSON
	pub fn drain_json(&mut self) -> Vec<Value> {
		self.drain()
			.into_iter()
			.filter_map(|frame| match frame {
				Frame::Text(text) => serde_json::from_str(&text).ok(),
				_ => None,
			})
			.collect()
	}

	pub async fn next_sent(&mut self) -> Option<Frame> {
		self.outbound.recv().await
	}
}
