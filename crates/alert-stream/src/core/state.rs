use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Observable lifecycle of the stream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
	Disconnected,
	Connecting { attempt: u32 },
	Connected { connected_at: Instant },
	Reconnecting { attempt: u32, delay: Duration },
	/// Retries exhausted; only an explicit `connect` leaves this state
	Failed { reason: String },
}

impl ConnectionState {
	#[must_use]
	pub const fn is_connected(&self) -> bool {
		matches!(self, Self::Connected { .. })
	}

	/// Whether a transport is open or being opened
	#[must_use]
	pub const fn is_active(&self) -> bool {
		matches!(self, Self::Connecting { .. } | Self::Connected { .. })
	}

	#[must_use]
	pub const fn is_failed(&self) -> bool {
		matches!(self, Self::Failed { .. })
	}

	#[must_use]
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Disconnected => "disconnected",
			Self::Connecting { .. } => "connecting",
			Self::Connected { .. } => "connected",
			Self::Reconnecting { .. } => "reconnecting",
			Self::Failed { .. } => "failed",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Reconnecting { attempt, delay } => write!(f, "reconnecting (attempt {attempt}, in {delay:?})"),
			Self::Failed { reason } => write!(f, "failed ({reason})"),
			other => f.write_str(other.name()),
		}
	}
}

/// Snapshot of the connection for monitoring
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
	pub state: ConnectionState,
	pub attempt_count: u32,
	pub subscriptions: usize,
	pub handlers: usize,
}

impl ConnectionInfo {
	#[must_use]
	pub const fn is_connected(&self) -> bool {
		self.state.is_connected()
	}

	#[must_use]
	pub fn uptime(&self) -> Option<Duration> {
		match &self.state {
			ConnectionState::Connected { connected_at } => Some(connected_at.elapsed()),
			_ => None,
		}
	}
}
