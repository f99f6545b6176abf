use crate::core::Subscription;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("frame is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("frame is not valid UTF-8")]
	Utf8(#[from] std::str::Utf8Error),

	#[error("expected a JSON object, got {0}")]
	NotAnObject(&'static str),
}

/// A decoded inbound envelope.
///
/// The stream only guarantees a JSON object; interpretation of the `type` tag
/// and the remaining fields is left to handlers, with [`Message::event`] as a
/// typed view over the tags the alerts server is known to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
	pub fn from_text(text: &str) -> Result<Self, DecodeError> {
		Self::from_value(serde_json::from_str(text)?)
	}

	pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
		let text = std::str::from_utf8(bytes)?;
		Self::from_text(text)
	}

	pub fn from_value(value: Value) -> Result<Self, DecodeError> {
		match value {
			Value::Object(map) => Ok(Self(map)),
			Value::Null => Err(DecodeError::NotAnObject("null")),
			Value::Bool(_) => Err(DecodeError::NotAnObject("bool")),
			Value::Number(_) => Err(DecodeError::NotAnObject("number")),
			Value::String(_) => Err(DecodeError::NotAnObject("string")),
			Value::Array(_) => Err(DecodeError::NotAnObject("array")),
		}
	}

	/// The `type` tag, when present and a string
	#[must_use]
	pub fn message_type(&self) -> Option<&str> {
		self.0.get("type").and_then(Value::as_str)
	}

	#[must_use]
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	#[must_use]
	pub const fn fields(&self) -> &Map<String, Value> {
		&self.0
	}

	#[must_use]
	pub fn into_value(self) -> Value {
		Value::Object(self.0)
	}

	/// Interpret the message as one of the server's known events
	#[must_use]
	pub fn event(&self) -> ServerEvent {
		serde_json::from_value(Value::Object(self.0.clone())).unwrap_or(ServerEvent::Other)
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message_type().unwrap_or("<untyped>"))
	}
}

/// Events the alerts server sends on the stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
	/// Welcome frame sent after the server accepts the socket
	Connection {
		#[serde(default)]
		status: Option<String>,
		#[serde(default)]
		message: Option<String>,
	},
	SubscriptionConfirmed {
		channel_type: Option<String>,
		channel_id: Option<String>,
	},
	UnsubscriptionConfirmed {
		channel_type: Option<String>,
		channel_id: Option<String>,
	},
	/// Reply to a client `ping`, echoing its timestamp
	Pong {
		#[serde(default)]
		timestamp: Option<Value>,
	},
	Alert {
		alert: Value,
	},
	#[serde(other)]
	Other,
}

/// Frames the client itself originates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
	Subscribe { channel_type: String, channel_id: String },
	Ping { timestamp: i64 },
}

impl ClientMessage {
	#[must_use]
	pub fn subscribe(subscription: &Subscription) -> Self {
		Self::Subscribe {
			channel_type: subscription.channel_type.clone(),
			channel_id: subscription.channel_id.clone(),
		}
	}

	#[must_use]
	pub fn ping() -> Self {
		Self::Ping {
			timestamp: chrono::Utc::now().timestamp_millis(),
		}
	}

	pub fn to_text(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}
