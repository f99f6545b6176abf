#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	#[cfg(feature = "websocket")]
	#[error("WebSocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("Connection refused: {0}")]
	Refused(String),

	#[error("Connection closed: {}", reason.as_deref().unwrap_or("no reason given"))]
	Closed { reason: Option<String> },

	#[error("Stream ended")]
	Ended,

	#[error("No inbound activity for {0:?}")]
	Idle(std::time::Duration),
}
