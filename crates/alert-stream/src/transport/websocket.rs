use super::{Connector, Frame, Link, TransportError};
use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TungsteniteMessage};
use tracing::debug;
use url::Url;

/// `tokio-tungstenite` backed connector; supports `ws://` and `wss://` (native TLS)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
	async fn open(&self, url: &Url) -> Result<Link, TransportError> {
		let (ws_stream, response) = connect_async(url.as_str()).await?;
		debug!("WebSocket handshake completed with status {}", response.status());

		let (sink, stream) = ws_stream.split();
		let sink = sink.with(|frame: Frame| future::ready(Ok::<_, TransportError>(TungsteniteMessage::from(frame))));
		let stream = stream.map(|message| message.map(Frame::from).map_err(TransportError::from));

		Ok(Link::new(sink, stream))
	}
}

impl From<Frame> for TungsteniteMessage {
	fn from(frame: Frame) -> Self {
		match frame {
			Frame::Text(text) => Self::Text(text.into()),
			Frame::Binary(data) => Self::Binary(data.into()),
			Frame::Ping(payload) => Self::Ping(payload.into()),
			Frame::Pong(payload) => Self::Pong(payload.into()),
			Frame::Close(_) => Self::Close(None),
		}
	}
}

impl From<TungsteniteMessage> for Frame {
	fn from(message: TungsteniteMessage) -> Self {
		match message {
			TungsteniteMessage::Text(text) => Self::Text(text.as_str().to_owned()),
			TungsteniteMessage::Ping(payload) => Self::Ping(payload.to_vec()),
			TungsteniteMessage::Pong(payload) => Self::Pong(payload.to_vec()),
			TungsteniteMessage::Close(close) => Self::Close(close.map(|c| c.reason.as_str().to_owned())),
			other => Self::Binary(other.into_data().to_vec()),
		}
	}
}
