mod error;
mod metrics;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use metrics::StreamMetrics;
#[cfg(feature = "websocket")]
pub use websocket::WsConnector;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use std::pin::Pin;
use url::Url;

/// A single frame on the stream, independent of the WebSocket library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	Text(String),
	Binary(Vec<u8>),
	Ping(Vec<u8>),
	Pong(Vec<u8>),
	Close(Option<String>),
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open transport: the write half and the read half of one socket
pub struct Link {
	pub sink: FrameSink,
	pub stream: FrameStream,
}

impl Link {
	pub fn new<Si, St>(sink: Si, stream: St) -> Self
	where
		Si: Sink<Frame, Error = TransportError> + Send + 'static,
		St: Stream<Item = Result<Frame, TransportError>> + Send + 'static,
	{
		Self {
			sink: Box::pin(sink),
			stream: Box::pin(stream),
		}
	}
}

/// Opens transports to the stream endpoint.
///
/// The connection manager only ever talks to this trait, which keeps the
/// WebSocket library out of the state machine and lets tests script opens,
/// frames and closes in memory.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
	async fn open(&self, url: &Url) -> Result<Link, TransportError>;
}
