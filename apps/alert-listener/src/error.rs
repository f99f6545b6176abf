use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("Alert stream error: {0}")]
	Client(#[from] alert_stream::ClientError),

	#[error("Configuration error: {0}")]
	Config(#[from] alert_stream::ConfigError),

	#[error("Stream gave up reconnecting: {0}")]
	Failed(String),
}
