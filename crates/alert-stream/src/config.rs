use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Path of the alerts stream, relative to the configured base URL.
pub const ALERTS_PATH: &str = "/ws/alerts";

const DEFAULT_BASE_URL: &str = "ws://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid stream url {url}: {source}")]
	InvalidUrl { url: String, source: url::ParseError },

	#[error("unsupported url scheme {0}, expected ws or wss")]
	UnsupportedScheme(String),

	#[error("invalid value for {key}: {value}")]
	InvalidValue { key: &'static str, value: String },
}

/// Connection settings for the alerts stream client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
	/// Scheme and host of the stream server, e.g. `wss://alerts.example.com`
	pub base_url: Url,
	/// Failures tolerated before the client gives up and enters `Failed`
	pub max_reconnect_attempts: u32,
	/// Base of the exponential reconnect delay
	pub base_reconnect_delay: Duration,
	/// Application-level ping cadence while connected, `None` disables it
	pub heartbeat_interval: Option<Duration>,
	/// Silence after which a connected stream is considered dead
	pub idle_timeout: Duration,
	/// Capacity of the command channel between handles and the connection actor
	pub command_buffer: usize,
}

impl Default for StreamConfig {
	fn default() -> Self {
		Self {
			base_url: Url::parse(DEFAULT_BASE_URL).expect("default stream url is valid"),
			max_reconnect_attempts: 5,
			base_reconnect_delay: Duration::from_millis(1000),
			heartbeat_interval: Some(Duration::from_secs(30)),
			idle_timeout: Duration::from_secs(120),
			command_buffer: 100,
		}
	}
}

impl StreamConfig {
	/// Load configuration from environment variables, falling back to defaults
	pub fn from_env() -> Result<Self, ConfigError> {
		let defaults = Self::default();

		let base_url = match std::env::var("ALERT_STREAM_URL") {
			Ok(raw) => parse_base_url(&raw)?,
			Err(_) => defaults.base_url,
		};

		let heartbeat_interval = match env_parse::<u64>("ALERT_STREAM_HEARTBEAT_SECS")? {
			Some(0) => None,
			Some(secs) => Some(Duration::from_secs(secs)),
			None => defaults.heartbeat_interval,
		};

		Ok(Self {
			base_url,
			max_reconnect_attempts: env_parse("ALERT_STREAM_MAX_RECONNECT_ATTEMPTS")?.unwrap_or(defaults.max_reconnect_attempts),
			base_reconnect_delay: env_parse("ALERT_STREAM_BASE_RECONNECT_DELAY_MS")?
				.map(Duration::from_millis)
				.unwrap_or(defaults.base_reconnect_delay),
			heartbeat_interval,
			idle_timeout: env_parse("ALERT_STREAM_IDLE_TIMEOUT_SECS")?.map(Duration::from_secs).unwrap_or(defaults.idle_timeout),
			command_buffer: defaults.command_buffer,
		})
	}

	#[must_use]
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = base_url;
		self
	}

	#[must_use]
	pub const fn with_reconnect(mut self, max_attempts: u32, base_delay: Duration) -> Self {
		self.max_reconnect_attempts = max_attempts;
		self.base_reconnect_delay = base_delay;
		self
	}

	#[must_use]
	pub const fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
		self.heartbeat_interval = interval;
		self
	}

	/// Full stream URL for a token: `<base>/ws/alerts?token=<token>`
	#[must_use]
	pub fn stream_url(&self, token: &str) -> Url {
		let mut url = self.base_url.clone();
		url.set_path(ALERTS_PATH);
		url.query_pairs_mut().clear().append_pair("token", token);
		url
	}
}

/// Parse and validate a `ws://` or `wss://` base url
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { url: raw.to_string(), source })?;
	match url.scheme() {
		"ws" | "wss" => Ok(url),
		other => Err(ConfigError::UnsupportedScheme(other.to_string())),
	}
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
	match std::env::var(key) {
		Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue { key, value }),
		Err(_) => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_reference_values() {
		let config = StreamConfig::default();
		assert_eq!(config.max_reconnect_attempts, 5);
		assert_eq!(config.base_reconnect_delay, Duration::from_millis(1000));
		assert_eq!(config.base_url.as_str(), "ws://localhost:8000/");
	}

	#[test]
	fn test_stream_url_appends_path_and_token() {
		let config = StreamConfig::default();
		let url = config.stream_url("abc.def");
		assert_eq!(url.as_str(), "ws://localhost:8000/ws/alerts?token=abc.def");
	}

	#[test]
	fn test_stream_url_escapes_token() {
		let config = StreamConfig::default().with_base_url(parse_base_url("wss://alerts.example.com").unwrap());
		let url = config.stream_url("a b&c");
		assert_eq!(url.as_str(), "wss://alerts.example.com/ws/alerts?token=a+b%26c");
	}

	#[test]
	fn test_parse_base_url_rejects_http() {
		assert!(matches!(parse_base_url("http://localhost:8000"), Err(ConfigError::UnsupportedScheme(_))));
		assert!(matches!(parse_base_url("not a url"), Err(ConfigError::InvalidUrl { .. })));
	}
}
