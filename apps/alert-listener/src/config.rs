use crate::error::Result;
use alert_stream::{parse_base_url, StreamConfig, Subscription};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct Config {
	/// Use JSON formatting for tracing
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	/// Log filter, e.g. `alert_stream=debug`
	#[arg(long, env = "RUST_LOG")]
	pub rust_log: Option<String>,

	/// Auth token appended to the stream url
	#[arg(long, env = "ALERT_STREAM_TOKEN")]
	pub token: String,

	/// Base url of the alerts server
	#[arg(long, env = "ALERT_STREAM_URL", default_value = "ws://localhost:8000")]
	pub url: String,

	/// Channels to subscribe to, as `channel_type:channel_id`
	#[arg(long = "subscribe", env = "ALERT_SUBSCRIPTIONS", value_delimiter = ',', value_parser = parse_channel)]
	pub subscriptions: Vec<Subscription>,

	#[arg(long, env = "ALERT_STREAM_MAX_RECONNECT_ATTEMPTS", default_value = "5")]
	pub max_reconnect_attempts: u32,

	/// Base of the exponential reconnect delay, in milliseconds
	#[arg(long, env = "ALERT_STREAM_BASE_RECONNECT_DELAY_MS", default_value = "1000")]
	pub base_reconnect_delay_ms: u64,

	/// Application ping interval in seconds, 0 disables
	#[arg(long, env = "ALERT_STREAM_HEARTBEAT_SECS", default_value = "30")]
	pub heartbeat_secs: u64,

	#[arg(long, env = "ALERT_STREAM_IDLE_TIMEOUT_SECS", default_value = "120")]
	pub idle_timeout_secs: u64,

	/// How often to log a connection status line, at least 1 second
	#[arg(long, env = "STATUS_INTERVAL_SECS", default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
	pub status_interval_secs: u64,

	/// Print each alert payload to stdout as a JSON line
	#[arg(long, env = "PRINT_ALERTS", default_value = "false")]
	pub print_alerts: bool,
}

impl Config {
	pub fn stream_config(&self) -> Result<StreamConfig> {
		let heartbeat = (self.heartbeat_secs > 0).then_some(Duration::from_secs(self.heartbeat_secs));

		let mut config = StreamConfig::default()
			.with_base_url(parse_base_url(&self.url)?)
			.with_reconnect(self.max_reconnect_attempts, Duration::from_millis(self.base_reconnect_delay_ms))
			.with_heartbeat(heartbeat);
		config.idle_timeout = Duration::from_secs(self.idle_timeout_secs);

		Ok(config)
	}

	pub fn status_interval(&self) -> Duration {
		Duration::from_secs(self.status_interval_secs.max(1))
	}
}

/// Parse `channel_type:channel_id`
pub fn parse_channel(raw: &str) -> std::result::Result<Subscription, String> {
	match raw.trim().split_once(':') {
		Some((channel_type, channel_id)) if !channel_type.is_empty() && !channel_id.is_empty() => Ok(Subscription::new(channel_type, channel_id)),
		_ => Err(format!("invalid channel {raw:?}, expected channel_type:channel_id")),
	}
}
