use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Counters for one client session, registered in a registry owned by that
/// session so several clients can live in one process.
#[derive(Debug)]
pub struct StreamMetrics {
	registry: Registry,

	// Connection lifecycle
	pub connection_attempts: IntCounter,
	pub connections_established: IntCounter,
	pub reconnects_scheduled: IntCounter,
	pub connection_failures: IntCounter,

	// Inbound
	pub frames_received: IntCounter,
	pub decode_failures: IntCounter,
	pub messages_dispatched: IntCounter,
	pub handler_failures: IntCounter,

	// Outbound
	pub messages_sent: IntCounter,
	pub messages_dropped: IntCounter,
	pub pings_sent: IntCounter,

	pub subscriptions: IntGauge,
}

impl StreamMetrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let metrics = Self {
			connection_attempts: counter(&registry, "alert_stream_connection_attempts_total", "Transport opens attempted")?,
			connections_established: counter(&registry, "alert_stream_connections_established_total", "Transport opens that succeeded")?,
			reconnects_scheduled: counter(&registry, "alert_stream_reconnects_scheduled_total", "Backoff timers armed after a failure")?,
			connection_failures: counter(&registry, "alert_stream_connection_failures_total", "Open failures and unexpected closes")?,
			frames_received: counter(&registry, "alert_stream_frames_received_total", "Data frames received")?,
			decode_failures: counter(&registry, "alert_stream_decode_failures_total", "Inbound frames dropped because they failed to decode")?,
			messages_dispatched: counter(&registry, "alert_stream_messages_dispatched_total", "Decoded messages handed to the dispatcher")?,
			handler_failures: counter(&registry, "alert_stream_handler_failures_total", "Handler invocations that errored or panicked")?,
			messages_sent: counter(&registry, "alert_stream_messages_sent_total", "Outbound frames written to the transport")?,
			messages_dropped: counter(&registry, "alert_stream_messages_dropped_total", "Outbound messages dropped while not connected")?,
			pings_sent: counter(&registry, "alert_stream_pings_sent_total", "Heartbeat pings sent")?,
			subscriptions: gauge(&registry, "alert_stream_subscriptions", "Registered topic subscriptions")?,
			registry,
		};

		Ok(metrics)
	}

	/// Registry holding this session's metrics, for exposition
	#[must_use]
	pub const fn registry(&self) -> &Registry {
		&self.registry
	}
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
	let counter = IntCounter::with_opts(Opts::new(name, help))?;
	registry.register(Box::new(counter.clone()))?;
	Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
	let gauge = IntGauge::with_opts(Opts::new(name, help))?;
	registry.register(Box::new(gauge.clone()))?;
	Ok(gauge)
}
