use alert_listener::{AlertListener, Config};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, layer::SubscriberExt, util::SubscriberInitExt, Layer};

const DEFAULT_LOG_FILTER: &str = "alert_stream=info,alert_listener=info";

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();

	init_tracing(&config);

	tracing::info!("🚀 Starting alert listener against {}", config.url);

	let listener = AlertListener::new(config)?;
	listener.run().await?;

	tracing::info!("👋 Alert listener stopped");
	Ok(())
}

fn init_tracing(config: &Config) {
	let filter = config
		.rust_log
		.as_deref()
		.and_then(|directives| EnvFilter::try_new(directives).ok())
		.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().with_filter(filter))
		})
		.init();
}
