use alert_stream::{handler, Message, MessageHandler, ServerEvent};
use std::sync::Arc;

/// Logs every inbound message by kind; alert payloads optionally go to stdout as JSON lines
pub fn alert_logger(print_alerts: bool) -> Arc<dyn MessageHandler> {
	handler(move |message: &Message| {
		match message.event() {
			ServerEvent::Alert { alert } => {
				tracing::info!(alert = %alert, "🚨 Alert received");
				if print_alerts {
					println!("{}", serde_json::to_string(&alert)?);
				}
			}
			ServerEvent::Connection { status, message } => {
				tracing::info!(
					"🔌 Server greeting: {} {}",
					status.as_deref().unwrap_or("connected"),
					message.as_deref().unwrap_or_default()
				);
			}
			ServerEvent::SubscriptionConfirmed { channel_type, channel_id } => {
				tracing::info!(
					"✅ Subscribed to {}:{}",
					channel_type.as_deref().unwrap_or("?"),
					channel_id.as_deref().unwrap_or("?")
				);
			}
			ServerEvent::UnsubscriptionConfirmed { channel_type, channel_id } => {
				tracing::info!(
					"Unsubscribed from {}:{}",
					channel_type.as_deref().unwrap_or("?"),
					channel_id.as_deref().unwrap_or("?")
				);
			}
			ServerEvent::Pong { .. } => tracing::debug!("pong"),
			ServerEvent::Other => tracing::debug!("Unhandled {} message", message),
		}
		Ok(())
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_logger_accepts_every_event_kind() {
		let logger = alert_logger(false);
		for value in [
			json!({"type": "alert", "alert": {"id": 1, "severity": "high"}}),
			json!({"type": "connection", "status": "connected", "message": "Connected to alerts stream"}),
			json!({"type": "subscription_confirmed", "channel_type": "sport", "channel_id": "NFL"}),
			json!({"type": "pong", "timestamp": 1}),
			json!({"type": "something_new"}),
			json!({"no_type": true}),
		] {
			let message = Message::from_value(value).unwrap();
			assert!(logger.on_message(&message).is_ok());
		}
	}
}
