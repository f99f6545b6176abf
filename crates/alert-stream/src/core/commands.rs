use super::{ConnectionInfo, Subscription};
use serde_json::Value;
use tokio::sync::oneshot;

/// Requests from client handles to the connection actor
#[derive(Debug)]
pub enum ClientCommand {
	Connect { token: String },

	Disconnect { done: oneshot::Sender<()> },

	Subscribe { subscription: Subscription },

	Send { payload: Value },

	GetSubscriptions { reply: oneshot::Sender<Vec<Subscription>> },

	GetInfo { reply: oneshot::Sender<ConnectionInfo> },

	Shutdown { done: oneshot::Sender<()> },
}
