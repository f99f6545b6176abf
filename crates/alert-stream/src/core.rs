mod broadcast;
mod commands;
mod connection;
mod retry;
mod state;
mod subscription;

pub use broadcast::{handler, DispatchReport, HandlerGuard, MessageDispatcher, MessageHandler};
pub(crate) use commands::ClientCommand;
pub(crate) use connection::ConnectionManager;
pub use retry::{BackoffPolicy, RetryConfig};
pub use state::{ConnectionInfo, ConnectionState};
pub use subscription::{Subscription, SubscriptionChange, SubscriptionRegistry};
