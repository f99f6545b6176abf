use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A topic the application wants streamed, keyed by `(channel_type, channel_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
	pub channel_type: String,
	pub channel_id: String,
}

impl Subscription {
	pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
		Self {
			channel_type: channel_type.into(),
			channel_id: channel_id.into(),
		}
	}
}

impl fmt::Display for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.channel_type, self.channel_id)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionChange {
	pub added: bool,
	pub total: usize,
}

/// Subscriptions requested by the application, independent of connection state.
///
/// Entries are only ever added. The connection manager enumerates the full set
/// every time the stream (re)enters `Connected`.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
	subscriptions: HashSet<Subscription>,
}

impl SubscriptionRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a subscription; re-adding an existing pair is a no-op
	pub fn subscribe(&mut self, subscription: Subscription) -> SubscriptionChange {
		let added = self.subscriptions.insert(subscription);
		SubscriptionChange {
			added,
			total: self.subscriptions.len(),
		}
	}

	#[must_use]
	pub fn contains(&self, subscription: &Subscription) -> bool {
		self.subscriptions.contains(subscription)
	}

	/// Every registered subscription, in no particular order
	pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
		self.subscriptions.iter()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}
}
