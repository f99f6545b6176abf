use crate::messages::Message;
use crate::transport::StreamMetrics;
use dashmap::{mapref::entry::Entry, DashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// Consumer of inbound stream messages.
///
/// Implemented for any `Fn(&Message) -> anyhow::Result<()>` closure, so most
/// callers just wrap a closure with [`handler`].
pub trait MessageHandler: Send + Sync {
	fn on_message(&self, message: &Message) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
	F: Fn(&Message) -> anyhow::Result<()> + Send + Sync,
{
	fn on_message(&self, message: &Message) -> anyhow::Result<()> {
		self(message)
	}
}

/// Box a closure as a shareable handler
pub fn handler<F>(f: F) -> Arc<dyn MessageHandler>
where
	F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Registration key: the address of the handler allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HandlerKey(usize);

impl HandlerKey {
	fn of(handler: &Arc<dyn MessageHandler>) -> Self {
		Self(Arc::as_ptr(handler).cast::<()>() as usize)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
	pub delivered: usize,
	pub failed: usize,
}

/// Fan-out of inbound messages to every registered handler.
///
/// Handlers are keyed by `Arc` identity. Each dispatch works on a snapshot of
/// the registrations, and a handler that errors or panics is logged and skipped
/// without affecting delivery to the others.
pub struct MessageDispatcher {
	handlers: DashMap<HandlerKey, Arc<dyn MessageHandler>>,
	metrics: Arc<StreamMetrics>,
}

impl MessageDispatcher {
	#[must_use]
	pub fn new(metrics: Arc<StreamMetrics>) -> Self {
		Self {
			handlers: DashMap::new(),
			metrics,
		}
	}

	/// Register a handler. Returns `false` if this exact `Arc` is already registered.
	pub fn add_handler(&self, handler: Arc<dyn MessageHandler>) -> bool {
		match self.handlers.entry(HandlerKey::of(&handler)) {
			Entry::Occupied(_) => false,
			Entry::Vacant(slot) => {
				slot.insert(handler);
				true
			}
		}
	}

	/// Unregister a handler. Only the identical `Arc` removes it.
	pub fn remove_handler(&self, handler: &Arc<dyn MessageHandler>) -> bool {
		self.handlers.remove(&HandlerKey::of(handler)).is_some()
	}

	#[must_use]
	pub fn handler_count(&self) -> usize {
		self.handlers.len()
	}

	/// Deliver `message` to every handler registered when the call starts
	pub fn dispatch(&self, message: &Message) -> DispatchReport {
		// Collect first so no shard lock is held while handlers run; handlers may add or remove registrations.
		let snapshot: Vec<Arc<dyn MessageHandler>> = self.handlers.iter().map(|entry| Arc::clone(entry.value())).collect();

		let mut report = DispatchReport::default();
		for handler in snapshot {
			match catch_unwind(AssertUnwindSafe(|| handler.on_message(message))) {
				Ok(Ok(())) => report.delivered += 1,
				Ok(Err(e)) => {
					report.failed += 1;
					warn!("Message handler failed for {}: {:#}", message, e);
				}
				Err(_) => {
					report.failed += 1;
					warn!("Message handler panicked for {}", message);
				}
			}
		}

		self.metrics.messages_dispatched.inc();
		self.metrics.handler_failures.inc_by(report.failed as u64);
		trace!(delivered = report.delivered, failed = report.failed, "dispatched {}", message);
		report
	}
}

/// Keeps a handler registered until dropped
#[must_use = "the handler is removed as soon as the guard is dropped"]
pub struct HandlerGuard {
	dispatcher: Arc<MessageDispatcher>,
	handler: Arc<dyn MessageHandler>,
}

impl HandlerGuard {
	pub(crate) fn new(dispatcher: Arc<MessageDispatcher>, handler: Arc<dyn MessageHandler>) -> Self {
		dispatcher.add_handler(Arc::clone(&handler));
		Self { dispatcher, handler }
	}
}

impl Drop for HandlerGuard {
	fn drop(&mut self) {
		self.dispatcher.remove_handler(&self.handler);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	fn dispatcher() -> Arc<MessageDispatcher> {
		Arc::new(MessageDispatcher::new(Arc::new(StreamMetrics::new().unwrap())))
	}

	fn alert() -> Message {
		Message::from_value(json!({"type": "alert", "alert": {"id": 1}})).unwrap()
	}

	fn counting(counter: &Arc<AtomicUsize>) -> Arc<dyn MessageHandler> {
		let counter = Arc::clone(counter);
		handler(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		})
	}

	#[test]
	fn test_all_handlers_receive_message() {
		let dispatcher = dispatcher();
		let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
		for counter in &counters {
			assert!(dispatcher.add_handler(counting(counter)));
		}

		let report = dispatcher.dispatch(&alert());

		assert_eq!(report, DispatchReport { delivered: 3, failed: 0 });
		for counter in &counters {
			assert_eq!(counter.load(Ordering::SeqCst), 1);
		}
	}

	#[test]
	fn test_same_arc_registers_once() {
		let dispatcher = dispatcher();
		let counter = Arc::new(AtomicUsize::new(0));
		let h = counting(&counter);

		assert!(dispatcher.add_handler(Arc::clone(&h)));
		assert!(!dispatcher.add_handler(Arc::clone(&h)));
		dispatcher.dispatch(&alert());

		assert_eq!(dispatcher.handler_count(), 1);
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_concurrent_adds_of_same_arc_register_once() {
		let dispatcher = dispatcher();
		let counter = Arc::new(AtomicUsize::new(0));
		let h = counting(&counter);
		let barrier = std::sync::Barrier::new(8);

		let added = std::thread::scope(|scope| {
			let workers: Vec<_> = (0..8)
				.map(|_| {
					scope.spawn(|| {
						barrier.wait();
						dispatcher.add_handler(Arc::clone(&h))
					})
				})
				.collect();
			workers.into_iter().map(|worker| worker.join().unwrap()).filter(|added| *added).count()
		});

		assert_eq!(added, 1);
		assert_eq!(dispatcher.handler_count(), 1);
		dispatcher.dispatch(&alert());
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_remove_requires_identical_arc() {
		let dispatcher = dispatcher();
		let counter = Arc::new(AtomicUsize::new(0));
		let registered = counting(&counter);
		let lookalike = counting(&counter);
		dispatcher.add_handler(Arc::clone(&registered));

		assert!(!dispatcher.remove_handler(&lookalike));
		assert!(dispatcher.remove_handler(&registered));
		assert!(!dispatcher.remove_handler(&registered));
		assert_eq!(dispatcher.handler_count(), 0);
	}

	#[test]
	fn test_failing_and_panicking_handlers_are_isolated() {
		let dispatcher = dispatcher();
		let counter = Arc::new(AtomicUsize::new(0));
		dispatcher.add_handler(counting(&counter));
		dispatcher.add_handler(handler(|_| anyhow::bail!("boom")));
		dispatcher.add_handler(handler(|_| panic!("handler panic")));
		dispatcher.add_handler(counting(&counter));

		let report = dispatcher.dispatch(&alert());

		assert_eq!(report, DispatchReport { delivered: 2, failed: 2 });
		assert_eq!(counter.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_registration_during_dispatch_applies_to_next_dispatch() {
		let dispatcher = dispatcher();
		let late_calls = Arc::new(AtomicUsize::new(0));
		let late = counting(&late_calls);
		let pending: Arc<Mutex<Option<Arc<dyn MessageHandler>>>> = Arc::new(Mutex::new(Some(late)));

		let inner = Arc::clone(&dispatcher);
		let slot = Arc::clone(&pending);
		dispatcher.add_handler(handler(move |_| {
			if let Some(h) = slot.lock().unwrap().take() {
				inner.add_handler(h);
			}
			Ok(())
		}));

		let first = dispatcher.dispatch(&alert());
		assert_eq!(first.delivered, 1);
		assert_eq!(late_calls.load(Ordering::SeqCst), 0);

		dispatcher.dispatch(&alert());
		assert_eq!(late_calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_guard_removes_on_drop() {
		let dispatcher = dispatcher();
		let counter = Arc::new(AtomicUsize::new(0));

		{
			let _guard = HandlerGuard::new(Arc::clone(&dispatcher), counting(&counter));
			dispatcher.dispatch(&alert());
			assert_eq!(dispatcher.handler_count(), 1);
		}

		dispatcher.dispatch(&alert());
		assert_eq!(dispatcher.handler_count(), 0);
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}
}
