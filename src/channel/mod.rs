//! Event channel adapter between the backend's step stream and the store.

/// Wire codec for the Socket.IO frames the adapter consumes.
pub mod protocol;
mod socket;

use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use crate::graph::StepEvent;

pub use socket::{SocketChannel, SocketConnector};

/// Something the channel reports to its owner.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
	/// Handshake completed.
	Connected,
	/// One analysis step finished.
	Step(StepEvent),
	/// The channel is gone for good.
	Disconnected(DisconnectReason),
}

/// Why a channel stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
	/// The owner closed the handle.
	Client,
	/// The server left the namespace or closed the transport.
	Server,
	/// The transport failed.
	Transport(String),
}

/// Callback receiving channel events in delivery order.
pub type EventSink = Rc<dyn Fn(ChannelEvent)>;

/// Errors raised by the channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
	/// The transport could not be opened.
	#[error("failed to open channel to {endpoint}: {message}")]
	Open {
		/// URL the channel was opened on.
		endpoint: String,
		/// Transport error text.
		message: String,
	},

	/// A frame did not follow the wire protocol.
	#[error("malformed frame {frame:?}: {message}")]
	Frame {
		/// Raw frame text.
		frame: String,
		/// What was wrong with it.
		message: String,
	},

	/// A payload was not the JSON we expected.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl ChannelError {
	pub(crate) fn frame(frame: &str, message: impl Into<String>) -> Self {
		Self::Frame {
			frame: frame.to_owned(),
			message: message.into(),
		}
	}

	pub(crate) fn open(endpoint: &str, message: impl Into<String>) -> Self {
		Self::Open {
			endpoint: endpoint.to_owned(),
			message: message.into(),
		}
	}
}

/// A live channel. Closing is idempotent; dropping the handle closes it.
pub trait EventChannel {
	/// Sever the channel.
	fn close(&mut self);
}

/// Opens channels to an endpoint.
pub trait ChannelConnector {
	/// Handle type returned by [`ChannelConnector::connect`].
	type Channel: EventChannel;

	/// Open a channel; events flow into `sink` until it is closed.
	fn connect(&self, endpoint: &str, sink: EventSink) -> Result<Self::Channel, ChannelError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
	Pending,
	Open,
	Closed,
}

/// Enforces channel ordering regardless of what the transport emits.
///
/// `Connected` passes at most once, `Step` only while connected, and
/// `Disconnected` at most once, after which nothing passes.
#[derive(Clone, Debug)]
pub struct ChannelLifecycle {
	phase: Rc<Cell<Phase>>,
}

impl Default for ChannelLifecycle {
	fn default() -> Self {
		Self {
			phase: Rc::new(Cell::new(Phase::Pending)),
		}
	}
}

impl ChannelLifecycle {
	/// Filter an event, returning it if it may be delivered.
	pub fn admit(&self, event: ChannelEvent) -> Option<ChannelEvent> {
		let phase = self.phase.get();
		let next = match (&event, phase) {
			(_, Phase::Closed) => return None,
			(ChannelEvent::Connected, Phase::Pending) => Phase::Open,
			(ChannelEvent::Connected, Phase::Open) => return None,
			(ChannelEvent::Step(_), Phase::Open) => Phase::Open,
			(ChannelEvent::Step(_), Phase::Pending) => return None,
			(ChannelEvent::Disconnected(_), _) => Phase::Closed,
		};
		self.phase.set(next);
		Some(event)
	}

	/// Whether `Connected` has passed and the channel is not closed yet.
	pub fn is_open(&self) -> bool {
		self.phase.get() == Phase::Open
	}

	/// Whether `Disconnected` has passed.
	pub fn is_closed(&self) -> bool {
		self.phase.get() == Phase::Closed
	}

	/// Wrap `sink` so that only admitted events reach it.
	pub fn guard(sink: EventSink) -> EventSink {
		let lifecycle = Self::default();
		Rc::new(move |event| {
			if let Some(event) = lifecycle.admit(event) {
				sink(event);
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use super::*;

	fn recording() -> (EventSink, Rc<RefCell<Vec<ChannelEvent>>>) {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let out = seen.clone();
		let sink: EventSink = Rc::new(move |e| out.borrow_mut().push(e));
		(ChannelLifecycle::guard(sink), seen)
	}

	#[test]
	fn connect_is_delivered_once() {
		let (sink, seen) = recording();
		sink(ChannelEvent::Connected);
		sink(ChannelEvent::Connected);
		assert_eq!(*seen.borrow(), vec![ChannelEvent::Connected]);
	}

	#[test]
	fn steps_require_connection() {
		let (sink, seen) = recording();
		sink(ChannelEvent::Step(StepEvent::new("early")));
		sink(ChannelEvent::Connected);
		sink(ChannelEvent::Step(StepEvent::new("a")));
		sink(ChannelEvent::Step(StepEvent::new("b")));
		assert_eq!(
			*seen.borrow(),
			vec![
				ChannelEvent::Connected,
				ChannelEvent::Step(StepEvent::new("a")),
				ChannelEvent::Step(StepEvent::new("b")),
			]
		);
	}

	#[test]
	fn disconnect_is_terminal() {
		let (sink, seen) = recording();
		sink(ChannelEvent::Connected);
		sink(ChannelEvent::Disconnected(DisconnectReason::Server));
		sink(ChannelEvent::Step(StepEvent::new("after")));
		sink(ChannelEvent::Connected);
		sink(ChannelEvent::Disconnected(DisconnectReason::Client));
		assert_eq!(
			*seen.borrow(),
			vec![
				ChannelEvent::Connected,
				ChannelEvent::Disconnected(DisconnectReason::Server),
			]
		);
	}

	#[test]
	fn disconnect_before_connect_closes() {
		let lifecycle = ChannelLifecycle::default();
		let reason = DisconnectReason::Transport("refused".into());
		assert!(lifecycle.admit(ChannelEvent::Disconnected(reason)).is_some());
		assert!(lifecycle.is_closed());
		assert!(lifecycle.admit(ChannelEvent::Connected).is_none());
	}
}
