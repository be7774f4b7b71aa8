//! Starts analyses and ties each one to a fresh graph session.
//!
//! Every `start_analysis` resets the store, replaces the event channel with
//! one bound to the new session, waits (bounded) for it to settle, then
//! posts the trigger. Events reaching an old channel's sink carry the old session and
//! are dropped by the store.

mod http;
mod request;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, Either, LocalBoxFuture};
use gloo_timers::future::TimeoutFuture;
use log::{debug, error, info, warn};

use crate::channel::{
	ChannelConnector, ChannelEvent, ChannelLifecycle, DisconnectReason, EventChannel, EventSink,
};
use crate::config::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use crate::graph::{GraphStore, SessionId};

pub use http::HttpBackend;
pub use request::{AnalysisReport, AnalysisRequest, RequestError, interpret_reply};

/// Store shared between the coordinator, channel sinks and the canvas.
pub type SharedStore = Rc<RefCell<GraphStore>>;

/// Collaborator that accepts analysis triggers.
#[allow(async_fn_in_trait)]
pub trait AnalysisBackend {
	/// Send one trigger. Step events arrive separately over the channel.
	async fn analyze(&self, request: &AnalysisRequest) -> Result<Option<AnalysisReport>, RequestError>;
}

/// State of the current session's event channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
	/// No analysis has been started, or the page shut the channel.
	#[default]
	Idle,
	/// A channel was opened and has not answered yet.
	Connecting,
	/// Step events are flowing.
	Connected,
	/// The channel dropped or could not be opened.
	Disconnected,
}

impl ConnectionStatus {
	/// Short text for the status badge.
	pub fn label(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Connecting => "connecting",
			Self::Connected => "live",
			Self::Disconnected => "disconnected",
		}
	}
}

#[derive(Default)]
struct StatusReporter {
	current: Cell<ConnectionStatus>,
	observer: RefCell<Option<Rc<dyn Fn(ConnectionStatus)>>>,
}

impl StatusReporter {
	fn set(&self, status: ConnectionStatus) {
		if self.current.replace(status) == status {
			return;
		}
		let observer = self.observer.borrow().clone();
		if let Some(observer) = observer {
			observer(status);
		}
	}
}

/// Resolves when the wait for a channel handshake should give up.
type HandshakeTimer = Box<dyn Fn() -> LocalBoxFuture<'static, ()>>;

fn browser_timer(ms: u32) -> HandshakeTimer {
	// the browser timeout is only armed once the race is polled
	Box::new(move || async move { TimeoutFuture::new(ms).await }.boxed_local())
}

/// Owns the request lifecycle and the single live channel.
pub struct AnalysisCoordinator<B, C: ChannelConnector> {
	store: SharedStore,
	backend: B,
	connector: C,
	socket_url: String,
	channel: RefCell<Option<C::Channel>>,
	status: Rc<StatusReporter>,
	handshake_timer: HandshakeTimer,
}

impl<B: AnalysisBackend, C: ChannelConnector> AnalysisCoordinator<B, C> {
	/// Coordinator posting to `backend` and listening on `socket_url`.
	///
	/// The handshake wait defaults to [`DEFAULT_HANDSHAKE_TIMEOUT_MS`].
	pub fn new(store: SharedStore, backend: B, connector: C, socket_url: impl Into<String>) -> Self {
		Self {
			store,
			backend,
			connector,
			socket_url: socket_url.into(),
			channel: RefCell::new(None),
			status: Rc::new(StatusReporter::default()),
			handshake_timer: browser_timer(DEFAULT_HANDSHAKE_TIMEOUT_MS),
		}
	}

	/// Give up waiting for the channel handshake after `ms` milliseconds.
	pub fn with_handshake_timeout(mut self, ms: u32) -> Self {
		self.handshake_timer = browser_timer(ms);
		self
	}

	/// Replace the handshake timeout with an arbitrary future.
	pub fn with_handshake_timer<F>(mut self, timer: impl Fn() -> F + 'static) -> Self
	where
		F: Future<Output = ()> + 'static,
	{
		self.handshake_timer = Box::new(move || timer().boxed_local());
		self
	}

	/// Store the channels feed.
	pub fn store(&self) -> &SharedStore {
		&self.store
	}

	/// Backend that receives triggers.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Status of the current session's channel.
	pub fn status(&self) -> ConnectionStatus {
		self.status.current.get()
	}

	/// Register a callback invoked on every status change.
	pub fn on_status(&self, observer: impl Fn(ConnectionStatus) + 'static) {
		*self.status.observer.borrow_mut() = Some(Rc::new(observer));
	}

	/// Whether a channel handle is currently held.
	pub fn has_channel(&self) -> bool {
		self.channel.borrow().is_some()
	}

	/// Validate the form, reset the graph and trigger a new analysis.
	///
	/// Invalid input is rejected before anything is touched. Once valid, the
	/// graph is emptied synchronously and stays empty if the trigger fails.
	pub async fn start_analysis(
		&self,
		ticker: &str,
		start_date: &str,
		end_date: &str,
	) -> Result<Option<AnalysisReport>, RequestError> {
		let request = AnalysisRequest::parse(ticker, start_date, end_date)?;
		let (session, ready) = self.begin_session();

		if let Some(ready) = ready {
			self.await_handshake(ready).await;
		}
		if self.store.borrow().session() != session {
			debug!("analysis for {} superseded before dispatch", request.ticker);
			return Err(RequestError::Superseded);
		}

		info!(
			"requesting analysis of {} from {} to {}",
			request.ticker, request.start_date, request.end_date
		);
		match self.backend.analyze(&request).await {
			Ok(report) => Ok(report),
			Err(err) => {
				error!("analysis request failed: {err}");
				Err(err)
			}
		}
	}

	/// Close the channel. Called on teardown.
	pub fn shutdown(&self) {
		self.release_channel();
		self.status.set(ConnectionStatus::Idle);
	}

	// A channel that never answers must not hold the trigger back.
	async fn await_handshake(&self, ready: oneshot::Receiver<()>) {
		match future::select(ready, (self.handshake_timer)()).await {
			// Sender dropped means the channel went away; post anyway.
			Either::Left(_) => {}
			Either::Right(_) => warn!("channel handshake timed out; posting the trigger anyway"),
		}
	}

	fn begin_session(&self) -> (SessionId, Option<oneshot::Receiver<()>>) {
		self.release_channel();
		let session = self.store.borrow_mut().reset();
		let (ready_tx, ready_rx) = oneshot::channel();
		let sink = ChannelLifecycle::guard(self.session_sink(session, ready_tx));

		self.status.set(ConnectionStatus::Connecting);
		match self.connector.connect(&self.socket_url, sink) {
			Ok(channel) => {
				*self.channel.borrow_mut() = Some(channel);
				(session, Some(ready_rx))
			}
			Err(err) => {
				warn!("{err}; the graph will not grow for this analysis");
				self.status.set(ConnectionStatus::Disconnected);
				(session, None)
			}
		}
	}

	fn release_channel(&self) {
		let previous = self.channel.borrow_mut().take();
		if let Some(mut channel) = previous {
			channel.close();
		}
	}

	fn session_sink(&self, session: SessionId, ready: oneshot::Sender<()>) -> EventSink {
		let store = self.store.clone();
		let status = self.status.clone();
		let ready = RefCell::new(Some(ready));
		Rc::new(move |event: ChannelEvent| {
			if !matches!(event, ChannelEvent::Step(_)) {
				let tx = ready.borrow_mut().take();
				if let Some(tx) = tx {
					let _ = tx.send(());
				}
			}
			if store.borrow().session() != session {
				debug!("ignoring {event:?} from stale session {}", session.0);
				return;
			}
			match event {
				ChannelEvent::Connected => {
					info!("channel connected");
					status.set(ConnectionStatus::Connected);
				}
				ChannelEvent::Step(step) => {
					store.borrow_mut().ingest(session, step);
				}
				// our own close; the status was already set by whoever closed
				ChannelEvent::Disconnected(DisconnectReason::Client) => {
					debug!("channel closed by the client");
				}
				ChannelEvent::Disconnected(reason) => {
					warn!("channel disconnected: {reason:?}");
					status.set(ConnectionStatus::Disconnected);
				}
			}
		})
	}
}

impl<B, C: ChannelConnector> Drop for AnalysisCoordinator<B, C> {
	fn drop(&mut self) {
		if let Some(mut channel) = self.channel.get_mut().take() {
			channel.close();
		}
	}
}
