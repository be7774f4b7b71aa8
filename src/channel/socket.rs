use futures::channel::oneshot;
use futures::future::{Either, select};
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::Message;
use gloo_net::websocket::futures::WebSocket;
use leptos::task::spawn_local;
use log::{debug, info, warn};

use super::protocol::{self, CONNECT_REQUEST, Frame, PONG};
use super::{
	ChannelConnector, ChannelError, ChannelEvent, DisconnectReason, EventChannel, EventSink,
};

/// Opens Socket.IO channels over a browser WebSocket.
#[derive(Clone, Copy, Debug, Default)]
pub struct SocketConnector;

/// Handle to a running socket task.
///
/// The socket lives as long as the handle: closing or dropping it stops the
/// read loop, which drops both halves of the WebSocket.
#[derive(Debug)]
pub struct SocketChannel {
	url: String,
	shutdown: Option<oneshot::Sender<()>>,
}

impl SocketChannel {
	/// WebSocket URL this channel was opened on.
	pub fn url(&self) -> &str {
		&self.url
	}
}

impl EventChannel for SocketChannel {
	fn close(&mut self) {
		if let Some(tx) = self.shutdown.take() {
			debug!("closing channel {}", self.url);
			let _ = tx.send(());
		}
	}
}

impl Drop for SocketChannel {
	fn drop(&mut self) {
		self.close();
	}
}

impl ChannelConnector for SocketConnector {
	type Channel = SocketChannel;

	fn connect(&self, endpoint: &str, sink: EventSink) -> Result<SocketChannel, ChannelError> {
		let url = protocol::socket_url(endpoint);
		let ws = WebSocket::open(&url).map_err(|e| ChannelError::open(&url, e.to_string()))?;
		let (tx, rx) = oneshot::channel();
		info!("opening channel {url}");
		spawn_local(run(ws, sink, rx));
		Ok(SocketChannel {
			url,
			shutdown: Some(tx),
		})
	}
}

/// What the read loop does with one decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Reaction {
	Send(&'static str),
	Emit(ChannelEvent),
	Stop(DisconnectReason),
	Nothing,
}

pub(crate) fn react(frame: Frame) -> Reaction {
	match frame {
		Frame::Open(handshake) => {
			debug!(
				"engine open sid={} ping={}ms",
				handshake.sid, handshake.ping_interval
			);
			Reaction::Send(CONNECT_REQUEST)
		}
		Frame::Ping => Reaction::Send(PONG),
		Frame::Pong | Frame::Noop => Reaction::Nothing,
		Frame::Close | Frame::Disconnected => Reaction::Stop(DisconnectReason::Server),
		Frame::ConnectError(message) => Reaction::Stop(DisconnectReason::Transport(message)),
		Frame::Connected => Reaction::Emit(ChannelEvent::Connected),
		Frame::Step(step) => Reaction::Emit(ChannelEvent::Step(step)),
		Frame::Event { name, .. } => {
			debug!("ignoring event {name:?}");
			Reaction::Nothing
		}
	}
}

async fn run(ws: WebSocket, sink: EventSink, mut shutdown: oneshot::Receiver<()>) {
	let (mut write, mut read) = ws.split();
	let reason = loop {
		let message = match select(read.next(), &mut shutdown).await {
			Either::Left((Some(Ok(message)), _)) => message,
			Either::Left((Some(Err(err)), _)) => break DisconnectReason::Transport(err.to_string()),
			Either::Left((None, _)) => break DisconnectReason::Server,
			Either::Right(_) => break DisconnectReason::Client,
		};
		let Message::Text(text) = message else {
			debug!("skipping binary frame");
			continue;
		};
		let frame = match protocol::decode(&text) {
			Ok(frame) => frame,
			Err(err) => {
				warn!("{err}");
				continue;
			}
		};
		match react(frame) {
			Reaction::Send(reply) => {
				if let Err(err) = write.send(Message::Text(reply.to_owned())).await {
					break DisconnectReason::Transport(err.to_string());
				}
			}
			Reaction::Emit(event) => sink(event),
			Reaction::Stop(reason) => break reason,
			Reaction::Nothing => {}
		}
	};
	match &reason {
		DisconnectReason::Client => debug!("channel closed by client"),
		other => warn!("channel lost: {other:?}"),
	}
	sink(ChannelEvent::Disconnected(reason));
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::StepEvent;

	#[test]
	fn handshake_triggers_namespace_join() {
		let frame = protocol::decode(r#"0{"sid":"s","pingInterval":25000,"pingTimeout":5000}"#).unwrap();
		assert_eq!(react(frame), Reaction::Send("40"));
	}

	#[test]
	fn ping_is_answered() {
		assert_eq!(react(Frame::Ping), Reaction::Send("3"));
	}

	#[test]
	fn steps_and_connects_are_emitted() {
		assert_eq!(
			react(Frame::Connected),
			Reaction::Emit(ChannelEvent::Connected)
		);
		assert_eq!(
			react(Frame::Step(StepEvent::new("a"))),
			Reaction::Emit(ChannelEvent::Step(StepEvent::new("a")))
		);
	}

	#[test]
	fn server_side_endings_stop_the_loop() {
		assert_eq!(
			react(Frame::Close),
			Reaction::Stop(DisconnectReason::Server)
		);
		assert_eq!(
			react(Frame::Disconnected),
			Reaction::Stop(DisconnectReason::Server)
		);
		assert_eq!(
			react(Frame::ConnectError("nope".into())),
			Reaction::Stop(DisconnectReason::Transport("nope".into()))
		);
	}

	#[test]
	fn unrelated_events_are_ignored() {
		let frame = Frame::Event {
			name: "progress".into(),
			payload: serde_json::Value::Null,
		};
		assert_eq!(react(frame), Reaction::Nothing);
	}
}
