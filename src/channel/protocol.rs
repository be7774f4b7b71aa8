//! Socket.IO v4 text frames carried over Engine.IO v4.
//!
//! Only the subset a listening client needs: handshake, heartbeat, connect
//! acknowledgement, disconnect and named events.

use serde::Deserialize;
use serde_json::Value;

use super::ChannelError;
use crate::graph::StepEvent;

/// Event name carrying step progress.
pub const NODE_UPDATE: &str = "node_update";

/// Sent once the Engine.IO handshake arrives to join the default namespace.
pub const CONNECT_REQUEST: &str = "40";
/// Reply to an Engine.IO ping.
pub const PONG: &str = "3";

/// Engine.IO open handshake payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
	/// Engine.IO session id.
	pub sid: String,
	/// Server heartbeat period in milliseconds.
	#[serde(default)]
	pub ping_interval: u64,
	/// How long the server waits for a pong, in milliseconds.
	#[serde(default)]
	pub ping_timeout: u64,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
	/// Engine.IO transport opened.
	Open(Handshake),
	/// Engine.IO transport closed by the server.
	Close,
	/// Heartbeat request; must be answered with [`PONG`].
	Ping,
	/// Heartbeat answer.
	Pong,
	/// Transport filler, ignored.
	Noop,
	/// Socket.IO namespace joined.
	Connected,
	/// Socket.IO namespace left by the server.
	Disconnected,
	/// Namespace join refused.
	ConnectError(String),
	/// A step event from `node_update`.
	Step(StepEvent),
	/// Any other named event.
	Event {
		/// Event name.
		name: String,
		/// First argument of the event.
		payload: Value,
	},
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Frame, ChannelError> {
	let mut chars = text.chars();
	let kind = chars.next().ok_or_else(|| ChannelError::frame(text, "empty frame"))?;
	let rest = chars.as_str();
	match kind {
		'0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
		'1' => Ok(Frame::Close),
		'2' => Ok(Frame::Ping),
		'3' => Ok(Frame::Pong),
		'4' => decode_packet(text, rest),
		'6' => Ok(Frame::Noop),
		_ => Err(ChannelError::frame(text, "unknown engine packet type")),
	}
}

fn decode_packet(frame: &str, packet: &str) -> Result<Frame, ChannelError> {
	let mut chars = packet.chars();
	let kind = chars
		.next()
		.ok_or_else(|| ChannelError::frame(frame, "empty socket packet"))?;
	let body = strip_namespace(chars.as_str());
	match kind {
		'0' => Ok(Frame::Connected),
		'1' => Ok(Frame::Disconnected),
		'2' => decode_event(frame, strip_ack_id(body)),
		'4' => {
			let message = serde_json::from_str::<Value>(body)
				.ok()
				.and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
				.unwrap_or_else(|| body.to_owned());
			Ok(Frame::ConnectError(message))
		}
		_ => Err(ChannelError::frame(frame, "unsupported socket packet type")),
	}
}

fn decode_event(frame: &str, body: &str) -> Result<Frame, ChannelError> {
	let value: Value = serde_json::from_str(body)?;
	let Value::Array(mut items) = value else {
		return Err(ChannelError::frame(frame, "event body is not an array"));
	};
	if items.is_empty() {
		return Err(ChannelError::frame(frame, "event without a name"));
	}
	let name = match items.remove(0) {
		Value::String(name) => name,
		_ => return Err(ChannelError::frame(frame, "event name is not a string")),
	};
	let payload = if items.is_empty() {
		Value::Null
	} else {
		items.remove(0)
	};
	if name == NODE_UPDATE {
		return Ok(Frame::Step(serde_json::from_value(payload)?));
	}
	Ok(Frame::Event { name, payload })
}

// "/admin,[...]" -> "[...]"
fn strip_namespace(body: &str) -> &str {
	if body.starts_with('/') {
		match body.find(',') {
			Some(i) => &body[i + 1..],
			None => "",
		}
	} else {
		body
	}
}

fn strip_ack_id(body: &str) -> &str {
	body.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Socket.IO WebSocket endpoint for a backend base URL.
pub fn socket_url(base: &str) -> String {
	let base = base.trim_end_matches('/');
	let base = if let Some(rest) = base.strip_prefix("https://") {
		format!("wss://{rest}")
	} else if let Some(rest) = base.strip_prefix("http://") {
		format!("ws://{rest}")
	} else if base.starts_with("ws://") || base.starts_with("wss://") {
		base.to_owned()
	} else {
		format!("ws://{base}")
	};
	format!("{base}/socket.io/?EIO=4&transport=websocket")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_handshake() {
		let frame = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
			.unwrap();
		assert_eq!(
			frame,
			Frame::Open(Handshake {
				sid: "abc".into(),
				ping_interval: 25000,
				ping_timeout: 20000,
			})
		);
	}

	#[test]
	fn decodes_heartbeat_and_lifecycle() {
		assert_eq!(decode("2").unwrap(), Frame::Ping);
		assert_eq!(decode("3").unwrap(), Frame::Pong);
		assert_eq!(decode("1").unwrap(), Frame::Close);
		assert_eq!(decode("6").unwrap(), Frame::Noop);
		assert_eq!(decode(r#"40{"sid":"x"}"#).unwrap(), Frame::Connected);
		assert_eq!(decode("40").unwrap(), Frame::Connected);
		assert_eq!(decode("41").unwrap(), Frame::Disconnected);
	}

	#[test]
	fn decodes_node_update() {
		let frame = decode(r#"42["node_update",{"label":"Fetching AAPL..."}]"#).unwrap();
		assert_eq!(frame, Frame::Step(StepEvent::new("Fetching AAPL...")));
	}

	#[test]
	fn tolerates_namespace_and_ack_id() {
		let frame = decode(r#"42/analysis,17["node_update",{"label":"x"}]"#).unwrap();
		assert_eq!(frame, Frame::Step(StepEvent::new("x")));
	}

	#[test]
	fn other_events_pass_through() {
		match decode(r#"42["progress",3]"#).unwrap() {
			Frame::Event { name, payload } => {
				assert_eq!(name, "progress");
				assert_eq!(payload, Value::from(3));
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn connect_error_carries_message() {
		assert_eq!(
			decode(r#"44{"message":"Not authorized"}"#).unwrap(),
			Frame::ConnectError("Not authorized".into())
		);
	}

	#[test]
	fn malformed_frames_are_errors() {
		assert!(decode("").is_err());
		assert!(decode("9").is_err());
		assert!(decode("42{}").is_err());
		assert!(decode("42[]").is_err());
		assert!(decode(r#"42["node_update",{"title":"x"}]"#).is_err());
		assert!(decode(r#"42[1,{}]"#).is_err());
	}

	#[test]
	fn socket_url_follows_scheme() {
		assert_eq!(
			socket_url("http://localhost:8000/"),
			"ws://localhost:8000/socket.io/?EIO=4&transport=websocket"
		);
		assert_eq!(
			socket_url("https://example.com"),
			"wss://example.com/socket.io/?EIO=4&transport=websocket"
		);
		assert_eq!(
			socket_url("example.com"),
			"ws://example.com/socket.io/?EIO=4&transport=websocket"
		);
	}
}
