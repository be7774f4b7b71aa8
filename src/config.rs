//! Client configuration, resolved once at startup.
//!
//! Endpoints come from build-time environment values so the static bundle
//! carries them; unset values fall back to a local backend.

use crate::graph::LayoutParams;

/// Backend used when no endpoint was provided at build time.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// How long an analysis waits for its channel before posting anyway.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u32 = 5_000;
/// Manual drags snap to this grid.
pub const DEFAULT_SNAP_GRID: f64 = 15.0;

const API_URL_ENV: Option<&str> = option_env!("STEP_GRAPH_API_URL");
const SOCKET_URL_ENV: Option<&str> = option_env!("STEP_GRAPH_SOCKET_URL");

/// Resolved client settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
	/// Base URL receiving `POST /analyze`.
	pub api_url: String,
	/// Base URL of the Socket.IO event channel.
	pub socket_url: String,
	/// Lane geometry for generated nodes.
	pub layout: LayoutParams,
	/// Grid applied to manual drags; `None` disables snapping.
	pub snap_grid: Option<f64>,
	/// Bound on the wait for the channel handshake before posting.
	pub handshake_timeout_ms: u32,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self::resolve(None, None)
	}
}

impl ClientConfig {
	/// Settings from the build environment.
	pub fn from_env() -> Self {
		Self::resolve(API_URL_ENV, SOCKET_URL_ENV)
	}

	/// Resolve settings from optional endpoint overrides.
	///
	/// Blank values count as unset. The socket endpoint defaults to the API
	/// endpoint since the backend serves both.
	pub fn resolve(api_url: Option<&str>, socket_url: Option<&str>) -> Self {
		let api_url = normalize(api_url).unwrap_or_else(|| DEFAULT_API_URL.to_owned());
		let socket_url = normalize(socket_url).unwrap_or_else(|| api_url.clone());
		Self {
			api_url,
			socket_url,
			layout: LayoutParams::default(),
			snap_grid: Some(DEFAULT_SNAP_GRID),
			handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
		}
	}
}

fn normalize(value: Option<&str>) -> Option<String> {
	let value = value?.trim().trim_end_matches('/');
	(!value.is_empty()).then(|| value.to_owned())
}
