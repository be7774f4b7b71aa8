use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node, allocated by the store's monotonic counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifier of an edge, derived from its ordered endpoint pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
	/// Tail of the edge.
	pub source: NodeId,
	/// Head of the edge.
	pub target: NodeId,
}

impl EdgeId {
	/// Edge id for the `source -> target` pair.
	pub fn new(source: NodeId, target: NodeId) -> Self {
		Self { source, target }
	}
}

impl fmt::Display for EdgeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "e{}-{}", self.source, self.target)
	}
}

/// Token identifying one analysis session. Bumped on every reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Position in graph space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate.
	pub y: f64,
}

impl Position {
	/// Position at `(x, y)`.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

/// Origin of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	/// Materialized from a step event.
	Generated,
	/// Added by the user on the canvas.
	Manual,
}

/// Origin of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
	/// Inserted between two consecutively generated nodes.
	Chain,
	/// Drawn by the user.
	Manual,
}

/// A node of the step graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	/// Unique id, never reused.
	pub id: NodeId,
	/// Step label shown in the box.
	pub label: String,
	/// Top-left corner of the node box.
	pub position: Position,
	/// Whether the node came from the stream or from the user.
	pub kind: NodeKind,
}

/// A directed edge of the step graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
	/// Id derived from the endpoint pair.
	pub id: EdgeId,
	/// Tail node.
	pub source: NodeId,
	/// Head node.
	pub target: NodeId,
	/// Whether the edge was chained or drawn.
	pub kind: EdgeKind,
	/// Chain edges render with a flowing dash.
	pub animated: bool,
}

impl GraphEdge {
	pub(crate) fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
		Self {
			id: EdgeId::new(source, target),
			source,
			target,
			kind,
			animated: kind == EdgeKind::Chain,
		}
	}

	/// Whether either endpoint is `node`.
	pub fn touches(&self, node: NodeId) -> bool {
		self.source == node || self.target == node
	}
}

/// Payload of a `node_update` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
	/// Human-readable step name.
	pub label: String,
}

impl StepEvent {
	/// Step event with the given label.
	pub fn new(label: impl Into<String>) -> Self {
		Self {
			label: label.into(),
		}
	}
}

/// Immutable read view of the store handed to the rendering surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
	/// Nodes in insertion order, which is ascending id order.
	pub nodes: Vec<GraphNode>,
	/// Edges in insertion order.
	pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
	/// Look up a node by id.
	///
	/// Ids are allocated monotonically, so `nodes` is sorted by id.
	pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
		self.nodes
			.binary_search_by_key(&id, |n| n.id)
			.ok()
			.map(|idx| &self.nodes[idx])
	}

	/// Whether the view has no nodes and no edges.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}
}
