use std::collections::BTreeMap;

use log::debug;

use super::error::{GraphError, GraphResult};
use super::layout::LayoutParams;
use super::types::{
	EdgeId, EdgeKind, GraphEdge, GraphNode, GraphSnapshot, NodeId, NodeKind, Position, SessionId,
	StepEvent,
};

/// Authoritative model of the step graph for the current session.
///
/// Node ids come from a counter that only ever moves forward, so an id held
/// by a stale gesture can never resolve to a node of a later session. Nodes
/// are keyed by id, which makes map order equal to insertion order.
#[derive(Debug)]
pub struct GraphStore {
	layout: LayoutParams,
	nodes: BTreeMap<NodeId, GraphNode>,
	edges: Vec<GraphEdge>,
	next_id: u64,
	generated: usize,
	session: SessionId,
	revision: u64,
}

impl Default for GraphStore {
	fn default() -> Self {
		Self::new(LayoutParams::default())
	}
}

impl GraphStore {
	/// Empty store placing generated nodes with `layout`.
	pub fn new(layout: LayoutParams) -> Self {
		Self {
			layout,
			nodes: BTreeMap::new(),
			edges: Vec::new(),
			next_id: 0,
			generated: 0,
			session: SessionId::default(),
			revision: 0,
		}
	}

	/// Current session token.
	pub fn session(&self) -> SessionId {
		self.session
	}

	/// Bumped on every mutation.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Layout used for generated nodes.
	pub fn layout(&self) -> LayoutParams {
		self.layout
	}

	/// Drop every node and edge and open a new session.
	pub fn reset(&mut self) -> SessionId {
		self.nodes.clear();
		self.edges.clear();
		self.generated = 0;
		self.session = SessionId(self.session.0 + 1);
		self.revision += 1;
		debug!("graph reset, session {}", self.session.0);
		self.session
	}

	/// Accept a step event tagged with the session it was received under.
	///
	/// Events from any other session are stragglers and are dropped.
	pub fn ingest(&mut self, session: SessionId, event: StepEvent) -> Option<GraphNode> {
		if session != self.session {
			debug!(
				"dropping step {:?} from stale session {} (current {})",
				event.label, session.0, self.session.0
			);
			return None;
		}
		Some(self.append_generated_node(event.label))
	}

	/// Append the next generated node and chain it to its predecessor.
	pub fn append_generated_node(&mut self, label: impl Into<String>) -> GraphNode {
		let ordinal = self.generated;
		let node = GraphNode {
			id: self.allocate_id(),
			label: label.into(),
			position: self.layout.position_for(ordinal),
			kind: NodeKind::Generated,
		};
		let previous = self.last_generated();
		self.generated += 1;
		self.nodes.insert(node.id, node.clone());
		if let Some(prev) = previous {
			self.edges.push(GraphEdge::new(prev, node.id, EdgeKind::Chain));
		}
		self.revision += 1;
		node
	}

	/// Add a user-created node at `position`.
	pub fn append_manual_node(&mut self, label: impl Into<String>, position: Position) -> GraphNode {
		let node = GraphNode {
			id: self.allocate_id(),
			label: label.into(),
			position,
			kind: NodeKind::Manual,
		};
		self.nodes.insert(node.id, node.clone());
		self.revision += 1;
		node
	}

	/// Overwrite the position of an existing node.
	pub fn apply_manual_position(&mut self, id: NodeId, position: Position) -> GraphResult<()> {
		let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
		if node.position != position {
			node.position = position;
			self.revision += 1;
		}
		Ok(())
	}

	/// Create a user edge between two existing nodes.
	pub fn connect_manual(&mut self, source: NodeId, target: NodeId) -> GraphResult<GraphEdge> {
		for id in [source, target] {
			if !self.nodes.contains_key(&id) {
				return Err(GraphError::NodeNotFound(id));
			}
		}
		let id = EdgeId::new(source, target);
		if self.edge(id).is_some() {
			return Err(GraphError::DuplicateEdge(id));
		}
		let edge = GraphEdge::new(source, target, EdgeKind::Manual);
		self.edges.push(edge.clone());
		self.revision += 1;
		Ok(edge)
	}

	/// Remove a node together with every edge that touches it.
	pub fn remove_node(&mut self, id: NodeId) -> GraphResult<GraphNode> {
		let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
		self.edges.retain(|e| !e.touches(id));
		self.revision += 1;
		Ok(node)
	}

	/// Remove a single edge.
	pub fn remove_edge(&mut self, id: EdgeId) -> GraphResult<GraphEdge> {
		let idx = self
			.edges
			.iter()
			.position(|e| e.id == id)
			.ok_or(GraphError::EdgeNotFound(id))?;
		self.revision += 1;
		Ok(self.edges.remove(idx))
	}

	/// Consistent copy of nodes and edges for rendering.
	pub fn snapshot(&self) -> GraphSnapshot {
		GraphSnapshot {
			nodes: self.nodes.values().cloned().collect(),
			edges: self.edges.clone(),
		}
	}

	/// Node by id, if present.
	pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
		self.nodes.get(&id)
	}

	/// Edge by id, if present.
	pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
		self.edges.iter().find(|e| e.id == id)
	}

	/// Nodes in id order, which is insertion order.
	pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
		self.nodes.values()
	}

	/// Edges in insertion order.
	pub fn edges(&self) -> &[GraphEdge] {
		&self.edges
	}

	/// Number of nodes of either kind.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Number of edges of either kind.
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	/// Generated nodes accepted in this session, including removed ones.
	pub fn generated_count(&self) -> usize {
		self.generated
	}

	/// Number of chain edges.
	pub fn chain_edge_count(&self) -> usize {
		self.edges.iter().filter(|e| e.kind == EdgeKind::Chain).count()
	}

	/// Number of user-drawn edges.
	pub fn manual_edge_count(&self) -> usize {
		self.edges.iter().filter(|e| e.kind == EdgeKind::Manual).count()
	}

	/// Whether the store holds nothing.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}

	fn allocate_id(&mut self) -> NodeId {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		id
	}

	// Most recent generated node still present; the user may have deleted the
	// true predecessor.
	fn last_generated(&self) -> Option<NodeId> {
		self.nodes
			.values()
			.rev()
			.find(|n| n.kind == NodeKind::Generated)
			.map(|n| n.id)
	}
}
