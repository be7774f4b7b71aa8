use std::collections::HashSet;

use log::debug;

use super::scale::{Bounds, ViewTransform};
use crate::graph::{
	EdgeId, GraphEdge, GraphNode, GraphSnapshot, GraphStore, NodeId, NodeKind, Position,
	SessionId, snap_to_grid,
};

pub const NODE_WIDTH: f64 = 200.0;
pub const NODE_HEIGHT: f64 = 60.0;
/// Edge pick tolerance in screen pixels.
pub const EDGE_HIT_DISTANCE: f64 = 6.0;

/// What the user last clicked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
	Node(NodeId),
	Edge(EdgeId),
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node: Option<NodeId>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start: Position,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// Connection being drawn from `source` towards the cursor.
#[derive(Clone, Debug, Default)]
pub struct ConnectState {
	pub source: Option<NodeId>,
	pub cursor: Position,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<NodeId>,
	pub neighbors: HashSet<NodeId>,
	pub highlight_t: f64,
	pub prev_node: Option<NodeId>,
	pub prev_neighbors: HashSet<NodeId>,
	delay_t: f64,
}

/// Gesture state of the canvas.
///
/// Pan and zoom only touch `transform`. Everything that changes the graph
/// goes through the store and is then mirrored into `view`, which is the
/// translated snapshot the renderer draws.
pub struct CanvasState {
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub connect: ConnectState,
	pub hover: HoverState,
	pub selection: Option<Selection>,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
	/// Keep the whole graph in view until the user pans or zooms.
	pub follow: bool,
	view: GraphSnapshot,
	view_revision: Option<u64>,
	session: Option<SessionId>,
	snap_grid: Option<f64>,
}

impl CanvasState {
	pub fn new(width: f64, height: f64, snap_grid: Option<f64>) -> Self {
		Self {
			transform: ViewTransform {
				x: width / 2.0 - NODE_WIDTH / 2.0,
				y: height / 2.0 - NODE_HEIGHT / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			connect: ConnectState::default(),
			hover: HoverState::default(),
			selection: None,
			width,
			height,
			flow_time: 0.0,
			follow: true,
			view: GraphSnapshot::default(),
			view_revision: None,
			session: None,
			snap_grid,
		}
	}

	/// Translated view of the store as of the last refresh.
	pub fn view(&self) -> &GraphSnapshot {
		&self.view
	}

	/// Pull a fresh snapshot if the store changed. Returns whether it did.
	///
	/// A new session invalidates every in-flight gesture since the ids it
	/// holds now point nowhere.
	pub fn refresh(&mut self, store: &GraphStore) -> bool {
		if self.session != Some(store.session()) {
			self.session = Some(store.session());
			self.cancel_gestures();
			self.selection = None;
			self.set_hover(None);
			self.follow = true;
		}
		if self.view_revision == Some(store.revision()) {
			return false;
		}
		self.view = store.snapshot();
		self.view_revision = Some(store.revision());
		if let Some(Selection::Node(id)) = self.selection {
			if self.view.node(id).is_none() {
				self.selection = None;
			}
		}
		if let Some(Selection::Edge(id)) = self.selection {
			if !self.view.edges.iter().any(|e| e.id == id) {
				self.selection = None;
			}
		}
		if self.follow {
			self.fit_view();
		}
		true
	}

	pub fn fit_view(&mut self) {
		let boxes = self
			.view
			.nodes
			.iter()
			.map(|n| (n.position, (NODE_WIDTH, NODE_HEIGHT)));
		if let Some(bounds) = Bounds::enclosing(boxes) {
			self.transform = ViewTransform::fit(bounds, self.width, self.height);
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Position {
		self.transform.screen_to_graph(sx, sy)
	}

	/// Topmost node whose box contains the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<NodeId> {
		let p = self.screen_to_graph(sx, sy);
		self.view
			.nodes
			.iter()
			.rev()
			.find(|n| node_bounds(n).contains(p))
			.map(|n| n.id)
	}

	/// Nearest edge within the pick tolerance of the screen point.
	pub fn edge_at_position(&self, sx: f64, sy: f64) -> Option<EdgeId> {
		let p = self.screen_to_graph(sx, sy);
		let tolerance = EDGE_HIT_DISTANCE / self.transform.k;
		self.view
			.edges
			.iter()
			.filter_map(|e| {
				let (a, b) = self.edge_endpoints(e)?;
				Some((e.id, distance_to_segment(p, a, b)))
			})
			.filter(|&(_, d)| d <= tolerance)
			.min_by(|a, b| a.1.total_cmp(&b.1))
			.map(|(id, _)| id)
	}

	/// Box centers of both endpoints, if both are in the view.
	pub fn edge_endpoints(&self, edge: &GraphEdge) -> Option<(Position, Position)> {
		let source = self.view.node(edge.source)?;
		let target = self.view.node(edge.target)?;
		Some((node_center(source), node_center(target)))
	}

	pub fn pointer_down(&mut self, sx: f64, sy: f64, connect: bool) {
		if let Some(id) = self.node_at_position(sx, sy) {
			self.selection = Some(Selection::Node(id));
			if connect {
				self.connect.source = Some(id);
				self.connect.cursor = self.screen_to_graph(sx, sy);
			} else if let Some(node) = self.view.node(id) {
				self.drag = DragState {
					node: Some(id),
					start_x: sx,
					start_y: sy,
					node_start: node.position,
				};
			}
		} else if let Some(edge) = self.edge_at_position(sx, sy) {
			self.selection = Some(Selection::Edge(edge));
		} else {
			self.selection = None;
			self.pan = PanState {
				active: true,
				start_x: sx,
				start_y: sy,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
			};
		}
	}

	pub fn pointer_move(&mut self, store: &mut GraphStore, sx: f64, sy: f64) {
		if self.drag.node.is_none() && self.connect.source.is_none() {
			let hovered = self.node_at_position(sx, sy);
			self.set_hover(hovered);
		}

		if let Some(id) = self.drag.node {
			let target = Position::new(
				self.drag.node_start.x + (sx - self.drag.start_x) / self.transform.k,
				self.drag.node_start.y + (sy - self.drag.start_y) / self.transform.k,
			);
			let target = match self.snap_grid {
				Some(grid) => snap_to_grid(target, grid),
				None => target,
			};
			if let Err(err) = store.apply_manual_position(id, target) {
				debug!("dropping drag: {err}");
				self.drag = DragState::default();
			}
			// a dragged node should not make the view jump around it
			self.follow = false;
			self.refresh(store);
		} else if self.connect.source.is_some() {
			self.connect.cursor = self.screen_to_graph(sx, sy);
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
			self.follow = false;
		}
	}

	/// Finish the current gesture, returning the edge a connection created.
	pub fn pointer_up(&mut self, store: &mut GraphStore, sx: f64, sy: f64) -> Option<GraphEdge> {
		let mut created = None;
		if let Some(source) = self.connect.source.take() {
			match self.node_at_position(sx, sy) {
				Some(target) if target != source => match store.connect_manual(source, target) {
					Ok(edge) => {
						self.selection = Some(Selection::Edge(edge.id));
						created = Some(edge);
					}
					Err(err) => debug!("ignoring connection: {err}"),
				},
				_ => {}
			}
		}
		self.drag = DragState::default();
		self.pan.active = false;
		self.refresh(store);
		created
	}

	pub fn pointer_leave(&mut self) {
		self.cancel_gestures();
		self.set_hover(None);
	}

	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		self.transform.zoom_at(sx, sy, delta_y);
		self.follow = false;
	}

	/// One zoom notch about the viewport center; `zoom_in` picks the direction.
	pub fn zoom_step(&mut self, zoom_in: bool) {
		let delta = if zoom_in { -1.0 } else { 1.0 };
		self.wheel(self.width / 2.0, self.height / 2.0, delta);
	}

	/// Bring the whole graph back into view and resume following it.
	pub fn refit(&mut self) {
		self.follow = true;
		self.fit_view();
	}

	/// Add a manual node centered on the cursor when it is over empty canvas.
	pub fn double_click(&mut self, store: &mut GraphStore, sx: f64, sy: f64) -> Option<GraphNode> {
		if self.node_at_position(sx, sy).is_some() {
			return None;
		}
		let p = self.screen_to_graph(sx, sy);
		let corner = Position::new(p.x - NODE_WIDTH / 2.0, p.y - NODE_HEIGHT / 2.0);
		let corner = match self.snap_grid {
			Some(grid) => snap_to_grid(corner, grid),
			None => corner,
		};
		let manual = store.nodes().filter(|n| n.kind == NodeKind::Manual).count();
		let node = store.append_manual_node(format!("Note {}", manual + 1), corner);
		self.selection = Some(Selection::Node(node.id));
		self.refresh(store);
		Some(node)
	}

	/// Remove whatever is selected. Returns whether the store changed.
	pub fn delete_selection(&mut self, store: &mut GraphStore) -> bool {
		let Some(selection) = self.selection.take() else {
			return false;
		};
		let result = match selection {
			Selection::Node(id) => store.remove_node(id).map(|_| ()),
			Selection::Edge(id) => store.remove_edge(id).map(|_| ()),
		};
		if let Err(err) = result {
			debug!("nothing to delete: {err}");
			return false;
		}
		self.set_hover(None);
		self.refresh(store);
		true
	}

	pub fn set_hover(&mut self, node: Option<NodeId>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// keep the old highlight around so it can fade out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(id) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for edge in &self.view.edges {
				if edge.source == id {
					self.hover.neighbors.insert(edge.target);
				} else if edge.target == id {
					self.hover.neighbors.insert(edge.source);
				}
			}
		}
	}

	pub fn is_highlighted(&self, id: NodeId) -> bool {
		self.hover.node == Some(id)
			|| self.hover.neighbors.contains(&id)
			|| self.hover.prev_node == Some(id)
			|| self.hover.prev_neighbors.contains(&id)
	}

	pub fn is_hovered(&self, id: NodeId) -> bool {
		self.hover.node == Some(id) || self.hover.prev_node == Some(id)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	pub fn tick(&mut self, dt: f64) {
		self.flow_time += dt;

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		if self.follow {
			self.fit_view();
		}
	}

	fn cancel_gestures(&mut self) {
		self.drag = DragState::default();
		self.pan.active = false;
		self.connect.source = None;
	}
}

pub fn node_bounds(node: &GraphNode) -> Bounds {
	Bounds {
		min_x: node.position.x,
		min_y: node.position.y,
		max_x: node.position.x + NODE_WIDTH,
		max_y: node.position.y + NODE_HEIGHT,
	}
}

pub fn node_center(node: &GraphNode) -> Position {
	Position::new(
		node.position.x + NODE_WIDTH / 2.0,
		node.position.y + NODE_HEIGHT / 2.0,
	)
}

fn distance_to_segment(p: Position, a: Position, b: Position) -> f64 {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let len2 = dx * dx + dy * dy;
	let t = if len2 < f64::EPSILON {
		0.0
	} else {
		(((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
	};
	let (cx, cy) = (a.x + t * dx, a.y + t * dy);
	((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::EdgeKind;

	// identity transform so screen and graph coordinates coincide
	fn canvas(store: &GraphStore) -> CanvasState {
		let mut state = CanvasState::new(800.0, 600.0, Some(15.0));
		state.refresh(store);
		state.follow = false;
		state.transform = ViewTransform::default();
		state
	}

	fn chain(labels: &[&str]) -> GraphStore {
		let mut store = GraphStore::default();
		for label in labels {
			store.append_generated_node(*label);
		}
		store
	}

	fn id_at(store: &GraphStore, idx: usize) -> NodeId {
		store.nodes().nth(idx).unwrap().id
	}

	#[test]
	fn drag_moves_node_with_snapping() {
		let mut store = chain(&["a", "b"]);
		let a = id_at(&store, 0);
		let mut state = canvas(&store);

		state.pointer_down(10.0, 10.0, false);
		assert_eq!(state.drag.node, Some(a));
		state.pointer_move(&mut store, 33.0, 52.0);
		state.pointer_up(&mut store, 33.0, 52.0);

		assert_eq!(store.node(a).unwrap().position, Position::new(30.0, 45.0));
		assert_eq!(state.view().node(a).unwrap().position, Position::new(30.0, 45.0));
		assert_eq!(store.edge_count(), 1);
		assert!(state.drag.node.is_none());
	}

	#[test]
	fn pan_and_zoom_leave_store_alone() {
		let mut store = chain(&["a"]);
		let revision = store.revision();
		let mut state = canvas(&store);

		state.pointer_down(500.0, 500.0, false);
		assert!(state.pan.active);
		state.pointer_move(&mut store, 520.0, 470.0);
		state.pointer_up(&mut store, 520.0, 470.0);
		state.wheel(100.0, 100.0, -1.0);

		assert!((state.transform.x - 12.0).abs() < 1e-9);
		assert!(state.transform.k > 1.0);
		assert_eq!(store.revision(), revision);
	}

	#[test]
	fn connect_gesture_creates_manual_edge_once() {
		let mut store = chain(&["a", "b", "c"]);
		let (a, c) = (id_at(&store, 0), id_at(&store, 2));
		let mut state = canvas(&store);
		let c_center = node_center(store.node(c).unwrap());

		state.pointer_down(10.0, 10.0, true);
		state.pointer_move(&mut store, c_center.x, c_center.y);
		let edge = state.pointer_up(&mut store, c_center.x, c_center.y).unwrap();
		assert_eq!(edge.id, EdgeId::new(a, c));
		assert_eq!(edge.kind, EdgeKind::Manual);
		assert_eq!(store.edge_count(), 3);

		state.pointer_down(10.0, 10.0, true);
		assert!(state.pointer_up(&mut store, c_center.x, c_center.y).is_none());
		assert_eq!(store.edge_count(), 3);
	}

	#[test]
	fn connecting_to_empty_space_does_nothing() {
		let mut store = chain(&["a", "b"]);
		let mut state = canvas(&store);
		state.pointer_down(10.0, 10.0, true);
		assert!(state.pointer_up(&mut store, 10.0, 400.0).is_none());
		assert_eq!(store.manual_edge_count(), 0);
	}

	#[test]
	fn clicking_between_nodes_selects_chain_edge() {
		let mut store = chain(&["a", "b"]);
		let (a, b) = (id_at(&store, 0), id_at(&store, 1));
		let mut state = canvas(&store);

		// boxes span x 0..200 and 270..470, centers on y = 30
		state.pointer_down(235.0, 32.0, false);
		assert_eq!(state.selection, Some(Selection::Edge(EdgeId::new(a, b))));
		assert!(!state.pan.active);

		assert!(state.delete_selection(&mut store));
		assert_eq!(store.edge_count(), 0);
		assert_eq!(store.node_count(), 2);
		assert!(state.selection.is_none());
	}

	#[test]
	fn deleting_node_removes_its_edges() {
		let mut store = chain(&["a", "b", "c"]);
		let b = id_at(&store, 1);
		let mut state = canvas(&store);

		state.pointer_down(300.0, 30.0, false);
		state.pointer_up(&mut store, 300.0, 30.0);
		assert_eq!(state.selection, Some(Selection::Node(b)));
		assert!(state.delete_selection(&mut store));

		assert!(store.node(b).is_none());
		assert_eq!(store.edge_count(), 0);
		assert!(state.view().edges.is_empty());
		assert!(!state.delete_selection(&mut store));
	}

	#[test]
	fn reset_cancels_in_flight_drag() {
		let mut store = chain(&["a"]);
		let mut state = canvas(&store);
		state.pointer_down(10.0, 10.0, false);
		assert!(state.drag.node.is_some());

		store.reset();
		assert!(state.refresh(&store));
		assert!(state.drag.node.is_none());
		assert!(state.follow);
		state.pointer_move(&mut store, 100.0, 100.0);
		assert!(store.is_empty());
	}

	#[test]
	fn stale_drag_is_ignored() {
		let mut store = chain(&["a"]);
		let a = id_at(&store, 0);
		let mut state = canvas(&store);
		state.pointer_down(10.0, 10.0, false);

		// removed behind the canvas' back, view still holds it
		store.remove_node(a).unwrap();
		state.pointer_move(&mut store, 50.0, 50.0);
		assert!(state.drag.node.is_none());
		assert!(store.is_empty());
	}

	#[test]
	fn double_click_adds_manual_node_on_empty_canvas() {
		let mut store = chain(&["a"]);
		let mut state = canvas(&store);

		assert!(state.double_click(&mut store, 50.0, 30.0).is_none());
		let node = state.double_click(&mut store, 400.0, 300.0).unwrap();
		assert_eq!(node.kind, NodeKind::Manual);
		assert_eq!(node.label, "Note 1");
		assert_eq!(node.position, Position::new(300.0, 270.0));
		assert_eq!(store.edge_count(), 0);
		assert_eq!(state.selection, Some(Selection::Node(node.id)));
	}

	#[test]
	fn hover_collects_neighbors() {
		let store = chain(&["a", "b", "c"]);
		let (a, b, c) = (id_at(&store, 0), id_at(&store, 1), id_at(&store, 2));
		let mut state = canvas(&store);

		state.set_hover(Some(b));
		assert!(state.is_highlighted(a));
		assert!(state.is_highlighted(c));
		assert!(state.is_hovered(b));

		state.set_hover(None);
		assert_eq!(state.hover.prev_node, Some(b));
		for _ in 0..600 {
			state.tick(0.016);
		}
		assert!(!state.has_active_highlight());
	}

	#[test]
	fn follow_keeps_growing_graph_in_view() {
		let mut store = GraphStore::default();
		let mut state = CanvasState::new(800.0, 600.0, None);
		for i in 0..12 {
			store.append_generated_node(format!("step {i}"));
			state.refresh(&store);
		}
		for node in &state.view().nodes {
			let (x, y) = state.transform.graph_to_screen(node.position);
			assert!(x >= 0.0 && x + NODE_WIDTH * state.transform.k <= 800.0);
			assert!(y >= 0.0 && y <= 600.0);
		}
	}

	#[test]
	fn refresh_is_lazy() {
		let mut store = chain(&["a"]);
		let mut state = canvas(&store);
		assert!(!state.refresh(&store));
		store.append_generated_node("b");
		assert!(state.refresh(&store));
	}

	#[test]
	fn refit_recovers_view_after_pan() {
		let mut store = chain(&["a", "b", "c"]);
		let mut state = CanvasState::new(800.0, 600.0, None);
		state.refresh(&store);
		let fitted = state.transform;

		state.pointer_down(790.0, 590.0, false);
		state.pointer_move(&mut store, 2000.0, 2000.0);
		state.pointer_up(&mut store, 2000.0, 2000.0);
		assert!(!state.follow);
		assert_ne!(state.transform, fitted);

		state.refit();
		assert!(state.follow);
		assert_eq!(state.transform, fitted);

		// following resumes for nodes that arrive afterwards
		store.append_generated_node("d");
		state.refresh(&store);
		let last = state.view().nodes.last().unwrap();
		let (x, _) = state.transform.graph_to_screen(last.position);
		assert!(x + NODE_WIDTH * state.transform.k <= 800.0);
	}

	#[test]
	fn zoom_steps_pivot_on_viewport_center() {
		let store = chain(&["a"]);
		let mut state = canvas(&store);
		let center = state.screen_to_graph(400.0, 300.0);

		state.zoom_step(true);
		assert!(state.transform.k > 1.0);
		state.zoom_step(false);
		state.zoom_step(false);
		assert!(state.transform.k < 1.0);

		let after = state.screen_to_graph(400.0, 300.0);
		assert!((center.x - after.x).abs() < 1e-9);
		assert!((center.y - after.y).abs() < 1e-9);
		assert!(!state.follow);
	}
}
