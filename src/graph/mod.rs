//! Event-derived step graph: plain data, no rendering concerns.

mod error;
/// Lane placement and grid snapping.
pub mod layout;
mod store;
mod types;

pub use error::{GraphError, GraphResult};
pub use layout::{LayoutParams, position_for, snap_to_grid};
pub use store::GraphStore;
pub use types::{
	EdgeId, EdgeKind, GraphEdge, GraphNode, GraphSnapshot, NodeId, NodeKind, Position, SessionId,
	StepEvent,
};
