use thiserror::Error;

use super::types::{EdgeId, NodeId};

/// Result type for store mutations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by store mutations that reference the graph.
///
/// None of these are fatal: callers drop the offending gesture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
	/// No node with this id exists in the current session.
	#[error("node {0} not found")]
	NodeNotFound(NodeId),

	/// No edge with this id exists in the current session.
	#[error("edge {0} not found")]
	EdgeNotFound(EdgeId),

	/// An edge with the same source and target already exists.
	#[error("edge {0} already exists")]
	DuplicateEdge(EdgeId),
}

impl GraphError {
	/// Whether this is a lookup failure on a stale or unknown id.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NodeNotFound(_) | Self::EdgeNotFound(_))
	}
}
