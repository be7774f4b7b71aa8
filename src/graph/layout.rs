//! Deterministic placement of generated nodes.

use super::types::Position;

/// Width reserved for one node lane.
pub const DEFAULT_LANE_WIDTH: f64 = 220.0;
/// Horizontal gap between two lanes.
pub const DEFAULT_LANE_GAP: f64 = 50.0;

/// Lane geometry used to place generated nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
	/// Horizontal space reserved for one node.
	pub lane_width: f64,
	/// Space between two lanes.
	pub lane_gap: f64,
}

impl Default for LayoutParams {
	fn default() -> Self {
		Self {
			lane_width: DEFAULT_LANE_WIDTH,
			lane_gap: DEFAULT_LANE_GAP,
		}
	}
}

impl LayoutParams {
	/// Position of the generated node with the given ordinal.
	pub fn position_for(&self, ordinal: usize) -> Position {
		position_for(ordinal, self.lane_width, self.lane_gap)
	}
}

/// Left-to-right placement: one lane per ordinal, all on `y = 0`.
pub fn position_for(ordinal: usize, lane_width: f64, lane_gap: f64) -> Position {
	Position::new(ordinal as f64 * (lane_width + lane_gap), 0.0)
}

/// Round a position to the nearest point of a square grid.
///
/// Non-positive or non-finite grid sizes leave the position untouched.
pub fn snap_to_grid(position: Position, grid: f64) -> Position {
	if !grid.is_finite() || grid <= 0.0 {
		return position;
	}
	Position::new(
		(position.x / grid).round() * grid,
		(position.y / grid).round() * grid,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lanes_advance_by_width_plus_gap() {
		assert_eq!(position_for(0, 220.0, 50.0), Position::new(0.0, 0.0));
		assert_eq!(position_for(1, 220.0, 50.0), Position::new(270.0, 0.0));
		assert_eq!(position_for(4, 100.0, 0.0), Position::new(400.0, 0.0));
	}

	#[test]
	fn default_params_match_free_function() {
		let params = LayoutParams::default();
		for i in 0..8 {
			assert_eq!(
				params.position_for(i),
				position_for(i, DEFAULT_LANE_WIDTH, DEFAULT_LANE_GAP)
			);
		}
	}

	#[test]
	fn snapping_rounds_to_nearest_cell() {
		let snapped = snap_to_grid(Position::new(22.0, -8.0), 15.0);
		assert_eq!(snapped, Position::new(15.0, -15.0));
		let snapped = snap_to_grid(Position::new(23.0, 7.0), 15.0);
		assert_eq!(snapped, Position::new(30.0, 0.0));
	}

	#[test]
	fn degenerate_grid_is_identity() {
		let p = Position::new(3.3, 4.4);
		assert_eq!(snap_to_grid(p, 0.0), p);
		assert_eq!(snap_to_grid(p, f64::NAN), p);
	}
}
