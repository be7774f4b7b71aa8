//! Screen/graph coordinate mapping for the canvas.

use crate::graph::Position;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 10.0;
/// Largest scale used when fitting the graph to the viewport.
pub const FIT_MAX_SCALE: f64 = 1.0;
pub const FIT_PADDING: f64 = 40.0;

/// Affine view transform: `screen = graph * k + (x, y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Position {
		Position::new((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	pub fn graph_to_screen(&self, p: Position) -> (f64, f64) {
		(p.x * self.k + self.x, p.y * self.k + self.y)
	}

	/// Zoom by one wheel notch keeping the graph point under `(sx, sy)` fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.k * factor).clamp(MIN_SCALE, MAX_SCALE);
		let ratio = new_k / self.k;
		self.x = sx - (sx - self.x) * ratio;
		self.y = sy - (sy - self.y) * ratio;
		self.k = new_k;
	}

	/// Transform centering `bounds` in a `width` x `height` viewport.
	pub fn fit(bounds: Bounds, width: f64, height: f64) -> Self {
		let (bw, bh) = (bounds.width().max(1.0), bounds.height().max(1.0));
		let avail_w = (width - 2.0 * FIT_PADDING).max(1.0);
		let avail_h = (height - 2.0 * FIT_PADDING).max(1.0);
		let k = (avail_w / bw)
			.min(avail_h / bh)
			.clamp(MIN_SCALE, FIT_MAX_SCALE);
		let (cx, cy) = bounds.center();
		Self {
			x: width / 2.0 - cx * k,
			y: height / 2.0 - cy * k,
			k,
		}
	}
}

/// Axis-aligned rectangle in graph space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl Bounds {
	pub fn width(&self) -> f64 {
		self.max_x - self.min_x
	}

	pub fn height(&self) -> f64 {
		self.max_y - self.min_y
	}

	pub fn center(&self) -> (f64, f64) {
		(
			(self.min_x + self.max_x) / 2.0,
			(self.min_y + self.max_y) / 2.0,
		)
	}

	/// Smallest rectangle covering every `(top_left, size)` box.
	pub fn enclosing(boxes: impl IntoIterator<Item = (Position, (f64, f64))>) -> Option<Self> {
		boxes.into_iter().fold(None, |acc, (p, (w, h))| {
			let b = Bounds {
				min_x: p.x,
				min_y: p.y,
				max_x: p.x + w,
				max_y: p.y + h,
			};
			Some(match acc {
				None => b,
				Some(a) => Bounds {
					min_x: a.min_x.min(b.min_x),
					min_y: a.min_y.min(b.min_y),
					max_x: a.max_x.max(b.max_x),
					max_y: a.max_y.max(b.max_y),
				},
			})
		})
	}

	pub fn contains(&self, p: Position) -> bool {
		p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn screen_graph_roundtrip() {
		let t = ViewTransform {
			x: 30.0,
			y: -10.0,
			k: 2.0,
		};
		let p = t.screen_to_graph(130.0, 90.0);
		assert_eq!(p, Position::new(50.0, 50.0));
		assert_eq!(t.graph_to_screen(p), (130.0, 90.0));
	}

	#[test]
	fn zoom_keeps_cursor_point_fixed() {
		let mut t = ViewTransform::default();
		let before = t.screen_to_graph(200.0, 100.0);
		t.zoom_at(200.0, 100.0, -1.0);
		let after = t.screen_to_graph(200.0, 100.0);
		assert!((before.x - after.x).abs() < 1e-9);
		assert!((before.y - after.y).abs() < 1e-9);
		assert!(t.k > 1.0);
	}

	#[test]
	fn zoom_is_clamped() {
		let mut t = ViewTransform::default();
		for _ in 0..200 {
			t.zoom_at(0.0, 0.0, 1.0);
		}
		assert_eq!(t.k, MIN_SCALE);
		for _ in 0..200 {
			t.zoom_at(0.0, 0.0, -1.0);
		}
		assert_eq!(t.k, MAX_SCALE);
	}

	#[test]
	fn fit_centers_bounds_without_magnifying() {
		let bounds = Bounds {
			min_x: 0.0,
			min_y: 0.0,
			max_x: 200.0,
			max_y: 60.0,
		};
		let t = ViewTransform::fit(bounds, 800.0, 600.0);
		assert_eq!(t.k, FIT_MAX_SCALE);
		assert_eq!(t.graph_to_screen(Position::new(100.0, 30.0)), (400.0, 300.0));
	}

	#[test]
	fn fit_shrinks_wide_graphs() {
		let bounds = Bounds {
			min_x: 0.0,
			min_y: 0.0,
			max_x: 4000.0,
			max_y: 60.0,
		};
		let t = ViewTransform::fit(bounds, 800.0, 600.0);
		assert!(t.k < 1.0);
		let (left, _) = t.graph_to_screen(Position::new(0.0, 0.0));
		let (right, _) = t.graph_to_screen(Position::new(4000.0, 0.0));
		assert!(left >= FIT_PADDING - 1e-9);
		assert!(right <= 800.0 - FIT_PADDING + 1e-9);
	}

	#[test]
	fn enclosing_covers_all_boxes() {
		let b = Bounds::enclosing([
			(Position::new(0.0, 0.0), (10.0, 10.0)),
			(Position::new(-5.0, 20.0), (10.0, 10.0)),
		])
		.unwrap();
		assert_eq!(
			b,
			Bounds {
				min_x: -5.0,
				min_y: 0.0,
				max_x: 10.0,
				max_y: 30.0,
			}
		);
		assert!(Bounds::enclosing(Vec::<(Position, (f64, f64))>::new()).is_none());
	}
}
