use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::{CanvasState, NODE_HEIGHT, NODE_WIDTH, Selection, node_center};
use crate::graph::{EdgeKind, GraphNode, NodeKind, Position};

const BACKGROUND: &str = "#1a1a2e";
const GENERATED_BORDER: &str = "#0070f3";
const MANUAL_BORDER: &str = "#ff7f0e";
const SELECTED_BORDER: &str = "#ffd166";
const CORNER_RADIUS: f64 = 8.0;
const LABEL_PADDING: f64 = 10.0;
const LABEL_FONT_PX: f64 = 13.0;
const MAX_LABEL_LINES: usize = 3;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

pub fn render(state: &CanvasState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_pending_connection(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_edges(state: &CanvasState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);
	let t = ease_out_cubic(state.hover.highlight_t);

	for edge in &state.view().edges {
		let Some((from, to)) = state.edge_endpoints(edge) else {
			continue;
		};
		let start = box_anchor(from, to, NODE_WIDTH / 2.0, NODE_HEIGHT / 2.0);
		let tip = box_anchor(to, from, NODE_WIDTH / 2.0, NODE_HEIGHT / 2.0);
		let (dx, dy) = (tip.x - start.x, tip.y - start.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		let selected = state.selection == Some(Selection::Edge(edge.id));
		let highlighted =
			state.is_highlighted(edge.source) && state.is_highlighted(edge.target);
		let (edge_alpha, arrow_alpha, width) = if selected {
			(1.0, 1.0, line_width * 2.0)
		} else if highlighted {
			(0.6 + 0.3 * t, 0.8 + 0.1 * t, line_width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, 0.8 - 0.45 * t, line_width * (1.0 - 0.3 * t))
		};
		let rgb = match edge.kind {
			EdgeKind::Chain => "100, 180, 255",
			EdgeKind::Manual => "255, 170, 90",
		};

		ctx.set_stroke_style_str(&format!("rgba({rgb}, {edge_alpha})"));
		ctx.set_line_width(width);
		if edge.animated {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(dash),
				&JsValue::from_f64(gap),
			));
			ctx.set_line_dash_offset(dash_offset);
		} else {
			let _ = ctx.set_line_dash(&js_sys::Array::new());
		}

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(start.x, start.y);
		ctx.line_to(tip.x - ux * arrow_size, tip.y - uy * arrow_size);
		ctx.stroke();

		let _ = ctx.set_line_dash(&js_sys::Array::new());
		ctx.set_fill_style_str(&format!("rgba({rgb}, {arrow_alpha})"));
		let (back_x, back_y) = (tip.x - ux * arrow_size, tip.y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip.x, tip.y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_pending_connection(state: &CanvasState, ctx: &CanvasRenderingContext2d) {
	let Some(source) = state.connect.source.and_then(|id| state.view().node(id)) else {
		return;
	};
	let k = state.transform.k;
	let cursor = state.connect.cursor;
	let start = box_anchor(node_center(source), cursor, NODE_WIDTH / 2.0, NODE_HEIGHT / 2.0);
	ctx.set_stroke_style_str("rgba(255, 170, 90, 0.9)");
	ctx.set_line_width(1.5 / k);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(4.0 / k),
		&JsValue::from_f64(4.0 / k),
	));
	ctx.begin_path();
	ctx.move_to(start.x, start.y);
	ctx.line_to(cursor.x, cursor.y);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(state: &CanvasState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
	);

	for node in &state.view().nodes {
		let highlighted = has_highlight && state.is_highlighted(node.id);
		let alpha = if has_highlight && !highlighted {
			1.0 - 0.6 * t
		} else {
			1.0
		};
		let selected = state.selection == Some(Selection::Node(node.id));

		if state.is_hovered(node.id) && t > 0.01 {
			draw_glow(ctx, node, t);
		}

		ctx.set_global_alpha(alpha);
		rounded_rect(ctx, node.position, NODE_WIDTH, NODE_HEIGHT, CORNER_RADIUS);
		ctx.set_fill_style_str("white");
		ctx.fill();
		let border = if selected {
			SELECTED_BORDER
		} else {
			match node.kind {
				NodeKind::Generated => GENERATED_BORDER,
				NodeKind::Manual => MANUAL_BORDER,
			}
		};
		ctx.set_stroke_style_str(border);
		ctx.set_line_width(if selected { 3.0 } else { 2.0 });
		ctx.stroke();

		draw_label(ctx, node);
		ctx.set_global_alpha(1.0);
	}
}

fn draw_glow(ctx: &CanvasRenderingContext2d, node: &GraphNode, t: f64) {
	let spread = 10.0 * t;
	rounded_rect(
		ctx,
		Position::new(node.position.x - spread, node.position.y - spread),
		NODE_WIDTH + 2.0 * spread,
		NODE_HEIGHT + 2.0 * spread,
		CORNER_RADIUS + spread,
	);
	ctx.set_fill_style_str(&format!("rgba(200, 220, 255, {})", 0.25 * t));
	ctx.fill();
}

fn draw_label(ctx: &CanvasRenderingContext2d, node: &GraphNode) {
	let font_px = LABEL_FONT_PX;
	ctx.set_font(&format!("{font_px}px sans-serif"));
	ctx.set_fill_style_str("#111");
	let max_width = NODE_WIDTH - 2.0 * LABEL_PADDING;
	let lines = wrap_words(&node.label, max_width, MAX_LABEL_LINES, |s| {
		ctx.measure_text(s).map(|m| m.width()).unwrap_or(0.0)
	});
	let line_height = font_px * 1.25;
	let top = node.position.y + (NODE_HEIGHT - line_height * lines.len() as f64) / 2.0;
	for (i, line) in lines.iter().enumerate() {
		let _ = ctx.fill_text(
			line,
			node.position.x + LABEL_PADDING,
			top + line_height * (i as f64 + 0.8),
		);
	}
}

fn rounded_rect(ctx: &CanvasRenderingContext2d, p: Position, w: f64, h: f64, r: f64) {
	let r = r.min(w / 2.0).min(h / 2.0);
	ctx.begin_path();
	ctx.move_to(p.x + r, p.y);
	let _ = ctx.arc_to(p.x + w, p.y, p.x + w, p.y + h, r);
	let _ = ctx.arc_to(p.x + w, p.y + h, p.x, p.y + h, r);
	let _ = ctx.arc_to(p.x, p.y + h, p.x, p.y, r);
	let _ = ctx.arc_to(p.x, p.y, p.x + w, p.y, r);
	ctx.close_path();
}

/// Point where the ray from `center` towards `toward` leaves a box with the
/// given half extents.
pub fn box_anchor(center: Position, toward: Position, half_w: f64, half_h: f64) -> Position {
	let (dx, dy) = (toward.x - center.x, toward.y - center.y);
	if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
		return center;
	}
	let tx = if dx.abs() < f64::EPSILON {
		f64::INFINITY
	} else {
		half_w / dx.abs()
	};
	let ty = if dy.abs() < f64::EPSILON {
		f64::INFINITY
	} else {
		half_h / dy.abs()
	};
	let t = tx.min(ty).min(1.0);
	Position::new(center.x + dx * t, center.y + dy * t)
}

/// Greedy word wrap into at most `max_lines` lines, eliding the overflow.
pub fn wrap_words(
	text: &str,
	max_width: f64,
	max_lines: usize,
	measure: impl Fn(&str) -> f64,
) -> Vec<String> {
	let mut lines: Vec<String> = Vec::new();
	let mut current = String::new();
	for word in text.split_whitespace() {
		let candidate = if current.is_empty() {
			word.to_owned()
		} else {
			format!("{current} {word}")
		};
		if measure(&candidate) <= max_width || current.is_empty() {
			current = candidate;
			continue;
		}
		lines.push(std::mem::take(&mut current));
		current = word.to_owned();
		if lines.len() == max_lines {
			current.clear();
			if let Some(last) = lines.last_mut() {
				last.push('…');
			}
			return lines;
		}
	}
	if !current.is_empty() {
		lines.push(current);
	}
	lines
}
