use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent, Window,
};

use super::render;
use super::state::CanvasState;
use crate::coordinator::SharedStore;

/// Counts reported to the page whenever the drawn graph changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
	pub nodes: usize,
	pub edges: usize,
}

#[component]
pub fn StepGraphCanvas(
	store: SharedStore,
	#[prop(default = None)] snap_grid: Option<f64>,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(optional)] on_change: Option<Callback<GraphStats>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: Rc<RefCell<Option<CanvasState>>> = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (state_init, animate_init, resize_cb_init, store_init) =
		(state.clone(), animate.clone(), resize_cb.clone(), store.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let window: Window = web_sys::window().unwrap();

		let (w, h) = canvas_size(&canvas, width, height);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.unwrap()
			.unwrap()
			.dyn_into()
			.unwrap();
		*state_init.borrow_mut() = Some(CanvasState::new(w, h, snap_grid));

		if width.is_none() || height.is_none() {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let (nw, nh) = canvas_size(&canvas_resize, width, height);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner, store_anim) =
			(state_init.clone(), animate_init.clone(), store_init.clone());
		let mut reported: Option<GraphStats> = None;
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let mut changed = None;
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				let store = store_anim.borrow();
				s.refresh(&store);
				// gestures refresh on their own, so compare counts rather than
				// trusting this frame's refresh
				let stats = GraphStats {
					nodes: store.node_count(),
					edges: store.edge_count(),
				};
				if reported != Some(stats) {
					reported = Some(stats);
					changed = Some(stats);
				}
				s.tick(0.016);
				render::render(s, &ctx);
			}
			if let (Some(stats), Some(cb)) = (changed, on_change) {
				cb.run(stats);
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				let _ = web_sys::window()
					.unwrap()
					.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let canvas_point = move |ev: &MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		(
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		)
	};

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let (x, y) = canvas_point(&ev);
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.pointer_down(x, y, ev.shift_key());
		}
	};

	let (state_mm, store_mm) = (state.clone(), store.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let (x, y) = canvas_point(&ev);
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			s.pointer_move(&mut store_mm.borrow_mut(), x, y);
		}
	};

	let (state_mu, store_mu) = (state.clone(), store.clone());
	let on_mouseup = move |ev: MouseEvent| {
		let (x, y) = canvas_point(&ev);
		if let Some(ref mut s) = *state_mu.borrow_mut() {
			if let Some(edge) = s.pointer_up(&mut store_mu.borrow_mut(), x, y) {
				log::info!("connected {} -> {}", edge.source, edge.target);
			}
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.pointer_leave();
		}
	};

	let (state_dc, store_dc) = (state.clone(), store.clone());
	let on_dblclick = move |ev: MouseEvent| {
		let (x, y) = canvas_point(&ev);
		if let Some(ref mut s) = *state_dc.borrow_mut() {
			s.double_click(&mut store_dc.borrow_mut(), x, y);
		}
	};

	let (state_kd, store_kd) = (state.clone(), store.clone());
	let on_keydown = move |ev: KeyboardEvent| {
		let Some(ref mut s) = *state_kd.borrow_mut() else {
			return;
		};
		let handled = match ev.key().as_str() {
			"Delete" | "Backspace" => s.delete_selection(&mut store_kd.borrow_mut()),
			"f" | "F" => {
				s.refit();
				true
			}
			"+" | "=" => {
				s.zoom_step(true);
				true
			}
			"-" | "_" => {
				s.zoom_step(false);
				true
			}
			_ => false,
		};
		if handled {
			ev.prevent_default();
		}
	};

	let state_vc = state.clone();
	let view_control = move |action: fn(&mut CanvasState)| {
		let state = state_vc.clone();
		move |_: MouseEvent| {
			if let Some(ref mut s) = *state.borrow_mut() {
				action(s);
			}
		}
	};
	let on_zoom_in = view_control(|s| s.zoom_step(true));
	let on_zoom_out = view_control(|s| s.zoom_step(false));
	let on_fit = view_control(CanvasState::refit);

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.wheel(x, y, ev.delta_y());
		}
	};

	view! {
		<div class="step-graph" style="position: relative; width: 100%; height: 100%;">
			<canvas
				node_ref=canvas_ref
				class="step-graph-canvas"
				tabindex="0"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:dblclick=on_dblclick
				on:keydown=on_keydown
				on:wheel=on_wheel
				style="display: block; cursor: grab; outline: none;"
			/>
			<div class="graph-controls">
				<button type="button" title="Zoom in" on:click=on_zoom_in>"+"</button>
				<button type="button" title="Zoom out" on:click=on_zoom_out>"-"</button>
				<button type="button" title="Fit view (F)" on:click=on_fit>"Fit"</button>
			</div>
		</div>
	}
}

fn canvas_size(canvas: &HtmlCanvasElement, width: Option<f64>, height: Option<f64>) -> (f64, f64) {
	let parent = canvas.parent_element();
	(
		width.unwrap_or_else(|| {
			parent
				.as_ref()
				.map(|p| p.client_width() as f64)
				.unwrap_or(800.0)
		}),
		height.unwrap_or_else(|| {
			parent
				.as_ref()
				.map(|p| p.client_height() as f64)
				.unwrap_or(600.0)
		}),
	)
}
