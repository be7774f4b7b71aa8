use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::channel::SocketConnector;
use crate::components::step_graph::{GraphStats, StepGraphCanvas};
use crate::config::ClientConfig;
use crate::coordinator::{
	AnalysisCoordinator, AnalysisReport, ConnectionStatus, HttpBackend, RequestError, SharedStore,
};
use crate::graph::GraphStore;

type Coordinator = AnalysisCoordinator<HttpBackend, SocketConnector>;

const DEFAULT_TICKER: &str = "AAPL";
const DEFAULT_START: &str = "2025-01-01";
const DEFAULT_END: &str = "2025-01-10";

/// Analysis form above a live step graph.
#[component]
pub fn Home() -> impl IntoView {
	let config = ClientConfig::from_env();
	let store: SharedStore = Rc::new(RefCell::new(GraphStore::new(config.layout)));
	let coordinator = Rc::new(
		AnalysisCoordinator::new(
			store.clone(),
			HttpBackend::new(config.api_url.clone()),
			SocketConnector,
			config.socket_url.clone(),
		)
		.with_handshake_timeout(config.handshake_timeout_ms),
	);

	let (status, set_status) = signal(ConnectionStatus::Idle);
	coordinator.on_status(move |s| {
		let _ = set_status.try_set(s);
	});
	// Dropped with the page, which closes the channel.
	let coordinator: StoredValue<Rc<Coordinator>, LocalStorage> =
		StoredValue::new_local(coordinator);
	let store = StoredValue::new_local(store);
	let snap_grid = config.snap_grid;

	let (ticker, set_ticker) = signal(DEFAULT_TICKER.to_owned());
	let (start_date, set_start_date) = signal(DEFAULT_START.to_owned());
	let (end_date, set_end_date) = signal(DEFAULT_END.to_owned());
	let (notice, set_notice) = signal(None::<String>);
	let (report, set_report) = signal(None::<AnalysisReport>);
	let (running, set_running) = signal(false);
	let (stats, set_stats) = signal(GraphStats::default());

	let on_submit = move |ev: leptos::ev::SubmitEvent| {
		ev.prevent_default();
		let coordinator = coordinator.get_value();
		let (t, s, e) = (
			ticker.get_untracked(),
			start_date.get_untracked(),
			end_date.get_untracked(),
		);
		set_notice.set(None);
		set_report.set(None);
		set_running.set(true);
		spawn_local(async move {
			let outcome = coordinator.start_analysis(&t, &s, &e).await;
			match outcome {
				Ok(r) => {
					let _ = set_report.try_set(r);
				}
				// A newer submission owns the page now.
				Err(RequestError::Superseded) => return,
				Err(err) => {
					let _ = set_notice.try_set(Some(err.to_string()));
				}
			}
			let _ = set_running.try_set(false);
		});
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<StepGraphCanvas
					store=store.get_value()
					snap_grid=snap_grid
					on_change=Callback::new(move |s| set_stats.set(s))
				/>
				<div class="graph-overlay">
					<h1>"Step Graph"</h1>
					<form class="analysis-form" on:submit=on_submit>
						<input
							type="text"
							placeholder="Ticker"
							prop:value=ticker
							on:input=move |ev| set_ticker.set(event_target_value(&ev).to_uppercase())
						/>
						<input
							type="date"
							prop:value=start_date
							on:input=move |ev| set_start_date.set(event_target_value(&ev))
						/>
						<input
							type="date"
							prop:value=end_date
							on:input=move |ev| set_end_date.set(event_target_value(&ev))
						/>
						<button type="submit">
							{move || if running.get() { "Analyzing..." } else { "Analyze" }}
						</button>
					</form>
					<p class="status">
						<span class=move || format!("badge badge-{}", status.get().label())>
							{move || status.get().label()}
						</span>
						{move || {
							let s = stats.get();
							format!(" {} steps, {} edges", s.nodes, s.edges)
						}}
					</p>
					{move || notice.get().map(|n| view! { <p class="notice">{n}</p> })}
					{move || report.get().map(|r| view! { <ReportPanel report=r /> })}
					<p class="subtitle">
						"Drag nodes to reposition. Shift-drag between nodes to connect. "
						"Double-click to add a note. Delete removes the selection. F refits the view."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}

/// Summary returned with a successful trigger.
#[component]
fn ReportPanel(report: AnalysisReport) -> impl IntoView {
	let rows = report
		.summary
		.into_iter()
		.map(|(key, value)| {
			view! {
				<tr>
					<td>{key}</td>
					<td>{format!("{value:.2}")}</td>
				</tr>
			}
		})
		.collect_view();

	view! {
		<div class="report">
			<h2>{report.ticker}</h2>
			<table>{rows}</table>
			{report.ai_analysis.map(|text| view! { <p class="ai-analysis">{text}</p> })}
		</div>
	}
}
