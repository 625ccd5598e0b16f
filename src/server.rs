//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! routes:
//!     GET /                -> dashboard page (redraws itself from /api/dashboard)
//!     GET /api/dashboard   -> current DashboardView as json
//!     GET /api/history     -> retained readings, oldest first
//!
//! the poll loop is the only writer of AppState; handlers only read.
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::domain::Reading;
use crate::render::DashboardView;

/// What the poll loop publishes for the web server.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AppState {
    pub view: DashboardView,
    pub history: Vec<Reading>,
}

pub type SharedState = Arc<RwLock<AppState>>;

#[derive(Clone)]
struct ServerState {
    shared: SharedState,
    page: Arc<String>,
}

pub fn router(shared: SharedState, refresh: Duration) -> Router {
    let page = DASHBOARD_HTML.replace("__REFRESH_MS__", &refresh.as_millis().to_string());

    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/dashboard", get(view_handler))
        .route("/api/history", get(history_handler))
        .layer(CorsLayer::permissive())
        .with_state(ServerState { shared, page: Arc::new(page) })
}

/// Bind the dashboard address. Done before the poll loop starts so a
/// taken port stops the process instead of leaving it headless.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard on {}", addr))
}

pub async fn serve(listener: TcpListener, shared: SharedState, refresh: Duration) -> Result<()> {
    axum::serve(listener, router(shared, refresh)).await?;
    Ok(())
}

async fn dashboard_handler(State(state): State<ServerState>) -> Html<String> {
    Html(state.page.as_str().to_owned())
}

async fn view_handler(State(state): State<ServerState>) -> Json<DashboardView> {
    let guard = state.shared.read().await;
    Json(guard.view.clone())
}

async fn history_handler(State(state): State<ServerState>) -> Json<Vec<Reading>> {
    let guard = state.shared.read().await;
    Json(guard.history.clone())
}

/// Dashboard page. The chart library is loaded by the browser.
const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Smart IoT Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/chartjs-adapter-date-fns@3.0.0/dist/chartjs-adapter-date-fns.bundle.min.js"></script>
    <style>
        body { font-family: system-ui; margin: 0; padding: 1rem 2rem; background: #1a1a2e; color: #eee; }
        .caption { color: #888; margin-top: -0.5rem; }
        .banner { padding: 0.75rem 1rem; border-radius: 8px; margin: 1rem 0; }
        .ok { background: #1e4d2b; }
        .warn { background: #5c1f1f; }
        .hidden { display: none; }
        .metrics { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; }
        .metric { background: #16213e; border-radius: 8px; padding: 1rem; }
        .metric h3 { margin: 0; font-size: 0.9rem; color: #aaa; }
        .metric .value { font-size: 1.8rem; font-weight: bold; }
        .metric .delta { color: #7fd1ff; }
        .charts { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; margin-top: 1rem; }
        .chart { background: #16213e; border-radius: 8px; padding: 1rem; height: 320px; }
    </style>
</head>
<body>
    <h1>⚡ Real-time Smart Dashboard</h1>
    <p class="caption">The dashboard only updates when the source data changes</p>

    <div id="source" class="banner warn hidden"></div>
    <div id="banner" class="banner ok hidden"></div>

    <div class="metrics">
        <div class="metric"><h3>🌡️ Temperature</h3><div class="value" id="temperature">-</div></div>
        <div class="metric"><h3>🌧️ Rain</h3><div class="value" id="rain">-</div><div class="delta" id="rain-label"></div></div>
        <div class="metric"><h3>💡 Light</h3><div class="value" id="light">-</div></div>
        <div class="metric"><h3>🚪 Door</h3><div class="value" id="door">-</div></div>
    </div>

    <div class="charts">
        <div class="chart"><canvas id="temperature-chart"></canvas></div>
        <div class="chart"><canvas id="light-chart"></canvas></div>
    </div>

<script>
const REFRESH_MS = __REFRESH_MS__;
let lastReading = null;

function chart(id, title, fill) {
    return new Chart(document.getElementById(id), {
        type: 'line',
        data: { datasets: [{ label: title, data: [], fill: fill, pointRadius: fill ? 0 : 3 }] },
        options: {
            animation: false,
            maintainAspectRatio: false,
            plugins: { title: { display: true, text: title } },
            scales: { x: { type: 'time', time: { unit: 'second' } } }
        }
    });
}

const temperatureChart = chart('temperature-chart', 'Last readings: Temperature', false);
const lightChart = chart('light-chart', 'Last readings: Light', true);

function plot(c, series) {
    c.data.datasets[0].data = series.map(p => ({ x: p.time, y: p.value }));
    c.update();
}

function show(id, text) {
    const el = document.getElementById(id);
    el.textContent = text || '';
    el.classList.toggle('hidden', !text);
}

async function refresh() {
    try {
        const view = await (await fetch('/api/dashboard')).json();
        show('source', view.source_banner);
        if (view.status !== 'live' || view.reading.timestamp === lastReading) return;
        lastReading = view.reading.timestamp;

        show('banner', view.banner);
        document.getElementById('temperature').textContent = view.metrics.temperature;
        document.getElementById('rain').textContent = view.metrics.rain_value;
        document.getElementById('rain-label').textContent = view.metrics.rain_label;
        document.getElementById('light').textContent = view.metrics.light_value;
        document.getElementById('door').textContent = view.metrics.door_label;
        plot(temperatureChart, view.charts.temperature);
        plot(lightChart, view.charts.light);
    } catch (e) {
        console.warn('dashboard refresh failed', e);
    }
}

refresh();
setInterval(refresh, REFRESH_MS);
</script>
</body>
</html>"#;
