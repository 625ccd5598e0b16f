//! ==============================================================================
//! render.rs - dashboard view model
//! ==============================================================================
//!
//! purpose:
//!     turns the latest reading plus history into everything the page shows:
//!     four metric tiles, the "new data" banner, an optional source warning,
//!     and the two chart series. the page itself only draws what is here.
//!
//! relationships:
//!     - built by: poller.rs (on new data or source health change)
//!     - served by: server.rs (/api/dashboard)
//!
//! ==============================================================================

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::domain::{RainStatus, Reading};
use crate::history::{History, SeriesPoint};

/// Health of the remote source as seen by the poll loop.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SourceStatus {
    Reachable,
    Unreachable { failures: u32, last_error: String },
}

impl SourceStatus {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SourceStatus::Unreachable { .. })
    }

    pub fn banner(&self) -> Option<String> {
        match self {
            SourceStatus::Reachable => None,
            SourceStatus::Unreachable { failures, last_error } => Some(format!(
                "Source unreachable ({} failed polls in a row): {}",
                failures, last_error
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub temperature: String,
    pub rain_value: i64,
    pub rain_status: RainStatus,
    pub rain_label: &'static str,
    pub light_value: i64,
    pub door_label: &'static str,
}

impl Metrics {
    pub fn from_reading(reading: &Reading, rain_wet_threshold: i64) -> Self {
        let rain_status = RainStatus::classify(reading.rain_value, rain_wet_threshold);
        Self {
            temperature: format!("{} °C", reading.temperature),
            rain_value: reading.rain_value,
            rain_status,
            rain_label: rain_status.label(),
            light_value: reading.light_value,
            door_label: reading.door.label(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Charts {
    pub temperature: Vec<SeriesPoint>,
    pub light: Vec<SeriesPoint>,
}

/// Everything the dashboard page renders.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DashboardView {
    /// nothing accepted yet
    Waiting { source_banner: Option<String> },
    Live(LiveView),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiveView {
    pub reading: Reading,
    pub banner: String,
    pub source_banner: Option<String>,
    pub metrics: Metrics,
    pub charts: Charts,
    pub history_len: usize,
}

impl Default for DashboardView {
    fn default() -> Self {
        DashboardView::Waiting { source_banner: None }
    }
}

impl DashboardView {
    pub fn build(
        reading: &Reading,
        history: &History,
        rain_wet_threshold: i64,
        source: &SourceStatus,
    ) -> Self {
        DashboardView::Live(LiveView {
            reading: reading.clone(),
            banner: update_banner(reading.timestamp),
            source_banner: source.banner(),
            metrics: Metrics::from_reading(reading, rain_wet_threshold),
            charts: Charts {
                temperature: history.temperature_series(),
                light: history.light_series(),
            },
            history_len: history.len(),
        })
    }

    /// Same view with the source warning replaced.
    pub fn with_source(mut self, source: &SourceStatus) -> Self {
        match &mut self {
            DashboardView::Waiting { source_banner } => *source_banner = source.banner(),
            DashboardView::Live(live) => live.source_banner = source.banner(),
        }
        self
    }

    #[allow(dead_code)]
    pub fn live(&self) -> Option<&LiveView> {
        match self {
            DashboardView::Live(live) => Some(live),
            DashboardView::Waiting { .. } => None,
        }
    }
}

pub fn update_banner(timestamp: DateTime<Utc>) -> String {
    format!(
        "New data received! Last update: {}",
        timestamp.with_timezone(&Local).format("%H:%M:%S")
    )
}
