//! ==============================================================================
//! poller.rs - change detection, history retention and the poll loop
//! ==============================================================================
//!
//! purpose:
//!     one tick = fetch -> detect change -> (maybe) record + publish.
//!     the loop then sleeps for the poll interval and goes again, forever.
//!
//!     ┌──────┐  new timestamp   ┌───────────┐
//!     │ idle │ ───────────────> │ rendering │
//!     └──────┘ <─────────────── └───────────┘
//!        │ ^      published
//!        └─┘ no reading / duplicate
//!
//! state:
//!     PollState is owned by the loop and never shared. only the rendered
//!     DashboardView is published to the web server through AppState.
//!
//! relationships:
//!     - uses: fetcher.rs (ReadingSource), history.rs, render.rs
//!     - writes: server.rs (SharedState)
//!
//! ==============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::DashboardConfig;
use crate::domain::Reading;
use crate::fetcher::{FetchError, ReadingSource};
use crate::history::History;
use crate::render::{DashboardView, SourceStatus};
use crate::server::SharedState;

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// timestamp differs from the last accepted reading
    NewData(Reading),
    /// same timestamp as the last accepted reading, already rendered
    Duplicate,
    /// the source gave us nothing usable this tick
    NoReading(FetchError),
}

/// Session state carried from tick to tick.
#[derive(Debug, Clone)]
pub struct PollState {
    last_timestamp: Option<DateTime<Utc>>,
    history: History,
    consecutive_failures: u32,
    last_error: Option<FetchError>,
}

impl PollState {
    pub fn new(history_size: usize) -> Self {
        Self {
            last_timestamp: None,
            history: History::new(history_size),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Change detector: compare against the last accepted timestamp and
    /// record the reading if it is new.
    pub fn observe(&mut self, fetched: Result<Reading, FetchError>) -> TickOutcome {
        let reading = match fetched {
            Ok(reading) => reading,
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_error = Some(e.clone());
                return TickOutcome::NoReading(e);
            }
        };

        self.consecutive_failures = 0;
        self.last_error = None;

        if self.last_timestamp == Some(reading.timestamp) {
            return TickOutcome::Duplicate;
        }

        self.last_timestamp = Some(reading.timestamp);
        self.history.record(reading.clone());
        TickOutcome::NewData(reading)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    #[allow(dead_code)]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// `unreachable_after == 0` never flags the source.
    pub fn source_status(&self, unreachable_after: u32) -> SourceStatus {
        match &self.last_error {
            Some(e) if unreachable_after > 0 && self.consecutive_failures >= unreachable_after => {
                SourceStatus::Unreachable {
                    failures: self.consecutive_failures,
                    last_error: e.to_string(),
                }
            }
            _ => SourceStatus::Reachable,
        }
    }
}

/// Drives the fetch/detect/publish cycle against one source.
pub struct Poller<S> {
    source: S,
    state: PollState,
    shared: SharedState,
    interval: Duration,
    unreachable_after: u32,
    rain_wet_threshold: i64,
    show_sensor_data: bool,
    source_status: SourceStatus,
}

impl<S: ReadingSource> Poller<S> {
    pub fn new(source: S, shared: SharedState, config: &DashboardConfig) -> Self {
        Self {
            source,
            state: PollState::new(config.history.size),
            shared,
            interval: config.polling.interval(),
            unreachable_after: config.polling.unreachable_after,
            rain_wet_threshold: config.thresholds.rain_wet_threshold,
            show_sensor_data: config.logging.show_sensor_data,
            source_status: SourceStatus::Reachable,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// One poll tick.
    pub async fn tick(&mut self) -> TickOutcome {
        let fetched = self.source.fetch().await;
        let outcome = self.state.observe(fetched);
        let status = self.state.source_status(self.unreachable_after);
        let health_changed = status.is_unreachable() != self.source_status.is_unreachable();

        match &outcome {
            TickOutcome::NewData(reading) => {
                if self.show_sensor_data {
                    tracing::info!(
                        "[POLL] New reading @ {} | Temp: {}°C | Rain: {} | Light: {} | Door: {}",
                        reading.timestamp,
                        reading.temperature,
                        reading.rain_value,
                        reading.light_value,
                        reading.door.label()
                    );
                }
                let view = DashboardView::build(
                    reading,
                    self.state.history(),
                    self.rain_wet_threshold,
                    &status,
                );
                let mut guard = self.shared.write().await;
                guard.view = view;
                guard.history = self.state.history().to_vec();
            }
            TickOutcome::Duplicate => {
                tracing::trace!("[POLL] No change since {:?}", self.state.last_timestamp());
            }
            TickOutcome::NoReading(e) => {
                tracing::debug!("[POLL] No reading from {}: {}", self.source.describe(), e);
            }
        }

        if health_changed {
            match &status {
                SourceStatus::Unreachable { failures, last_error } => tracing::warn!(
                    "[POLL] ⚠ Source unreachable after {} failed polls: {}",
                    failures,
                    last_error
                ),
                SourceStatus::Reachable => tracing::info!("[POLL] ✓ Source reachable again"),
            }
        }

        // the banner carries the failure count, so refresh it on every change
        if status != self.source_status {
            if !matches!(outcome, TickOutcome::NewData(_)) {
                let mut guard = self.shared.write().await;
                let view = std::mem::take(&mut guard.view);
                guard.view = view.with_source(&status);
            }
            self.source_status = status;
        }

        outcome
    }

    /// Poll forever. Only returns if the hosting task is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            "[POLL] Polling {} every {}s",
            self.source.describe(),
            self.interval.as_secs()
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::parse_body;
    use crate::server::AppState;

    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    /// replays canned fetch results, then reports the source as gone
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Reading, FetchError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Reading, FetchError>>) -> Self {
            Self { script: Mutex::new(script.into()) }
        }
    }

    impl ReadingSource for ScriptedSource {
        async fn fetch(&self) -> Result<Reading, FetchError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Unavailable("script exhausted".into())))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// collects formatted log output so tests can count lines
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    const FIRST: &str =
        r#"{"timestamp": 1000, "suhu": 25, "rainvalue": 600, "ldrValue": 300, "pintu": 0}"#;
    const SECOND: &str =
        r#"{"timestamp": 1003, "suhu": 26, "rainvalue": 400, "ldrValue": 310, "pintu": 1}"#;

    fn at(secs: i64) -> Reading {
        Reading {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            temperature: 20.0,
            rain_value: 700,
            light_value: 100,
            door: crate::domain::DoorState::Closed,
        }
    }

    fn shared() -> SharedState {
        Arc::new(RwLock::new(AppState::default()))
    }

    fn poller(script: Vec<Result<Reading, FetchError>>, shared: SharedState) -> Poller<ScriptedSource> {
        let mut config = DashboardConfig::default();
        config.logging.show_sensor_data = false;
        Poller::new(ScriptedSource::new(script), shared, &config)
    }

    #[test]
    fn test_absence_is_no_update() {
        let mut state = PollState::new(20);
        let outcome = state.observe(Err(FetchError::Empty));
        assert_eq!(outcome, TickOutcome::NoReading(FetchError::Empty));
        assert_eq!(state.last_timestamp(), None);
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_new_then_duplicate() {
        let mut state = PollState::new(20);

        assert_eq!(state.observe(Ok(at(1000))), TickOutcome::NewData(at(1000)));
        assert_eq!(state.last_timestamp(), Some(at(1000).timestamp));

        assert_eq!(state.observe(Ok(at(1000))), TickOutcome::Duplicate);
        assert_eq!(state.observe(Ok(at(1000))), TickOutcome::Duplicate);
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_failure_between_duplicates_does_not_rerender() {
        let mut state = PollState::new(20);
        state.observe(Ok(at(1000)));
        state.observe(Err(FetchError::Status(503)));
        assert_eq!(state.observe(Ok(at(1000))), TickOutcome::Duplicate);
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_older_timestamp_still_counts_as_new() {
        let mut state = PollState::new(20);
        state.observe(Ok(at(1000)));
        assert!(matches!(state.observe(Ok(at(900))), TickOutcome::NewData(_)));
        assert_eq!(state.last_timestamp(), Some(at(900).timestamp));
    }

    #[test]
    fn test_history_evicts_oldest_on_21st() {
        let mut state = PollState::new(20);
        for t in 0..21 {
            state.observe(Ok(at(t)));
        }
        let history = state.history();
        assert_eq!(history.len(), 20);
        assert_eq!(history.iter().next().map(|r| r.timestamp.timestamp()), Some(1));
        assert_eq!(history.latest().map(|r| r.timestamp.timestamp()), Some(20));
    }

    #[test]
    fn test_source_status_threshold() {
        let mut state = PollState::new(20);
        state.observe(Err(FetchError::Empty));
        state.observe(Err(FetchError::Empty));
        assert_eq!(state.source_status(3), SourceStatus::Reachable);

        state.observe(Err(FetchError::Unavailable("request timed out".into())));
        assert_eq!(state.consecutive_failures(), 3);
        assert!(matches!(state.source_status(3), SourceStatus::Unreachable { failures: 3, .. }));
        assert_eq!(state.source_status(0), SourceStatus::Reachable);

        state.observe(Ok(at(5)));
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.source_status(3), SourceStatus::Reachable);
    }

    #[tokio::test]
    async fn test_scenario_duplicate_then_new() {
        let shared = shared();
        let mut poller = poller(
            vec![parse_body(FIRST), parse_body(FIRST), parse_body(SECOND)],
            shared.clone(),
        );

        assert!(matches!(poller.tick().await, TickOutcome::NewData(_)));
        assert_eq!(poller.tick().await, TickOutcome::Duplicate);

        let outcome = poller.tick().await;
        assert!(matches!(outcome, TickOutcome::NewData(ref r) if r.timestamp.timestamp() == 1003));
        assert_eq!(poller.state().history().len(), 2);

        let guard = shared.read().await;
        let live = guard.view.live().expect("live view");
        assert_eq!(live.metrics.rain_label, "wet");
        assert_eq!(live.metrics.door_label, "open");
        assert_eq!(live.history_len, 2);
        assert_eq!(guard.history.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_does_not_republish() {
        let shared = shared();
        let mut poller = poller(vec![parse_body(FIRST), parse_body(FIRST)], shared.clone());

        poller.tick().await;
        // clear what was published; a duplicate must not put it back
        shared.write().await.view = DashboardView::default();

        assert_eq!(poller.tick().await, TickOutcome::Duplicate);
        assert_eq!(shared.read().await.view, DashboardView::default());
    }

    #[tokio::test]
    async fn test_unreachable_banner_set_and_cleared() {
        let shared = shared();
        let mut poller = poller(
            vec![
                parse_body(FIRST),
                Err(FetchError::Status(500)),
                Err(FetchError::Status(500)),
                Err(FetchError::Status(500)),
                parse_body(FIRST),
            ],
            shared.clone(),
        );

        poller.tick().await;
        for _ in 0..3 {
            poller.tick().await;
        }
        {
            let guard = shared.read().await;
            let banner = guard.view.live().unwrap().source_banner.clone().unwrap();
            assert!(banner.contains("HTTP 500"));
        }

        assert_eq!(poller.tick().await, TickOutcome::Duplicate);
        let guard = shared.read().await;
        assert_eq!(guard.view.live().unwrap().source_banner, None);
    }

    #[tokio::test]
    async fn test_waiting_view_gets_banner() {
        let shared = shared();
        let mut poller = poller(vec![], shared.clone());
        for _ in 0..3 {
            poller.tick().await;
        }
        let guard = shared.read().await;
        match &guard.view {
            DashboardView::Waiting { source_banner } => {
                assert!(source_banner.as_deref().unwrap().contains("script exhausted"))
            }
            DashboardView::Live(_) => panic!("no reading was ever accepted"),
        }
    }

    #[tokio::test]
    async fn test_outage_warns_once() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let shared = shared();
        let mut poller = poller(vec![Err(FetchError::Status(503)); 10], shared.clone());
        for _ in 0..10 {
            poller.tick().await;
        }

        let output = logs.text();
        assert_eq!(output.matches("Source unreachable").count(), 1, "log was:\n{}", output);

        // the banner still follows the failure count
        match &shared.read().await.view {
            DashboardView::Waiting { source_banner } => {
                assert!(source_banner.as_deref().unwrap().contains("10 failed polls"))
            }
            DashboardView::Live(_) => panic!("no reading was ever accepted"),
        };
    }
}
