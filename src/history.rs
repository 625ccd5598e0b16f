//! Rolling reading history for the dashboard charts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Reading;

/// Bounded, oldest-first buffer of accepted readings.
///
/// Only readings the change detector accepted land here, so neighbouring
/// entries never share a timestamp. Entries further apart are not compared;
/// that relies on the device producing increasing timestamps.
#[derive(Debug, Clone)]
pub struct History {
    readings: VecDeque<Reading>,
    capacity: usize,
}

/// One chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { readings: VecDeque::with_capacity(capacity + 1), capacity }
    }

    /// Append a reading, evicting the oldest entries past capacity.
    pub fn record(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[allow(dead_code)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[allow(dead_code)]
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn temperature_series(&self) -> Vec<SeriesPoint> {
        self.series(|r| r.temperature)
    }

    pub fn light_series(&self) -> Vec<SeriesPoint> {
        self.series(|r| r.light_value as f64)
    }

    fn series(&self, value: impl Fn(&Reading) -> f64) -> Vec<SeriesPoint> {
        self.readings
            .iter()
            .map(|r| SeriesPoint { time: r.timestamp, value: value(r) })
            .collect()
    }
}
