use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// one complete snapshot from the device
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// degrees celsius
    pub temperature: f64,
    /// raw rain sensor value, lower = wetter
    pub rain_value: i64,
    /// raw light dependent resistor value
    pub light_value: i64,
    pub door: DoorState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    pub fn label(self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RainStatus {
    Wet,
    Dry,
}

impl RainStatus {
    /// wet iff the value is strictly below the threshold
    pub fn classify(rain_value: i64, wet_threshold: i64) -> Self {
        if rain_value < wet_threshold {
            RainStatus::Wet
        } else {
            RainStatus::Dry
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RainStatus::Wet => "wet",
            RainStatus::Dry => "dry",
        }
    }
}

/// the device document exactly as the database stores it
#[derive(Debug, Deserialize)]
pub struct RawReading {
    /// epoch seconds, possibly fractional
    pub timestamp: f64,
    pub suhu: f64,
    pub rainvalue: i64,
    #[serde(rename = "ldrValue")]
    pub ldr_value: i64,
    pub pintu: RawDoor,
}

/// the firmware writes `pintu` as 0/1, older builds as a bool
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawDoor {
    Flag(bool),
    Code(i64),
}

impl From<RawDoor> for DoorState {
    fn from(raw: RawDoor) -> Self {
        match raw {
            RawDoor::Flag(true) | RawDoor::Code(1) => DoorState::Open,
            _ => DoorState::Closed,
        }
    }
}

impl TryFrom<RawReading> for Reading {
    type Error = String;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        if !raw.timestamp.is_finite() {
            return Err(format!("timestamp is not finite: {}", raw.timestamp));
        }
        let millis = (raw.timestamp * 1000.0).round();
        if millis.abs() > i64::MAX as f64 {
            return Err(format!("timestamp out of range: {}", raw.timestamp));
        }
        let timestamp = DateTime::from_timestamp_millis(millis as i64)
            .ok_or_else(|| format!("timestamp out of range: {}", raw.timestamp))?;

        Ok(Reading {
            timestamp,
            temperature: raw.suhu,
            rain_value: raw.rainvalue,
            light_value: raw.ldr_value,
            door: raw.pintu.into(),
        })
    }
}
