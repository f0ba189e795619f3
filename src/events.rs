use serde::{Deserialize, Serialize};

use crate::types::{GnssFix, ImuRecord, MagnetometerReading};

pub const DIRECTION_CHANGE: &str = "DIRECTION_CHANGE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    LeftTurnDetected,
    LeftTurnEnded,
    RightTurnDetected,
    RightTurnEnded,
    AccelerationDetected,
    AccelerationEnded,
    DecelerationDetected,
    DecelerationEnded,
    StopDetected,
    StopEnded,
}

impl EventKind {
    /// Wire name used by the loggers and downstream relays.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::LeftTurnDetected => "LEFT_TURN_DETECTED_EVENT",
            EventKind::LeftTurnEnded => "LEFT_TURN_EVENT",
            EventKind::RightTurnDetected => "RIGHT_TURN_DETECTED_EVENT",
            EventKind::RightTurnEnded => "RIGHT_TURN_EVENT",
            EventKind::AccelerationDetected => "ACCELERATION_DETECTED_EVENT",
            EventKind::AccelerationEnded => "ACCELERATION_EVENT",
            EventKind::DecelerationDetected => "DECELERATION_DETECTED_EVENT",
            EventKind::DecelerationEnded => "DECELERATION_EVENT",
            EventKind::StopDetected => "STOP_DETECTED_EVENT",
            EventKind::StopEnded => "STOP_END_EVENT",
        }
    }

    pub fn category(&self) -> &'static str {
        DIRECTION_CHANGE
    }

    pub fn is_ended(&self) -> bool {
        matches!(
            self,
            EventKind::LeftTurnEnded
                | EventKind::RightTurnEnded
                | EventKind::AccelerationEnded
                | EventKind::DecelerationEnded
                | EventKind::StopEnded
        )
    }
}

/// Discrete driving event emitted by a tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrivingEvent {
    pub kind: EventKind,
    pub name: String,
    pub category: String,
    pub timestamp: f64,
    /// Seconds between the first and last in-condition sample (Ended only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Speed delta in km/h accumulated over the episode (longitudinal Ended only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl DrivingEvent {
    pub fn detected(kind: EventKind, timestamp: f64) -> Self {
        Self {
            kind,
            name: kind.name().to_string(),
            category: kind.category().to_string(),
            timestamp,
            duration: None,
            speed: None,
        }
    }

    pub fn ended(kind: EventKind, timestamp: f64, duration: f64) -> Self {
        Self { duration: Some(duration), ..Self::detected(kind, timestamp) }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// Item of the merged downstream stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Record {
    Imu(ImuRecord),
    Gnss(GnssFix),
    Magnetometer(MagnetometerReading),
    Driving(DrivingEvent),
}

impl Record {
    pub fn timestamp(&self) -> f64 {
        match self {
            Record::Imu(r) => r.timestamp(),
            Record::Gnss(f) => f.timestamp,
            Record::Magnetometer(m) => m.timestamp,
            Record::Driving(e) => e.timestamp,
        }
    }
}

impl From<ImuRecord> for Record {
    fn from(r: ImuRecord) -> Self {
        Record::Imu(r)
    }
}

impl From<GnssFix> for Record {
    fn from(f: GnssFix) -> Self {
        Record::Gnss(f)
    }
}

impl From<MagnetometerReading> for Record {
    fn from(m: MagnetometerReading) -> Self {
        Record::Magnetometer(m)
    }
}

impl From<DrivingEvent> for Record {
    fn from(e: DrivingEvent) -> Self {
        Record::Driving(e)
    }
}
