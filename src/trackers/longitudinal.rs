use super::hysteresis::{HysteresisCounter, Transition};
use super::Tracker;
use crate::config::EventConfig;
use crate::events::{DrivingEvent, EventKind};
use crate::types::{AccelerationSample, GnssFix};

pub const STANDARD_GRAVITY: f64 = 9.8;
const MS_TO_KMH: f64 = 3.6;

/// Speed change in km/h produced by holding `g_force` for `seconds`.
pub fn speed_variation_kmh(seconds: f64, g_force: f64) -> f64 {
    g_force * STANDARD_GRAVITY * seconds * MS_TO_KMH
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Longitudinal {
    Acceleration,
    Deceleration,
}

/// Forward-axis tracker that also integrates the speed delta over the episode.
///
/// Only intervals between two consecutive in-condition samples count towards the delta.
pub struct LongitudinalTracker {
    direction: Longitudinal,
    threshold: f64,
    counter: HysteresisCounter,
    speed: f64,
    last_active: Option<f64>,
}

impl LongitudinalTracker {
    pub fn new(direction: Longitudinal, config: &EventConfig) -> Self {
        let (threshold, window) = match direction {
            Longitudinal::Acceleration => (
                config.g_force_accelerator_threshold,
                config.acceleration_continuous_count_window,
            ),
            Longitudinal::Deceleration => (
                config.g_force_decelerator_threshold,
                config.deceleration_continuous_count_window,
            ),
        };
        Self {
            direction,
            threshold,
            counter: HysteresisCounter::new(window),
            speed: 0.0,
            last_active: None,
        }
    }

    fn active(&self, sample: &AccelerationSample) -> bool {
        match self.direction {
            Longitudinal::Acceleration => sample.x > self.threshold,
            Longitudinal::Deceleration => sample.x < self.threshold,
        }
    }

    /// Accumulated speed delta of the current episode, km/h.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Tracker for LongitudinalTracker {
    fn name(&self) -> &'static str {
        match self.direction {
            Longitudinal::Acceleration => "acceleration",
            Longitudinal::Deceleration => "deceleration",
        }
    }

    fn track(&mut self, sample: &AccelerationSample, _gnss: Option<&GnssFix>) -> Option<DrivingEvent> {
        let active = self.active(sample);
        if active {
            if let Some(previous) = self.last_active {
                self.speed += speed_variation_kmh((sample.timestamp - previous).max(0.0), sample.x);
            }
            self.last_active = Some(sample.timestamp);
        } else {
            self.last_active = None;
        }

        let (detected, ended) = match self.direction {
            Longitudinal::Acceleration => (EventKind::AccelerationDetected, EventKind::AccelerationEnded),
            Longitudinal::Deceleration => (EventKind::DecelerationDetected, EventKind::DecelerationEnded),
        };

        match self.counter.observe(active, sample.timestamp) {
            Transition::Detected { .. } => Some(DrivingEvent::detected(detected, sample.timestamp)),
            Transition::Ended { start, last } => {
                let speed = std::mem::take(&mut self.speed);
                Some(DrivingEvent::ended(ended, sample.timestamp, last - start).with_speed(speed))
            }
            Transition::Idle => {
                self.speed = 0.0;
                None
            }
            Transition::Accumulating => None,
        }
    }
}
