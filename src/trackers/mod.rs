pub mod hysteresis;
pub mod longitudinal;
pub mod stop;
pub mod turn;

pub use hysteresis::{HysteresisCounter, Transition};
pub use longitudinal::{speed_variation_kmh, Longitudinal, LongitudinalTracker};
pub use stop::StopTracker;
pub use turn::{TurnDirection, TurnTracker};

use crate::config::EventConfig;
use crate::events::DrivingEvent;
use crate::types::{AccelerationSample, GnssFix};

/// One debounced driving-event state machine over vehicle-frame samples.
pub trait Tracker: Send {
    fn name(&self) -> &'static str;

    /// Feed one filtered sample plus the most recent GNSS fix, if any.
    fn track(&mut self, sample: &AccelerationSample, gnss: Option<&GnssFix>) -> Option<DrivingEvent>;
}

/// The five trackers, fed in a fixed order.
pub struct TrackerSet {
    trackers: Vec<Box<dyn Tracker>>,
}

impl TrackerSet {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            trackers: vec![
                Box::new(TurnTracker::new(TurnDirection::Left, config)),
                Box::new(TurnTracker::new(TurnDirection::Right, config)),
                Box::new(LongitudinalTracker::new(Longitudinal::Acceleration, config)),
                Box::new(LongitudinalTracker::new(Longitudinal::Deceleration, config)),
                Box::new(StopTracker::new(config)),
            ],
        }
    }

    pub fn track_all(&mut self, sample: &AccelerationSample, gnss: Option<&GnssFix>) -> Vec<DrivingEvent> {
        let mut events = Vec::new();
        for tracker in self.trackers.iter_mut() {
            if let Some(event) = tracker.track(sample, gnss) {
                log::debug!("[{}] {} at {:.3}s", tracker.name(), event.name, event.timestamp);
                events.push(event);
            }
        }
        events
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.trackers.iter().map(|t| t.name()).collect()
    }
}
