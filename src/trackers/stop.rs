use super::hysteresis::{HysteresisCounter, Transition};
use super::Tracker;
use crate::config::EventConfig;
use crate::events::{DrivingEvent, EventKind};
use crate::types::{AccelerationSample, GnssFix};

/// Gravity-only acceleration while the receiver still reports motion.
///
/// Without a GNSS fix the sample is skipped entirely: the counter neither
/// advances nor resets.
pub struct StopTracker {
    magnitude_low: f64,
    magnitude_high: f64,
    min_speed: f64,
    counter: HysteresisCounter,
}

impl StopTracker {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            magnitude_low: config.stop_magnitude_low,
            magnitude_high: config.stop_magnitude_high,
            min_speed: config.stop_min_speed,
            counter: HysteresisCounter::new(config.stop_end_continuous_count_window),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.counter.count()
    }
}

impl Tracker for StopTracker {
    fn name(&self) -> &'static str {
        "stop"
    }

    fn track(&mut self, sample: &AccelerationSample, gnss: Option<&GnssFix>) -> Option<DrivingEvent> {
        let fix = gnss?;
        let active = sample.magnitude > self.magnitude_low
            && sample.magnitude < self.magnitude_high
            && fix.speed > self.min_speed;

        match self.counter.observe(active, sample.timestamp) {
            Transition::Detected { .. } => {
                Some(DrivingEvent::detected(EventKind::StopDetected, sample.timestamp))
            }
            Transition::Ended { start, last } => {
                Some(DrivingEvent::ended(EventKind::StopEnded, sample.timestamp, last - start))
            }
            Transition::Idle | Transition::Accumulating => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> EventConfig {
        EventConfig { stop_end_continuous_count_window: 5, ..EventConfig::default() }
    }

    #[test]
    fn test_missing_gnss_is_a_no_op() {
        let mut tracker = StopTracker::new(&config());
        let moving = GnssFix::new(0.0, 0.0, 0.0, 10.0);
        tracker.track(&AccelerationSample::new(0.0, 0.0, 1.0, 0.0), Some(&moving));
        tracker.track(&AccelerationSample::new(0.0, 0.0, 1.0, 0.1), Some(&moving));
        assert_eq!(tracker.pending_count(), 2);

        assert!(tracker.track(&AccelerationSample::new(0.0, 0.0, 1.0, 0.2), None).is_none());
        assert_eq!(tracker.pending_count(), 2);
    }

    #[test]
    fn test_stop_episode() {
        let mut tracker = StopTracker::new(&config());
        let moving = GnssFix::new(0.0, 0.0, 0.0, 10.0);
        let stopped = GnssFix::new(0.0, 0.0, 0.0, 0.0);

        let mut events = Vec::new();
        for i in 0..5 {
            let s = AccelerationSample::new(0.0, 0.0, 1.0, i as f64 * 0.04);
            events.extend(tracker.track(&s, Some(&moving)));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::StopDetected);

        let end = tracker
            .track(&AccelerationSample::new(0.0, 0.0, 1.0, 0.2), Some(&stopped))
            .unwrap();
        assert_eq!(end.kind, EventKind::StopEnded);
        assert_relative_eq!(end.duration.unwrap(), 0.16, epsilon = 1e-9);
    }

    #[test]
    fn test_speed_at_threshold_is_not_moving() {
        let mut tracker = StopTracker::new(&config());
        let crawl = GnssFix::new(0.0, 0.0, 0.0, 1.5);
        tracker.track(&AccelerationSample::new(0.0, 0.0, 1.0, 0.0), Some(&crawl));
        assert_eq!(tracker.pending_count(), 0);
    }
}
