use super::hysteresis::{HysteresisCounter, Transition};
use super::Tracker;
use crate::config::EventConfig;
use crate::events::{DrivingEvent, EventKind};
use crate::types::{AccelerationSample, GnssFix};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

/// Lateral acceleration tracker. Left turns push the lateral axis positive.
pub struct TurnTracker {
    direction: TurnDirection,
    magnitude_threshold: f64,
    lateral_threshold: f64,
    counter: HysteresisCounter,
}

impl TurnTracker {
    pub fn new(direction: TurnDirection, config: &EventConfig) -> Self {
        let lateral_threshold = match direction {
            TurnDirection::Left => config.left_turn_threshold,
            TurnDirection::Right => config.right_turn_threshold,
        };
        Self {
            direction,
            magnitude_threshold: config.turn_magnitude_threshold,
            lateral_threshold,
            counter: HysteresisCounter::new(config.turn_continuous_count_window),
        }
    }

    fn in_turn(&self, sample: &AccelerationSample) -> bool {
        if sample.horizontal_magnitude() <= self.magnitude_threshold {
            return false;
        }
        match self.direction {
            TurnDirection::Left => sample.y > self.lateral_threshold,
            TurnDirection::Right => sample.y < self.lateral_threshold,
        }
    }

    fn kinds(&self) -> (EventKind, EventKind) {
        match self.direction {
            TurnDirection::Left => (EventKind::LeftTurnDetected, EventKind::LeftTurnEnded),
            TurnDirection::Right => (EventKind::RightTurnDetected, EventKind::RightTurnEnded),
        }
    }
}

impl Tracker for TurnTracker {
    fn name(&self) -> &'static str {
        match self.direction {
            TurnDirection::Left => "left_turn",
            TurnDirection::Right => "right_turn",
        }
    }

    fn track(&mut self, sample: &AccelerationSample, _gnss: Option<&GnssFix>) -> Option<DrivingEvent> {
        let (detected, ended) = self.kinds();
        match self.counter.observe(self.in_turn(sample), sample.timestamp) {
            Transition::Detected { .. } => Some(DrivingEvent::detected(detected, sample.timestamp)),
            Transition::Ended { start, last } => {
                Some(DrivingEvent::ended(ended, sample.timestamp, last - start))
            }
            Transition::Idle | Transition::Accumulating => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(window: usize) -> EventConfig {
        EventConfig {
            turn_continuous_count_window: window,
            turn_magnitude_threshold: 0.12,
            ..EventConfig::default()
        }
    }

    fn run(tracker: &mut TurnTracker, samples: &[AccelerationSample]) -> Vec<(usize, DrivingEvent)> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| tracker.track(s, None).map(|e| (i, e)))
            .collect()
    }

    #[test]
    fn test_left_turn_window_episode() {
        let window = 8;
        let mut tracker = TurnTracker::new(TurnDirection::Left, &config(window));
        let mut samples: Vec<AccelerationSample> = (0..window)
            .map(|i| AccelerationSample::new(0.0, 0.3, 1.0, i as f64 * 0.04))
            .collect();
        samples.push(AccelerationSample::new(0.0, 0.0, 1.0, window as f64 * 0.04));
        samples.push(AccelerationSample::new(0.0, 0.0, 1.0, (window + 1) as f64 * 0.04));

        let events = run(&mut tracker, &samples);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, window - 1);
        assert_eq!(events[0].1.kind, EventKind::LeftTurnDetected);
        assert_eq!(events[1].0, window);
        assert_eq!(events[1].1.kind, EventKind::LeftTurnEnded);
        assert_relative_eq!(events[1].1.duration.unwrap(), (window - 1) as f64 * 0.04, epsilon = 1e-9);
    }

    #[test]
    fn test_right_turn_ignores_left_push() {
        let mut tracker = TurnTracker::new(TurnDirection::Right, &config(3));
        let samples: Vec<AccelerationSample> =
            (0..10).map(|i| AccelerationSample::new(0.0, 0.3, 1.0, i as f64)).collect();
        assert!(run(&mut tracker, &samples).is_empty());

        let right: Vec<AccelerationSample> =
            (0..3).map(|i| AccelerationSample::new(0.0, -0.3, 1.0, 10.0 + i as f64)).collect();
        let events = run(&mut tracker, &right);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.kind, EventKind::RightTurnDetected);
    }

    #[test]
    fn test_magnitude_at_threshold_does_not_count() {
        let cfg = EventConfig {
            turn_continuous_count_window: 2,
            turn_magnitude_threshold: 0.25,
            left_turn_threshold: 0.1,
            ..EventConfig::default()
        };
        let mut tracker = TurnTracker::new(TurnDirection::Left, &cfg);
        let samples: Vec<AccelerationSample> =
            (0..5).map(|i| AccelerationSample::new(0.0, 0.25, 1.0, i as f64)).collect();
        assert!(run(&mut tracker, &samples).is_empty());
    }

    #[test]
    fn test_lateral_at_threshold_does_not_count() {
        let cfg = EventConfig {
            turn_continuous_count_window: 2,
            turn_magnitude_threshold: 0.1,
            left_turn_threshold: 0.5,
            ..EventConfig::default()
        };
        let mut tracker = TurnTracker::new(TurnDirection::Left, &cfg);
        let samples: Vec<AccelerationSample> =
            (0..5).map(|i| AccelerationSample::new(0.0, 0.5, 1.0, i as f64)).collect();
        assert!(run(&mut tracker, &samples).is_empty());
    }
}
