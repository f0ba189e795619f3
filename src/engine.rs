// engine.rs: Pure computation layer
//
// Everything in here is independent of the tokio runtime: samples in, events out.
// The async pipeline runs the same building blocks as separate stages; replay and
// the scenario tests drive them through DriveEngine directly.

use crate::calibration::{LevelledSample, TiltCalibrator};
use crate::config::EventConfig;
use crate::error::FilterError;
use crate::events::DrivingEvent;
use crate::filters::{AccelerationSmoother, PositionSmoother, ScalarModel};
use crate::orientation::{Orientation, OrientationResolver};
use crate::trackers::TrackerSet;
use crate::types::{AccelerationSample, GnssFix, ImuRecord, TiltAngles};

/// Tilt calibration, gravity compensation and Kalman smoothing on vehicle-frame samples.
pub struct Leveller {
    calibrator: TiltCalibrator,
    smoother: AccelerationSmoother,
}

impl Leveller {
    pub fn new(config: &EventConfig) -> Self {
        let model = ScalarModel::new(config.process_variance, config.observation_variance);
        Self {
            calibrator: TiltCalibrator::new(config),
            smoother: AccelerationSmoother::new(model),
        }
    }

    /// `Ok(None)` until the tilt calibration has converged.
    pub fn level(&mut self, sample: &AccelerationSample) -> Result<Option<LevelledSample>, FilterError> {
        if !self.calibrator.calibrate(sample) {
            return Ok(None);
        }
        let Some(corrected) = self.calibrator.correct(sample) else {
            return Ok(None);
        };
        let smoothed = self.smoother.update(&corrected.sample)?;
        Ok(Some(LevelledSample { sample: smoothed, tilt: corrected.tilt }))
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_converged()
    }

    pub fn tilt(&self) -> Option<TiltAngles> {
        self.calibrator.tilt()
    }
}

pub struct DriveEngine {
    resolver: OrientationResolver,
    leveller: Leveller,
    position: PositionSmoother,
    trackers: TrackerSet,
    last_gnss: Option<GnssFix>,
}

impl DriveEngine {
    pub fn new(config: &EventConfig) -> Self {
        let model = ScalarModel::new(config.process_variance, config.observation_variance);
        Self {
            resolver: OrientationResolver::new(
                config.orientation_dead_zone,
                config.orientation_confirmation_count,
            ),
            leveller: Leveller::new(config),
            position: PositionSmoother::new(model),
            trackers: TrackerSet::new(config),
            last_gnss: None,
        }
    }

    pub fn feed_imu(&mut self, record: &ImuRecord) -> Result<Vec<DrivingEvent>, FilterError> {
        let sample = &record.acceleration;
        if self.resolver.resolve(sample) == Orientation::Unset {
            return Ok(Vec::new());
        }
        let Some(vehicle) = self.resolver.remap(sample) else {
            return Ok(Vec::new());
        };
        let Some(levelled) = self.leveller.level(&vehicle)? else {
            return Ok(Vec::new());
        };
        Ok(self.trackers.track_all(&levelled.sample, self.last_gnss.as_ref()))
    }

    /// Smooth the fix position and cache it for the stop tracker.
    pub fn feed_gnss(&mut self, fix: GnssFix) -> Result<GnssFix, FilterError> {
        let fix = self.position.update(fix)?;
        self.last_gnss = Some(fix.clone());
        Ok(fix)
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.resolver.locked()
    }

    pub fn is_calibrated(&self) -> bool {
        self.leveller.is_calibrated()
    }

    pub fn tilt(&self) -> Option<TiltAngles> {
        self.leveller.tilt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::types::AngularRate;

    const DT: f64 = 0.04;

    fn record(x: f64, y: f64, z: f64, t: f64) -> ImuRecord {
        ImuRecord {
            acceleration: AccelerationSample::new(x, y, z, t),
            angular_rate: AngularRate::default(),
            temperature: 25.0,
        }
    }

    #[test]
    fn test_level_mount_never_locks() {
        let mut engine = DriveEngine::new(&EventConfig::default());
        for i in 0..100 {
            assert!(engine.feed_imu(&record(0.0, 0.0, 1.0, i as f64 * DT)).unwrap().is_empty());
        }
        assert_eq!(engine.orientation(), None);
        assert!(!engine.is_calibrated());
    }

    #[test]
    fn test_warm_up_then_brake() {
        let pitch = 6.0_f64.to_radians();
        let config = EventConfig { deceleration_continuous_count_window: 5, ..EventConfig::default() };
        let mut engine = DriveEngine::new(&config);

        let mut t = 0.0;
        for _ in 0..40 {
            assert!(engine.feed_imu(&record(pitch.sin(), 0.0, pitch.cos(), t)).unwrap().is_empty());
            t += DT;
        }
        assert_eq!(engine.orientation(), Some(Orientation::Front));
        assert!(engine.is_calibrated());

        // -0.5 g braking seen through the pitched mount
        let (vx, vz) = (-0.5, 1.0);
        let mut kinds = Vec::new();
        for _ in 0..60 {
            let x = vx * pitch.cos() + vz * pitch.sin();
            let z = -vx * pitch.sin() + vz * pitch.cos();
            kinds.extend(engine.feed_imu(&record(x, 0.0, z, t)).unwrap().into_iter().map(|e| e.kind));
            t += DT;
        }
        for _ in 0..60 {
            kinds.extend(
                engine
                    .feed_imu(&record(pitch.sin(), 0.0, pitch.cos(), t))
                    .unwrap()
                    .into_iter()
                    .map(|e| e.kind),
            );
            t += DT;
        }
        assert_eq!(kinds, vec![EventKind::DecelerationDetected, EventKind::DecelerationEnded]);
    }

    #[test]
    fn test_long_turn_keeps_its_full_duration() {
        let pitch = 6.0_f64.to_radians();
        let mut engine = DriveEngine::new(&EventConfig::default());

        let mut t = 0.0;
        for _ in 0..60 {
            engine.feed_imu(&record(pitch.sin(), 0.0, pitch.cos(), t)).unwrap();
            t += DT;
        }
        assert!(engine.is_calibrated());
        let tilt = engine.tilt().unwrap();

        // 8 s of steady 0.25 g to the left; the reading stays inside the gravity band
        let mut events = Vec::new();
        let turn_start = t;
        for _ in 0..200 {
            events.extend(engine.feed_imu(&record(pitch.sin(), 0.25, pitch.cos(), t)).unwrap());
            t += DT;
        }
        let turn_end = t - DT;
        for _ in 0..20 {
            events.extend(engine.feed_imu(&record(pitch.sin(), 0.0, pitch.cos(), t)).unwrap());
            t += DT;
        }

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::LeftTurnDetected, EventKind::LeftTurnEnded]);
        let duration = events[1].duration.unwrap();
        assert!(duration > 7.0 && duration <= turn_end - turn_start + DT, "duration {}", duration);
        assert_eq!(engine.tilt(), Some(tilt));
    }

    #[test]
    fn test_gnss_cached_for_stop_tracker() {
        let mut engine = DriveEngine::new(&EventConfig::default());
        let fix = engine.feed_gnss(GnssFix::new(0.0, 45.0, -73.0, 8.0)).unwrap();
        assert_eq!(fix.unfiltered_latitude, 45.0);
        assert_eq!(engine.last_gnss.as_ref().map(|f| f.speed), Some(8.0));
    }
}
