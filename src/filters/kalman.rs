// kalman.rs: Scalar random-walk Kalman filters
//
// One filter per signal dimension, lazily seeded with the first measurement it sees.
// State never crosses dimensions: the acceleration smoother owns four filters and the
// position smoother owns two.

use crate::error::FilterError;
use crate::types::{AccelerationSample, GnssFix};

/// Random-walk model: the state is expected to drift with variance `process_variance`
/// per second and each measurement carries `observation_variance`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarModel {
    pub process_variance: f64,
    pub observation_variance: f64,
    pub initial_variance: f64,
}

impl ScalarModel {
    pub fn new(process_variance: f64, observation_variance: f64) -> Self {
        Self { process_variance, observation_variance, initial_variance: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarKalman {
    signal: &'static str,
    model: ScalarModel,
    estimate: f64,
    variance: f64,
    last_timestamp: f64,
}

impl ScalarKalman {
    pub fn new(signal: &'static str, model: ScalarModel, timestamp: f64, initial: f64) -> Self {
        Self {
            signal,
            model,
            estimate: initial,
            variance: model.initial_variance,
            last_timestamp: timestamp,
        }
    }

    /// Predict forward to `timestamp`, correct with `measurement`, return the new estimate.
    pub fn update(&mut self, timestamp: f64, measurement: f64) -> Result<f64, FilterError> {
        let dt = timestamp - self.last_timestamp;
        if !(dt >= 0.0) {
            return Err(FilterError::TimeReversal {
                signal: self.signal,
                timestamp,
                last: self.last_timestamp,
            });
        }

        let predicted = self.variance + self.model.process_variance * dt;
        let innovation = predicted + self.model.observation_variance;
        if !innovation.is_finite() || innovation <= 0.0 {
            return Err(FilterError::DegenerateCovariance {
                signal: self.signal,
                covariance: innovation,
            });
        }

        let gain = predicted / innovation;
        self.estimate += gain * (measurement - self.estimate);
        self.variance = (1.0 - gain) * predicted;
        self.last_timestamp = timestamp;
        Ok(self.estimate)
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

/// Filter slot that builds itself from the first measurement.
#[derive(Clone, Debug)]
struct LazyKalman {
    signal: &'static str,
    model: ScalarModel,
    filter: Option<ScalarKalman>,
}

impl LazyKalman {
    fn new(signal: &'static str, model: ScalarModel) -> Self {
        Self { signal, model, filter: None }
    }

    fn update(&mut self, timestamp: f64, measurement: f64) -> Result<f64, FilterError> {
        match self.filter.as_mut() {
            Some(filter) => filter.update(timestamp, measurement),
            None => {
                let mut filter = ScalarKalman::new(self.signal, self.model, timestamp, measurement);
                let out = filter.update(timestamp, measurement)?;
                self.filter = Some(filter);
                Ok(out)
            }
        }
    }
}

// ─── Acceleration ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AccelerationSmoother {
    x: LazyKalman,
    y: LazyKalman,
    z: LazyKalman,
    magnitude: LazyKalman,
}

impl AccelerationSmoother {
    pub fn new(model: ScalarModel) -> Self {
        Self {
            x: LazyKalman::new("accel_x", model),
            y: LazyKalman::new("accel_y", model),
            z: LazyKalman::new("accel_z", model),
            magnitude: LazyKalman::new("accel_magnitude", model),
        }
    }

    pub fn update(&mut self, sample: &AccelerationSample) -> Result<AccelerationSample, FilterError> {
        let t = sample.timestamp;
        Ok(AccelerationSample {
            x: self.x.update(t, sample.x)?,
            y: self.y.update(t, sample.y)?,
            z: self.z.update(t, sample.z)?,
            magnitude: self.magnitude.update(t, sample.magnitude)?,
            timestamp: t,
        })
    }
}

// ─── Position ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct PositionSmoother {
    latitude: LazyKalman,
    longitude: LazyKalman,
}

impl PositionSmoother {
    pub fn new(model: ScalarModel) -> Self {
        Self {
            latitude: LazyKalman::new("latitude", model),
            longitude: LazyKalman::new("longitude", model),
        }
    }

    /// Smooth the fix position, keeping the raw coordinates in the `unfiltered_*` fields.
    /// Fixes without a position solution pass through untouched.
    pub fn update(&mut self, mut fix: GnssFix) -> Result<GnssFix, FilterError> {
        fix.unfiltered_latitude = fix.latitude;
        fix.unfiltered_longitude = fix.longitude;
        if !fix.has_fix() {
            return Ok(fix);
        }
        fix.latitude = self.latitude.update(fix.timestamp, fix.latitude)?;
        fix.longitude = self.longitude.update(fix.timestamp, fix.longitude)?;
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::types::FixQuality;

    fn model() -> ScalarModel {
        ScalarModel::new(2.0, 2.0)
    }

    #[test]
    fn test_first_measurement_seeds_estimate() {
        let mut smoother = AccelerationSmoother::new(model());
        let out = smoother.update(&AccelerationSample::new(0.3, -0.1, 0.9, 1.0)).unwrap();
        assert_relative_eq!(out.x, 0.3);
        assert_relative_eq!(out.y, -0.1);
        assert_relative_eq!(out.z, 0.9);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let mut filter = ScalarKalman::new("test", model(), 0.0, 0.0);
        // P = 0 + 2*1 = 2, K = 2 / 4 = 0.5
        let out = filter.update(1.0, 1.0).unwrap();
        assert_relative_eq!(out, 0.5);
        assert_relative_eq!(filter.variance(), 1.0);
    }

    #[test]
    fn test_same_input_same_output() {
        let samples: Vec<AccelerationSample> = (0..50)
            .map(|i| {
                let t = i as f64 * 0.025;
                AccelerationSample::new((t * 3.0).sin() * 0.3, (t * 5.0).cos() * 0.2, 1.0, t)
            })
            .collect();

        let run = |samples: &[AccelerationSample]| -> Vec<AccelerationSample> {
            let mut smoother = AccelerationSmoother::new(model());
            samples.iter().map(|s| smoother.update(s).unwrap()).collect()
        };

        let first = run(&samples);
        let second = run(&samples);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.magnitude.to_bits(), b.magnitude.to_bits());
        }
    }

    #[test]
    fn test_time_reversal_is_an_error() {
        let mut filter = ScalarKalman::new("test", model(), 5.0, 0.0);
        let err = filter.update(4.0, 1.0).unwrap_err();
        assert!(matches!(err, FilterError::TimeReversal { .. }));
    }

    #[test]
    fn test_zero_noise_model_is_degenerate() {
        let mut filter = ScalarKalman::new("test", ScalarModel::new(0.0, 0.0), 0.0, 0.0);
        let err = filter.update(1.0, 1.0).unwrap_err();
        assert!(matches!(err, FilterError::DegenerateCovariance { .. }));
    }

    #[test]
    fn test_position_keeps_unfiltered() {
        let mut smoother = PositionSmoother::new(model());
        smoother.update(GnssFix::new(0.0, 45.0, -73.0, 0.0)).unwrap();
        let fix = smoother.update(GnssFix::new(1.0, 45.001, -73.001, 0.0)).unwrap();
        assert_relative_eq!(fix.unfiltered_latitude, 45.001);
        assert!(fix.latitude > 45.0 && fix.latitude < 45.001);
    }

    #[test]
    fn test_no_fix_passes_through() {
        let mut smoother = PositionSmoother::new(model());
        let mut fix = GnssFix::new(0.0, 0.0, 0.0, 0.0);
        fix.fix = FixQuality::None;
        let out = smoother.update(fix.clone()).unwrap();
        assert_eq!(out, fix);
    }
}
