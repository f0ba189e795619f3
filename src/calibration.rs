use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::EventConfig;
use crate::types::{AccelerationSample, TiltAngles};

/// Fixed-capacity rolling mean.
#[derive(Clone, Debug)]
pub struct RollingAverage {
    window: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingAverage {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { window: VecDeque::with_capacity(capacity), capacity, sum: 0.0 }
    }

    pub fn add(&mut self, value: f64) {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.capacity {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
    }

    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.sum / self.window.len() as f64
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[derive(Clone, Debug)]
struct AngleWindow {
    x: RollingAverage,
    y: RollingAverage,
    z: RollingAverage,
}

impl AngleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            x: RollingAverage::new(capacity),
            y: RollingAverage::new(capacity),
            z: RollingAverage::new(capacity),
        }
    }

    fn add(&mut self, angles: TiltAngles) {
        self.x.add(angles.x_angle);
        self.y.add(angles.y_angle);
        self.z.add(angles.z_angle);
    }

    fn average(&self) -> TiltAngles {
        TiltAngles {
            x_angle: self.x.average(),
            y_angle: self.y.average(),
            z_angle: self.z.average(),
        }
    }

    fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.z.reset();
    }
}

/// Vehicle-level acceleration plus the static tilt that was removed from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelledSample {
    pub sample: AccelerationSample,
    pub tilt: TiltAngles,
}

/// Static mount tilt estimator.
///
/// Samples whose magnitude lies in the gravity band (edges included) feed a short rolling
/// window of tilt angles. After the short window has rolled over once (more than
/// `short_window` consecutive eligible samples) each further eligible sample publishes
/// the short average into the long window. An out-of-band sample clears the short
/// window only. Convergence latches once the long window holds `min_published` inputs;
/// the tilt is frozen at that point and later samples no longer move it.
#[derive(Clone, Debug)]
pub struct TiltCalibrator {
    band_low: f64,
    band_high: f64,
    short_window: usize,
    min_published: usize,
    short: AngleWindow,
    long: AngleWindow,
    consecutive: usize,
    published: usize,
    frozen: Option<TiltAngles>,
}

impl TiltCalibrator {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            band_low: config.calibration_magnitude_low,
            band_high: config.calibration_magnitude_high,
            short_window: config.calibration_short_window.max(1),
            min_published: config.calibration_min_published.max(1),
            short: AngleWindow::new(config.calibration_short_window),
            long: AngleWindow::new(config.calibration_long_window),
            consecutive: 0,
            published: 0,
            frozen: None,
        }
    }

    pub fn is_eligible(&self, sample: &AccelerationSample) -> bool {
        sample.magnitude >= self.band_low && sample.magnitude <= self.band_high
    }

    /// Accumulate one sample; returns whether calibration has converged.
    pub fn calibrate(&mut self, sample: &AccelerationSample) -> bool {
        if self.frozen.is_some() {
            return true;
        }
        if self.is_eligible(sample) {
            self.short.add(TiltAngles::from_gravity(sample.x, sample.y, sample.z));
            self.consecutive += 1;
            if self.consecutive > self.short_window {
                self.long.add(self.short.average());
                self.published += 1;
            }
        } else {
            self.short.reset();
            self.consecutive = 0;
        }

        if self.published >= self.min_published {
            let tilt = self.long.average();
            log::info!(
                "Tilt calibration converged: x {:.2}°, y {:.2}°, z {:.2}°",
                tilt.x_angle,
                tilt.y_angle,
                tilt.z_angle
            );
            self.frozen = Some(tilt);
        }
        self.frozen.is_some()
    }

    pub fn is_converged(&self) -> bool {
        self.frozen.is_some()
    }

    /// Calibrated tilt; `None` before convergence.
    pub fn tilt(&self) -> Option<TiltAngles> {
        self.frozen
    }

    /// Remove the calibrated tilt from a sample; `None` before convergence.
    pub fn correct(&self, sample: &AccelerationSample) -> Option<LevelledSample> {
        let tilt = self.tilt()?;
        Some(LevelledSample { sample: compensate(sample, &tilt), tilt })
    }
}

/// Rotate a sample so the calibrated gravity direction points straight down the z axis.
///
/// Pitch is removed first (about y), then roll (about x), matching how
/// `TiltAngles::from_gravity` derives the two angles.
pub fn compensate(sample: &AccelerationSample, tilt: &TiltAngles) -> AccelerationSample {
    let pitch = Rotation3::from_axis_angle(&Vector3::y_axis(), -tilt.x_angle.to_radians());
    let roll = Rotation3::from_axis_angle(&Vector3::x_axis(), tilt.y_angle.to_radians());
    let levelled = roll * pitch * Vector3::new(sample.x, sample.y, sample.z);
    sample.with_axes(levelled.x, levelled.y, levelled.z)
}
