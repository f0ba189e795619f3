// sensors.rs: Simulated sensor sources
//
// Stand-ins for the device drivers: each loop sleeps a fixed interval, builds a
// reading from a scripted drive, and hands it to its ingress. No rate adaptation.

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};

use crate::adapter::{GnssIngress, ImuIngress, MagnetometerIngress};
use crate::error::Result;
use crate::trackers::longitudinal::STANDARD_GRAVITY;
use crate::types::{FixQuality, GnssFix, MagnetometerReading, Satellites};

const WARM_UP_SECS: f64 = 5.0;
const CYCLE_SECS: f64 = 40.0;
const CRUISE_SPEED: f64 = 0.3 * STANDARD_GRAVITY * 4.0;
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Repeating drive: pull away, left turn, right turn, brake to a standstill.
#[derive(Clone, Copy, Debug)]
pub struct DriveScript {
    /// Forward pitch of the mount in degrees
    pub mount_pitch_deg: f64,
}

impl Default for DriveScript {
    fn default() -> Self {
        Self { mount_pitch_deg: 6.0 }
    }
}

impl DriveScript {
    fn phase(t: f64) -> Option<f64> {
        (t >= WARM_UP_SECS).then(|| (t - WARM_UP_SECS) % CYCLE_SECS)
    }

    /// Vehicle-frame (forward, lateral) acceleration in g at `t` seconds.
    pub fn acceleration(&self, t: f64) -> (f64, f64) {
        match Self::phase(t) {
            Some(p) if p < 4.0 => (0.3, 0.0),
            Some(p) if (10.0..13.0).contains(&p) => (0.0, 0.3),
            Some(p) if (18.0..21.0).contains(&p) => (0.0, -0.3),
            Some(p) if (26.0..29.0).contains(&p) => (-0.35, 0.0),
            _ => (0.0, 0.0),
        }
    }

    /// Ground speed in m/s at `t` seconds.
    pub fn speed(&self, t: f64) -> f64 {
        match Self::phase(t) {
            Some(p) if p < 4.0 => 0.3 * STANDARD_GRAVITY * p,
            Some(p) if p < 26.0 => CRUISE_SPEED,
            Some(p) if p < 29.0 => (CRUISE_SPEED - 0.35 * STANDARD_GRAVITY * (p - 26.0)).max(0.0),
            _ => 0.0,
        }
    }

    /// Camera-frame reading of the scripted vehicle acceleration plus gravity.
    pub fn camera_reading(&self, t: f64) -> [f64; 3] {
        let (ax, ay) = self.acceleration(t);
        let pitch = self.mount_pitch_deg.to_radians();
        // deterministic road vibration
        let vibration = 0.004 * (t * 37.0).sin();
        let vz = 1.0 + vibration;
        [
            ax * pitch.cos() + vz * pitch.sin(),
            ay + 0.5 * vibration,
            -ax * pitch.sin() + vz * pitch.cos(),
        ]
    }
}

pub async fn simulated_imu_loop(
    ingress: ImuIngress,
    script: DriveScript,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let start = Instant::now();
    let mut sample_count = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(interval) => {}
        }

        let t = start.elapsed().as_secs_f64();
        let device = ingress.axis_map().to_device(script.camera_reading(t));
        ingress.handle(device, [0.0; 3], 32.0, t).await;

        sample_count += 1;
        if sample_count % 1000 == 0 {
            log::debug!("[imu] {} samples", sample_count);
        }
    }
    log::info!("[imu] stopped after {} samples", sample_count);
    Ok(())
}

pub async fn simulated_gnss_loop(
    mut ingress: GnssIngress,
    script: DriveScript,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let start = Instant::now();
    let (mut latitude, longitude) = (45.5017, -73.5673);
    let mut last_t = 0.0;
    let mut fix_count = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(interval) => {}
        }

        let t = start.elapsed().as_secs_f64();
        let speed = script.speed(t);
        latitude += speed * (t - last_t) / METERS_PER_DEGREE;
        last_t = t;

        let mut fix = GnssFix::new(t, latitude, longitude, speed);
        fix.system_time = Utc::now();
        fix.fix = FixQuality::ThreeD;
        fix.satellites = Satellites { seen: 18, used: 11 };
        fix.horizontal_accuracy = 2.5;
        ingress.handle(fix).await?;

        fix_count += 1;
        log::debug!("[gnss] {} fixes", fix_count);
    }
    log::info!("[gnss] stopped after {} fixes", fix_count);
    Ok(())
}

pub async fn simulated_magnetometer_loop(
    ingress: MagnetometerIngress,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let start = Instant::now();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(interval) => {}
        }
        let t = start.elapsed().as_secs_f64();
        ingress
            .handle(MagnetometerReading { timestamp: t, x: 180.0, y: -42.0, z: 410.0 })
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_warm_up_is_stationary() {
        let script = DriveScript::default();
        assert_eq!(script.acceleration(1.0), (0.0, 0.0));
        assert_eq!(script.speed(1.0), 0.0);
    }

    #[test]
    fn test_cruise_speed_after_pull_away() {
        let script = DriveScript::default();
        assert_relative_eq!(script.speed(WARM_UP_SECS + 8.0), CRUISE_SPEED);
        assert_eq!(script.acceleration(WARM_UP_SECS + 11.0), (0.0, 0.3));
    }

    #[test]
    fn test_camera_reading_is_pitched_gravity_at_rest() {
        let script = DriveScript { mount_pitch_deg: 6.0 };
        let [x, _, z] = script.camera_reading(0.0);
        assert_relative_eq!(x, 6.0_f64.to_radians().sin(), epsilon = 1e-12);
        assert_relative_eq!(z, 6.0_f64.to_radians().cos(), epsilon = 1e-12);
    }
}
