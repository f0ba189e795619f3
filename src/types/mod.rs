use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accelerometer sample in g-force units.
///
/// Produced by the adapter in camera axes; after the orientation lock the same struct
/// carries vehicle axes (x forward, y lateral with left positive, z up).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub magnitude: f64,
    /// Seconds on a monotonic clock
    pub timestamp: f64,
}

impl AccelerationSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            z,
            magnitude: (x * x + y * y + z * z).sqrt(),
            timestamp,
        }
    }

    /// Same sample with replaced axes; the magnitude is carried over untouched.
    pub fn with_axes(&self, x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, ..*self }
    }

    pub fn horizontal_magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AngularRate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Canonical item of the raw IMU feed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    pub acceleration: AccelerationSample,
    pub angular_rate: AngularRate,
    /// Die temperature in °C
    pub temperature: f64,
}

impl ImuRecord {
    pub fn timestamp(&self) -> f64 {
        self.acceleration.timestamp
    }
}

/// Magnetic field reading in milligauss.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MagnetometerReading {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Static mount offset relative to gravity, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TiltAngles {
    pub x_angle: f64,
    pub y_angle: f64,
    pub z_angle: f64,
}

impl TiltAngles {
    /// Tilt of a gravity-dominated reading.
    ///
    /// `x_angle` is the pitch that zeroes the forward axis, `y_angle` the roll that then
    /// zeroes the lateral axis, `z_angle` the elevation of the vertical axis above the
    /// horizontal plane (90° on a level mount).
    pub fn from_gravity(x: f64, y: f64, z: f64) -> Self {
        Self {
            x_angle: x.atan2(z).to_degrees(),
            y_angle: y.atan2(x.hypot(z)).to_degrees(),
            z_angle: z.atan2(x.hypot(y)).to_degrees(),
        }
    }
}

// ─── GNSS ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dop {
    pub gdop: f64,
    pub hdop: f64,
    pub pdop: f64,
    pub tdop: f64,
    pub vdop: f64,
    pub xdop: f64,
    pub ydop: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Satellites {
    pub seen: u32,
    pub used: u32,
}

/// Receiver RF health block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RfHealth {
    pub jamming_state: String,
    pub ant_status: String,
    pub ant_power: String,
    pub noise_per_ms: u32,
    pub agc_cnt: u32,
    pub jam_ind: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GnssFix {
    /// Seconds on the same monotonic clock as the IMU samples
    pub timestamp: f64,
    pub system_time: DateTime<Utc>,
    /// Time to first fix in milliseconds
    #[serde(default)]
    pub ttff: i64,
    pub fix: FixQuality,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub unfiltered_latitude: f64,
    #[serde(default)]
    pub unfiltered_longitude: f64,
    #[serde(rename = "height")]
    pub altitude: f64,
    pub heading: f64,
    /// Ground speed in m/s
    pub speed: f64,
    #[serde(default)]
    pub dop: Dop,
    #[serde(default)]
    pub satellites: Satellites,
    #[serde(default)]
    pub rf: Option<RfHealth>,
    #[serde(default)]
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: f64,
    #[serde(default)]
    pub speed_accuracy: f64,
    #[serde(default)]
    pub heading_accuracy: f64,
}

impl GnssFix {
    /// Minimal fix, mostly for sources that only report position and speed.
    pub fn new(timestamp: f64, latitude: f64, longitude: f64, speed: f64) -> Self {
        Self {
            timestamp,
            system_time: Utc::now(),
            ttff: 0,
            fix: FixQuality::ThreeD,
            latitude,
            longitude,
            unfiltered_latitude: latitude,
            unfiltered_longitude: longitude,
            altitude: 0.0,
            heading: 0.0,
            speed,
            dop: Dop::default(),
            satellites: Satellites::default(),
            rf: None,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
            speed_accuracy: 0.0,
            heading_accuracy: 0.0,
        }
    }

    pub fn has_fix(&self) -> bool {
        matches!(self.fix, FixQuality::TwoD | FixQuality::ThreeD)
    }
}
