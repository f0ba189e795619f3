// adapter.rs: Device readings in, canonical records out
//
// The device drivers hand over already-decoded readings. The adapter maps device
// axes onto camera axes, stamps the record, and publishes it on the matching feed.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::EventConfig;
use crate::error::{ConfigError, FilterError};
use crate::feed::Broadcaster;
use crate::filters::{PositionSmoother, ScalarModel};
use crate::types::{AccelerationSample, AngularRate, GnssFix, ImuRecord, MagnetometerReading};

pub const DEFAULT_AXIS_MAP: &str = "CamX:Z,CamY:X,CamZ:Y";
pub const DEFAULT_INVERTED_AXES: &str = "X:false,Y:false,Z:false";

// ─── Axis mapping ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl FromStr for Axis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Axis::X),
            "Y" | "y" => Ok(Axis::Y),
            "Z" | "z" => Ok(Axis::Z),
            other => Err(ConfigError::InvalidAxisMap(other.to_string())),
        }
    }
}

/// Which device axis feeds each camera axis, and whether the camera axis is negated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMap {
    pub cam_x: Axis,
    pub cam_y: Axis,
    pub cam_z: Axis,
    pub invert_x: bool,
    pub invert_y: bool,
    pub invert_z: bool,
}

impl Default for AxisMap {
    fn default() -> Self {
        Self::identity()
    }
}

fn split_pairs(list: &str) -> Option<Vec<(&str, &str)>> {
    list.split(',')
        .map(|entry| {
            let mut parts = entry.trim().split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(v), None) => Some((k.trim(), v.trim())),
                _ => None,
            }
        })
        .collect()
}

impl AxisMap {
    pub fn identity() -> Self {
        Self {
            cam_x: Axis::X,
            cam_y: Axis::Y,
            cam_z: Axis::Z,
            invert_x: false,
            invert_y: false,
            invert_z: false,
        }
    }

    /// Parse `"CamX:Z,CamY:X,CamZ:Y"` and `"X:false,Y:true,Z:false"`.
    pub fn parse(mapping: &str, inverted: &str) -> Result<Self, ConfigError> {
        let pairs = split_pairs(mapping)
            .filter(|p| p.len() == 3)
            .ok_or_else(|| ConfigError::InvalidAxisMap(mapping.to_string()))?;

        let mut map = Self::identity();
        for (key, value) in pairs {
            let axis: Axis = value.parse()?;
            match key {
                "CamX" => map.cam_x = axis,
                "CamY" => map.cam_y = axis,
                "CamZ" => map.cam_z = axis,
                other => return Err(ConfigError::InvalidAxisMap(other.to_string())),
            }
        }

        let flags = split_pairs(inverted)
            .filter(|p| p.len() == 3)
            .ok_or_else(|| ConfigError::InvalidInversion(inverted.to_string()))?;
        for (key, value) in flags {
            let flag: bool = value
                .parse()
                .map_err(|_| ConfigError::InvalidInversion(value.to_string()))?;
            match key.parse::<Axis>() {
                Ok(Axis::X) => map.invert_x = flag,
                Ok(Axis::Y) => map.invert_y = flag,
                Ok(Axis::Z) => map.invert_z = flag,
                Err(_) => return Err(ConfigError::InvalidInversion(key.to_string())),
            }
        }
        Ok(map)
    }

    fn sign(inverted: bool) -> f64 {
        if inverted {
            -1.0
        } else {
            1.0
        }
    }

    /// Device axes to camera axes.
    pub fn apply(&self, device: [f64; 3]) -> [f64; 3] {
        [
            device[self.cam_x.index()] * Self::sign(self.invert_x),
            device[self.cam_y.index()] * Self::sign(self.invert_y),
            device[self.cam_z.index()] * Self::sign(self.invert_z),
        ]
    }

    /// Camera axes back to device axes.
    pub fn to_device(&self, camera: [f64; 3]) -> [f64; 3] {
        let mut device = [0.0; 3];
        device[self.cam_x.index()] = camera[0] * Self::sign(self.invert_x);
        device[self.cam_y.index()] = camera[1] * Self::sign(self.invert_y);
        device[self.cam_z.index()] = camera[2] * Self::sign(self.invert_z);
        device
    }

    pub fn record(
        &self,
        acceleration: [f64; 3],
        angular_rate: [f64; 3],
        temperature: f64,
        timestamp: f64,
    ) -> ImuRecord {
        let [x, y, z] = self.apply(acceleration);
        let [gx, gy, gz] = self.apply(angular_rate);
        ImuRecord {
            acceleration: AccelerationSample::new(x, y, z, timestamp),
            angular_rate: AngularRate { x: gx, y: gy, z: gz },
            temperature,
        }
    }
}

// ─── Inbound contracts ───────────────────────────────────────────────────────

/// Called once per IMU sampling tick by the device driver.
#[derive(Clone)]
pub struct ImuIngress {
    axis_map: AxisMap,
    raw: Broadcaster<ImuRecord>,
}

impl ImuIngress {
    pub fn new(axis_map: AxisMap, raw: Broadcaster<ImuRecord>) -> Self {
        Self { axis_map, raw }
    }

    /// Normalise one device reading and publish it; returns the subscriber count reached.
    pub async fn handle(
        &self,
        acceleration: [f64; 3],
        angular_rate: [f64; 3],
        temperature: f64,
        timestamp: f64,
    ) -> usize {
        let record = self.axis_map.record(acceleration, angular_rate, temperature, timestamp);
        self.raw.publish(record).await
    }

    pub fn axis_map(&self) -> &AxisMap {
        &self.axis_map
    }
}

/// Called on each resolved GNSS fix. Position is smoothed before publication.
pub struct GnssIngress {
    smoother: PositionSmoother,
    feed: Broadcaster<GnssFix>,
}

impl GnssIngress {
    pub fn new(config: &EventConfig, feed: Broadcaster<GnssFix>) -> Self {
        let model = ScalarModel::new(config.process_variance, config.observation_variance);
        Self { smoother: PositionSmoother::new(model), feed }
    }

    pub async fn handle(&mut self, fix: GnssFix) -> Result<usize, FilterError> {
        let fix = self.smoother.update(fix)?;
        Ok(self.feed.publish(fix).await)
    }
}

#[derive(Clone)]
pub struct MagnetometerIngress {
    feed: Broadcaster<MagnetometerReading>,
}

impl MagnetometerIngress {
    pub fn new(feed: Broadcaster<MagnetometerReading>) -> Self {
        Self { feed }
    }

    pub async fn handle(&self, reading: MagnetometerReading) -> usize {
        self.feed.publish(reading).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryPolicy;

    #[test]
    fn test_parse_valid_map() {
        let map = AxisMap::parse("CamX:Y,CamY:Z,CamZ:X", "X:false,Y:true,Z:false").unwrap();
        assert_eq!(map.cam_x, Axis::Y);
        assert_eq!(map.cam_y, Axis::Z);
        assert_eq!(map.cam_z, Axis::X);
        assert!(map.invert_y);
        assert!(!map.invert_x);
    }

    #[test]
    fn test_parse_rejects_bad_separators() {
        assert!(AxisMap::parse("CamX:X CamY:Y CamZ:Z", DEFAULT_INVERTED_AXES).is_err());
        assert!(AxisMap::parse("CamX-X,CamY-Y,CamZ-Z", DEFAULT_INVERTED_AXES).is_err());
        assert!(AxisMap::parse("CamX:X:X,CamY:Y:Y,CamZ:Z:Z", DEFAULT_INVERTED_AXES).is_err());
        assert!(AxisMap::parse(DEFAULT_AXIS_MAP, "X-false,Y-false,Z-false").is_err());
        assert!(AxisMap::parse(DEFAULT_AXIS_MAP, "X:maybe,Y:false,Z:false").is_err());
    }

    #[test]
    fn test_apply_and_invert() {
        let map = AxisMap::parse(DEFAULT_AXIS_MAP, "X:true,Y:false,Z:false").unwrap();
        let camera = map.apply([1.0, 2.0, 3.0]);
        assert_eq!(camera, [-3.0, 1.0, 2.0]);
        assert_eq!(map.to_device(camera), [1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_ingress_publishes_camera_axes() {
        let raw = Broadcaster::new("raw", 4, DeliveryPolicy::Block);
        let mut rx = raw.subscribe("test");
        let map = AxisMap::parse(DEFAULT_AXIS_MAP, DEFAULT_INVERTED_AXES).unwrap();
        let ingress = ImuIngress::new(map, raw);

        assert_eq!(ingress.handle([1.0, 0.0, 0.0], [0.0, 0.0, 5.0], 31.5, 2.0).await, 1);
        let record = rx.recv().await.unwrap();
        assert_eq!(record.acceleration.z, 0.0);
        assert_eq!(record.acceleration.y, 1.0);
        assert_eq!(record.angular_rate.x, 5.0);
        assert_eq!(record.temperature, 31.5);
        assert_eq!(record.timestamp(), 2.0);
    }

    #[tokio::test]
    async fn test_gnss_ingress_smooths() {
        let feed = Broadcaster::new("gnss", 4, DeliveryPolicy::Block);
        let mut rx = feed.subscribe("test");
        let mut ingress = GnssIngress::new(&EventConfig::default(), feed);
        ingress.handle(GnssFix::new(0.0, 45.0, -73.0, 0.0)).await.unwrap();
        ingress.handle(GnssFix::new(1.0, 45.002, -73.0, 0.0)).await.unwrap();
        rx.recv().await.unwrap();
        let smoothed = rx.recv().await.unwrap();
        assert_eq!(smoothed.unfiltered_latitude, 45.002);
        assert!(smoothed.latitude < 45.002);
    }

    #[tokio::test]
    async fn test_gnss_ingress_surfaces_time_reversal() {
        let feed = Broadcaster::new("gnss", 4, DeliveryPolicy::Block);
        let mut ingress = GnssIngress::new(&EventConfig::default(), feed);
        ingress.handle(GnssFix::new(5.0, 45.0, -73.0, 0.0)).await.unwrap();
        assert!(ingress.handle(GnssFix::new(4.0, 45.0, -73.0, 0.0)).await.is_err());
    }
}
