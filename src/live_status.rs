use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::events::Record;

/// Snapshot of what the running pipeline has seen, saved periodically for dashboards.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub started_at: f64,
    pub uptime_seconds: u64,
    pub imu_samples: u64,
    pub gnss_fixes: u64,
    pub magnetometer_readings: u64,
    pub driving_events: u64,
    pub events_by_name: BTreeMap<String, u64>,
    pub last_event: Option<String>,
    // GNSS
    pub gnss_has_fix: bool,
    pub gnss_speed: f64,
    pub gnss_lat: f64,
    pub gnss_lon: f64,
    pub gnss_satellites_used: u32,
}

impl LiveStatus {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self { timestamp: now, started_at: now, ..Self::default() }
    }

    pub fn observe(&mut self, record: &Record) {
        match record {
            Record::Imu(_) => self.imu_samples += 1,
            Record::Magnetometer(_) => self.magnetometer_readings += 1,
            Record::Gnss(fix) => {
                self.gnss_fixes += 1;
                self.gnss_has_fix = fix.has_fix();
                self.gnss_speed = fix.speed;
                self.gnss_lat = fix.latitude;
                self.gnss_lon = fix.longitude;
                self.gnss_satellites_used = fix.satellites.used;
            }
            Record::Driving(event) => {
                self.driving_events += 1;
                *self.events_by_name.entry(event.name.clone()).or_insert(0) += 1;
                self.last_event = Some(event.name.clone());
            }
        }
    }

    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        self.timestamp = current_timestamp();
        self.uptime_seconds = (self.timestamp - self.started_at).max(0.0) as u64;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
