use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::json;

use drive_events_rs::adapter::{AxisMap, DEFAULT_AXIS_MAP, DEFAULT_INVERTED_AXES};
use drive_events_rs::config::EventConfig;
use drive_events_rs::engine::DriveEngine;
use drive_events_rs::events::DrivingEvent;
use drive_events_rs::types::GnssFix;

/// Offline replay of a recorded drive through the synchronous detection chain.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded drive (.json or .json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Threshold config (JSON); defaults are used when missing or invalid
    #[arg(long, default_value = "drive-events.json")]
    config: PathBuf,

    /// Device to camera axis mapping
    #[arg(long, default_value = DEFAULT_AXIS_MAP)]
    axis_map: String,

    /// Camera axis inversions
    #[arg(long, default_value = DEFAULT_INVERTED_AXES)]
    inverted_axes: String,

    /// Multiplier converting logged acceleration to g (e.g. 0.102 for m/s²)
    #[arg(long, default_value = "1.0")]
    accel_scale: f64,
}

#[derive(Deserialize)]
struct AxisData {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize)]
struct GpsData {
    timestamp: f64,
    latitude: f64,
    longitude: f64,
    speed: f64,
    #[serde(default)]
    bearing: f64,
    #[serde(default)]
    accuracy: f64,
}

#[derive(Deserialize)]
struct Reading {
    timestamp: f64,
    accel: Option<AxisData>,
    gyro: Option<AxisData>,
    #[serde(default)]
    temperature: f64,
    gps: Option<GpsData>,
}

#[derive(Deserialize)]
struct LogFile {
    readings: Vec<Reading>,
}

fn load_log(path: &Path) -> anyhow::Result<LogFile> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let reader = BufReader::new(GzDecoder::new(file));
        Ok(serde_json::from_reader(reader)?)
    } else {
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

fn run(args: &Args) -> anyhow::Result<serde_json::Value> {
    let log = load_log(&args.log)?;
    let config = EventConfig::load_or_default(&args.config);
    let axis_map = AxisMap::parse(&args.axis_map, &args.inverted_axes)?;
    let mut engine = DriveEngine::new(&config);

    let mut events: Vec<DrivingEvent> = Vec::new();
    let mut imu_samples = 0usize;
    let mut gnss_fixes = 0usize;

    for r in &log.readings {
        if let Some(gps) = &r.gps {
            let mut fix = GnssFix::new(gps.timestamp, gps.latitude, gps.longitude, gps.speed);
            fix.heading = gps.bearing;
            fix.horizontal_accuracy = gps.accuracy;
            engine.feed_gnss(fix)?;
            gnss_fixes += 1;
        }
        if let Some(acc) = &r.accel {
            let s = args.accel_scale;
            let rate = r.gyro.as_ref().map(|g| [g.x, g.y, g.z]).unwrap_or([0.0; 3]);
            let record = axis_map.record([acc.x * s, acc.y * s, acc.z * s], rate, r.temperature, r.timestamp);
            events.extend(engine.feed_imu(&record)?);
            imu_samples += 1;
        }
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for e in &events {
        *counts.entry(e.name.as_str()).or_insert(0) += 1;
    }

    Ok(json!({
        "log": args.log.display().to_string(),
        "imu_samples": imu_samples,
        "gnss_fixes": gnss_fixes,
        "orientation": engine.orientation().map(|o| format!("{:?}", o)),
        "calibrated": engine.is_calibrated(),
        "tilt": engine.tilt(),
        "event_counts": counts,
        "events": events,
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let result = run(&args)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
