use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use drive_events_rs::adapter::{AxisMap, DEFAULT_AXIS_MAP, DEFAULT_INVERTED_AXES};
use drive_events_rs::config::{DeliveryPolicy, EventConfig, PipelineConfig};
use drive_events_rs::events::Record;
use drive_events_rs::feed::{LatestPairer, Merger};
use drive_events_rs::live_status::LiveStatus;
use drive_events_rs::pipeline::Pipeline;
use drive_events_rs::sensors::{self, DriveScript};
use drive_events_rs::sink::{JsonFileSink, RecordSink};

#[derive(Parser, Debug)]
#[command(name = "drive_events")]
#[command(about = "Real-time driving event detection from IMU and GNSS feeds", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Threshold config (JSON); defaults are used when missing or invalid
    #[arg(long, default_value = "drive-events.json")]
    config: PathBuf,

    /// Output directory
    #[arg(long, default_value = "drive_events_sessions")]
    output_dir: PathBuf,

    /// Device to camera axis mapping
    #[arg(long, default_value = DEFAULT_AXIS_MAP)]
    axis_map: String,

    /// Camera axis inversions
    #[arg(long, default_value = DEFAULT_INVERTED_AXES)]
    inverted_axes: String,

    /// Subscriber delivery policy (block, drop_newest)
    #[arg(long, default_value = "block")]
    delivery: DeliveryPolicy,

    /// Queue depth of every stage link and subscription
    #[arg(long, default_value = "1")]
    channel_capacity: usize,

    /// Milliseconds between IMU samples
    #[arg(long, default_value = "25")]
    imu_interval_ms: u64,

    /// Milliseconds between GNSS fixes
    #[arg(long, default_value = "1000")]
    gnss_interval_ms: u64,

    /// Milliseconds between magnetometer readings
    #[arg(long, default_value = "100")]
    mag_interval_ms: u64,

    /// Seconds between JSON batch files
    #[arg(long, default_value = "15")]
    save_interval: u64,

    /// Forward pitch of the simulated mount in degrees
    #[arg(long, default_value = "6.0")]
    mount_pitch: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("Drive events starting at {}", Utc::now().to_rfc3339());
    log::info!("  Duration: {} seconds (0=continuous)", args.duration);
    log::info!("  Output Dir: {}", args.output_dir.display());
    log::info!("  Delivery: {:?}, capacity {}", args.delivery, args.channel_capacity);

    let axis_map = AxisMap::parse(&args.axis_map, &args.inverted_axes).context("parsing axis map")?;
    let config = PipelineConfig {
        events: EventConfig::load_or_default(&args.config),
        channel_capacity: args.channel_capacity,
        delivery: args.delivery,
    };

    let session_dir = args.output_dir.join(Utc::now().format("%Y%m%d_%H%M%S").to_string());
    let mut sink = JsonFileSink::create(&session_dir, Duration::from_secs(args.save_interval))?;
    let status_path = session_dir.join("live_status.json");
    let mut status = LiveStatus::new();

    let mut pipeline = Pipeline::spawn(config.clone(), axis_map);

    // Downstream subscribers go in before the sources start publishing
    let mut merger: Merger<Record> = Merger::new(config.capacity());
    merger.add(pipeline.feeds.raw.subscribe("merge"));
    merger.add(pipeline.feeds.gnss.subscribe("merge"));
    merger.add(pipeline.feeds.magnetometer.subscribe("merge"));
    merger.add(pipeline.feeds.events.subscribe("merge"));
    let mut merged = merger.into_stream();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingress = pipeline.take_ingress().context("ingress already taken")?;
    let script = DriveScript { mount_pitch_deg: args.mount_pitch };
    pipeline.spawn_task(
        "imu_source",
        sensors::simulated_imu_loop(
            ingress.imu,
            script,
            Duration::from_millis(args.imu_interval_ms),
            shutdown_rx.clone(),
        ),
    );
    pipeline.spawn_task(
        "gnss_source",
        sensors::simulated_gnss_loop(
            ingress.gnss,
            script,
            Duration::from_millis(args.gnss_interval_ms),
            shutdown_rx.clone(),
        ),
    );
    pipeline.spawn_task(
        "magnetometer_source",
        sensors::simulated_magnetometer_loop(
            ingress.magnetometer,
            Duration::from_millis(args.mag_interval_ms),
            shutdown_rx,
        ),
    );

    let mut pairer = LatestPairer::new();
    let mut status_tick = interval(Duration::from_secs(2));
    let deadline = sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut fatal = None;

    loop {
        tokio::select! {
            record = merged.recv() => match record {
                Some(record) => {
                    status.observe(&record);
                    if let Record::Driving(event) = &record {
                        log::info!("{} at {:.2}s (duration {:?}, speed {:?})",
                            event.name, event.timestamp, event.duration, event.speed);
                    }
                    if let Some(paired) = pairer.observe(record) {
                        sink.log(&paired)?;
                    }
                }
                None => break,
            },
            failure = pipeline.next_failure() => {
                fatal = failure;
                break;
            }
            _ = &mut ctrl_c => {
                log::info!("Interrupted, stopping...");
                break;
            }
            _ = &mut deadline, if args.duration > 0 => {
                log::info!("Duration reached, stopping...");
                break;
            }
            _ = status_tick.tick() => {
                if let Err(e) = status.save(&status_path) {
                    log::warn!("Failed to save live status: {}", e);
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    drop(merged);
    sink.flush()?;
    status.save(&status_path)?;
    let joined = pipeline.shutdown().await;

    if let Some(e) = fatal {
        log::error!("Pipeline aborted: {}", e);
        return Err(e.into());
    }
    joined?;

    log::info!(
        "Done: {} IMU samples, {} GNSS fixes, {} driving events, {} files in {}",
        status.imu_samples,
        status.gnss_fixes,
        status.driving_events,
        sink.files_written(),
        session_dir.display()
    );
    Ok(())
}
