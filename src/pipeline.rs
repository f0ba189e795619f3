// pipeline.rs: One tokio task per stage
//
//   ImuIngress ──raw──▶ orientation ──▶ levelling ──levelled──▶ trackers ──events──▶
//   GnssIngress ──gnss─────────────────────────────────────────────┘
//
// Feeds marked with a name are Broadcasters: external consumers subscribe to them
// before the sources start. The orientation→levelling link is point-to-point.
// A filter failure ends its stage with an error that is reported to the runner.

use std::future::Future;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::adapter::{AxisMap, GnssIngress, ImuIngress, MagnetometerIngress};
use crate::calibration::LevelledSample;
use crate::config::PipelineConfig;
use crate::engine::Leveller;
use crate::error::{PipelineError, Result};
use crate::events::DrivingEvent;
use crate::feed::Broadcaster;
use crate::orientation::{Orientation, OrientationResolver};
use crate::trackers::TrackerSet;
use crate::types::{AccelerationSample, GnssFix, ImuRecord, MagnetometerReading};

/// Every broadcaster the pipeline exposes.
#[derive(Clone)]
pub struct Feeds {
    pub raw: Broadcaster<ImuRecord>,
    pub gnss: Broadcaster<GnssFix>,
    pub magnetometer: Broadcaster<MagnetometerReading>,
    pub levelled: Broadcaster<LevelledSample>,
    pub events: Broadcaster<DrivingEvent>,
}

impl Feeds {
    fn new(config: &PipelineConfig) -> Self {
        let capacity = config.capacity();
        Self {
            raw: Broadcaster::new("raw", capacity, config.delivery),
            gnss: Broadcaster::new("gnss", capacity, config.delivery),
            magnetometer: Broadcaster::new("magnetometer", capacity, config.delivery),
            levelled: Broadcaster::new("levelled", capacity, config.delivery),
            events: Broadcaster::new("events", capacity, config.delivery),
        }
    }
}

/// Handles the sensor drivers call into.
pub struct Ingress {
    pub imu: ImuIngress,
    pub gnss: GnssIngress,
    pub magnetometer: MagnetometerIngress,
}

pub struct Pipeline {
    pub feeds: Feeds,
    ingress: Option<Ingress>,
    tasks: Vec<(String, JoinHandle<()>)>,
    failures_tx: Sender<PipelineError>,
    failures_rx: Receiver<PipelineError>,
}

impl Pipeline {
    /// Spawn the processing stages. Must be called inside a tokio runtime.
    pub fn spawn(config: PipelineConfig, axis_map: AxisMap) -> Self {
        let feeds = Feeds::new(&config);
        let (failures_tx, failures_rx) = mpsc::channel(8);
        let events_config = &config.events;

        let ingress = Ingress {
            imu: ImuIngress::new(axis_map, feeds.raw.clone()),
            gnss: GnssIngress::new(events_config, feeds.gnss.clone()),
            magnetometer: MagnetometerIngress::new(feeds.magnetometer.clone()),
        };

        let mut pipeline = Self {
            feeds: feeds.clone(),
            ingress: Some(ingress),
            tasks: Vec::new(),
            failures_tx,
            failures_rx,
        };

        // Internal subscriptions are registered before any source can publish
        let raw_rx = feeds.raw.subscribe("orientation");
        let levelled_rx = feeds.levelled.subscribe("trackers");
        let gnss_rx = feeds.gnss.subscribe("trackers");
        let (oriented_tx, oriented_rx) = mpsc::channel(config.capacity());

        let resolver = OrientationResolver::new(
            events_config.orientation_dead_zone,
            events_config.orientation_confirmation_count,
        );
        pipeline.spawn_task("orientation", orientation_stage(raw_rx, resolver, oriented_tx));
        pipeline.spawn_task(
            "levelling",
            levelling_stage(oriented_rx, Leveller::new(events_config), feeds.levelled.clone()),
        );
        pipeline.spawn_task(
            "trackers",
            tracker_stage(levelled_rx, gnss_rx, TrackerSet::new(events_config), feeds.events.clone()),
        );
        pipeline
    }

    /// Hand the ingress handles to the sensor sources. Returns `None` after the first call.
    pub fn take_ingress(&mut self) -> Option<Ingress> {
        self.ingress.take()
    }

    /// Run `fut` alongside the stages; an `Err` is reported like a stage failure.
    pub fn spawn_task<F>(&mut self, name: &str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let failures = self.failures_tx.clone();
        let stage = name.to_string();
        let handle = tokio::spawn(async move {
            match fut.await {
                Ok(()) => log::debug!("[{}] finished", stage),
                Err(e) => {
                    log::error!("[{}] failed: {}", stage, e);
                    let _ = failures.send(e).await;
                }
            }
        });
        self.tasks.push((name.to_string(), handle));
    }

    /// Resolves when any stage or spawned task fails.
    pub async fn next_failure(&mut self) -> Option<PipelineError> {
        self.failures_rx.recv().await
    }

    /// Close the inbound feeds, let every stage drain, and join them. Returns the first
    /// failure reported during the run, if any.
    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.ingress.take());
        self.feeds.raw.close();
        self.feeds.gnss.close();
        self.feeds.magnetometer.close();

        let mut first: Option<PipelineError> = None;
        for (name, handle) in self.tasks.drain(..) {
            if handle.await.is_err() && first.is_none() {
                first = Some(PipelineError::StagePanicked(name));
            }
        }
        self.feeds.levelled.close();
        self.feeds.events.close();

        if let Ok(e) = self.failures_rx.try_recv() {
            return Err(e);
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn orientation_stage(
    mut raw: Receiver<ImuRecord>,
    mut resolver: OrientationResolver,
    oriented: Sender<AccelerationSample>,
) -> Result<()> {
    while let Some(record) = raw.recv().await {
        if resolver.resolve(&record.acceleration) == Orientation::Unset {
            continue;
        }
        let Some(sample) = resolver.remap(&record.acceleration) else {
            continue;
        };
        if oriented.send(sample).await.is_err() {
            log::info!("[orientation] levelling stage gone, stopping");
            break;
        }
    }
    Ok(())
}

async fn levelling_stage(
    mut oriented: Receiver<AccelerationSample>,
    mut leveller: Leveller,
    levelled: Broadcaster<LevelledSample>,
) -> Result<()> {
    let mut result = Ok(());
    while let Some(sample) = oriented.recv().await {
        match leveller.level(&sample) {
            Ok(Some(out)) => {
                levelled.publish(out).await;
            }
            Ok(None) => {}
            Err(e) => {
                result = Err(PipelineError::from(e));
                break;
            }
        }
    }
    levelled.close();
    result
}

async fn tracker_stage(
    mut levelled: Receiver<LevelledSample>,
    mut gnss: Receiver<GnssFix>,
    mut trackers: TrackerSet,
    events: Broadcaster<DrivingEvent>,
) -> Result<()> {
    let mut last_gnss: Option<GnssFix> = None;
    let mut gnss_open = true;

    loop {
        tokio::select! {
            biased;
            fix = gnss.recv(), if gnss_open => match fix {
                Some(fix) => last_gnss = Some(fix),
                None => gnss_open = false,
            },
            sample = levelled.recv() => match sample {
                Some(sample) => {
                    for event in trackers.track_all(&sample.sample, last_gnss.as_ref()) {
                        log::info!("{} at {:.3}s", event.name, event.timestamp);
                        events.publish(event).await;
                    }
                }
                None => break,
            },
        }
    }
    events.close();
    Ok(())
}
