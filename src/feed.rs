// feed.rs: Named-subscriber broadcast, N-to-1 merge and latest-value pairing
//
// A producer owns one Broadcaster per output type. Each subscriber gets a dedicated
// bounded tokio channel; with DeliveryPolicy::Block a publish waits until every
// subscriber has room, so backpressure propagates to the producer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::config::DeliveryPolicy;
use crate::events::Record;
use crate::types::{GnssFix, ImuRecord};

// ─── Broadcast ───────────────────────────────────────────────────────────────

type Registry<T> = Arc<Mutex<BTreeMap<String, Sender<T>>>>;

#[derive(Clone)]
pub struct Broadcaster<T> {
    name: String,
    subscribers: Registry<T>,
    capacity: usize,
    policy: DeliveryPolicy,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new(name: &str, capacity: usize, policy: DeliveryPolicy) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Arc::new(Mutex::new(BTreeMap::new())),
            capacity: capacity.max(1),
            policy,
        }
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<String, Sender<T>>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `name` and return its dedicated channel. Re-subscribing a name
    /// replaces (and closes) the previous channel.
    pub fn subscribe(&self, name: &str) -> Receiver<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.registry().insert(name.to_string(), tx).is_some() {
            log::warn!("[{}] subscriber {} replaced", self.name, name);
        }
        rx
    }

    pub fn unsubscribe(&self, name: &str) -> bool {
        self.registry().remove(name).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drop every subscriber channel; receivers drain what is queued, then see `None`.
    pub fn close(&self) {
        self.registry().clear();
    }

    /// Deliver `item` to every subscriber; returns how many received it.
    ///
    /// Subscribers whose receiver was dropped are pruned from the registry.
    pub async fn publish(&self, item: T) -> usize {
        let targets: Vec<(String, Sender<T>)> = self
            .registry()
            .iter()
            .map(|(name, tx)| (name.clone(), tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (name, tx) in targets {
            match self.policy {
                DeliveryPolicy::Block => match tx.send(item.clone()).await {
                    Ok(()) => delivered += 1,
                    Err(_) => closed.push(name),
                },
                DeliveryPolicy::DropNewest => match tx.try_send(item.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        log::debug!("[{}] subscriber {} full, item dropped", self.name, name);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(name),
                },
            }
        }

        if !closed.is_empty() {
            let mut registry = self.registry();
            for name in closed {
                // only prune if the entry was not replaced in the meantime
                if registry.get(&name).map(|tx| tx.is_closed()).unwrap_or(false) {
                    registry.remove(&name);
                    log::info!("[{}] subscriber {} closed", self.name, name);
                }
            }
        }
        delivered
    }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Forwards any number of upstream channels into one downstream channel in arrival
/// order. The merged stream closes once every upstream has closed.
pub struct Merger<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    forwarders: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Merger<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx, forwarders: Vec::new() }
    }

    /// Spawn a forwarder for `upstream`. Must be called inside a tokio runtime.
    pub fn add<S>(&mut self, mut upstream: Receiver<S>)
    where
        S: Into<T> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(item) = upstream.recv().await {
                if tx.send(item.into()).await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn inputs(&self) -> usize {
        self.forwarders.len()
    }

    pub fn into_stream(self) -> Receiver<T> {
        drop(self.tx);
        self.rx
    }
}

// ─── Latest-value pairing ────────────────────────────────────────────────────

/// A merged record together with the freshest IMU and GNSS context at arrival time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairedRecord {
    pub record: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imu: Option<ImuRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnss: Option<GnssFix>,
}

/// Caches the last IMU record and GNSS fix seen on a merged stream. GNSS fixes only
/// refresh the cache; every other record is paired with the cache, however stale.
#[derive(Clone, Debug, Default)]
pub struct LatestPairer {
    last_imu: Option<ImuRecord>,
    last_gnss: Option<GnssFix>,
}

impl LatestPairer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: Record) -> Option<PairedRecord> {
        match record {
            Record::Gnss(fix) => {
                self.last_gnss = Some(fix);
                None
            }
            Record::Imu(imu) => {
                self.last_imu = Some(imu);
                Some(PairedRecord { record, imu: None, gnss: self.last_gnss.clone() })
            }
            Record::Magnetometer(_) | Record::Driving(_) => Some(PairedRecord {
                record,
                imu: self.last_imu,
                gnss: self.last_gnss.clone(),
            }),
        }
    }

    pub fn last_gnss(&self) -> Option<&GnssFix> {
        self.last_gnss.as_ref()
    }
}
