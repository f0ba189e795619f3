use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::feed::PairedRecord;

/// Logging collaborator: receives every finished record.
pub trait RecordSink {
    fn log(&mut self, record: &PairedRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataWrapper {
    pub time: DateTime<Utc>,
    pub data: PairedRecord,
}

/// Buffers records and writes one JSON array per save interval, named after the wall
/// time of its first entry. `latest.json` always holds the most recent batch.
pub struct JsonFileSink {
    dest: PathBuf,
    save_interval: Duration,
    entries: Vec<DataWrapper>,
    last_save: Instant,
    files_written: usize,
}

impl JsonFileSink {
    pub fn create(dest: &Path, save_interval: Duration) -> Result<Self> {
        fs::create_dir_all(dest)?;
        let latest = dest.join("latest.json");
        if latest.exists() {
            fs::remove_file(&latest)?;
            log::debug!("Removed stale {}", latest.display());
        }
        log::info!("JSON sink at {} (save every {:?})", dest.display(), save_interval);
        Ok(Self {
            dest: dest.to_path_buf(),
            save_interval,
            entries: Vec::new(),
            last_save: Instant::now(),
            files_written: 0,
        })
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn files_written(&self) -> usize {
        self.files_written
    }

    fn file_name(first: &DateTime<Utc>) -> String {
        format!("{}.json", first.format("%Y-%m-%dT%H-%M-%S%.3fZ"))
    }
}

impl RecordSink for JsonFileSink {
    fn log(&mut self, record: &PairedRecord) -> Result<()> {
        self.entries.push(DataWrapper { time: Utc::now(), data: record.clone() });
        if self.last_save.elapsed() >= self.save_interval {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.last_save = Instant::now();
        let Some(first) = self.entries.first().map(|e| e.time) else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&self.entries)?;
        let path = self.dest.join(Self::file_name(&first));
        fs::write(&path, &json)?;
        fs::write(self.dest.join("latest.json"), &json)?;
        log::debug!("Saved {} records to {}", self.entries.len(), path.display());

        self.entries.clear();
        self.files_written += 1;
        Ok(())
    }
}
