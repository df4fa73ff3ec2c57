use crate::api_types::Vehicle;
use crate::state::VehicleSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

const HISTORY_FILE: &str = "status_history.bin";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub timestamp: DateTime<Utc>,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleRecord {
    pub timestamp: DateTime<Utc>,
    pub vehicle: Vehicle,
}

/// Bounded log of applied snapshots, oldest first.
pub struct StatusHistory {
    entries: Mutex<VecDeque<StatusEntry>>,
    limit: usize,
}

impl StatusHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, snapshot: &VehicleSnapshot) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(StatusEntry {
            timestamp: snapshot.fetched_at,
            vehicles: snapshot.vehicles.clone(),
        });
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vehicle_history(&self, vehicle_id: &str, since: DateTime<Utc>) -> Vec<VehicleRecord> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| e.timestamp >= since)
            .filter_map(|e| {
                e.vehicles
                    .iter()
                    .find(|v| v.vehicle_id == vehicle_id)
                    .map(|v| VehicleRecord {
                        timestamp: e.timestamp,
                        vehicle: v.clone(),
                    })
            })
            .collect()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;

        let entries: Vec<StatusEntry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();

        // Write to a sibling file first so a crash never leaves a torn history.
        let path = dir.join(HISTORY_FILE);
        let tmp = dir.join(format!("{}.tmp", HISTORY_FILE));
        let f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut writer = BufWriter::new(f);
        bincode::serialize_into(&mut writer, &entries)?;
        writer.flush()?;
        std::fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;

        Ok(())
    }

    /// Loads a previously saved history. A missing file is not an error.
    pub fn load(&self, dir: &Path) -> Result<()> {
        let path = dir.join(HISTORY_FILE);
        if !path.exists() {
            return Ok(());
        }

        let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let loaded: Vec<StatusEntry> = bincode::deserialize_from(BufReader::new(f))
            .with_context(|| format!("decoding {}", path.display()))?;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(loaded);
        while entries.len() > self.limit {
            entries.pop_front();
        }
        info!(entries = entries.len(), "loaded status history from disk");

        Ok(())
    }
}
