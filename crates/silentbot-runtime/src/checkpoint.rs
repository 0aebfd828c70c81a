//! Durable snapshot of everything the bot must not forget across restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use silentbot_core::{Error, Result};
use silentbot_curation::EligibilityState;
use silentbot_scheduler::QueueSnapshot;

use crate::ingest::BlockCursor;
use crate::tally::DaySummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cursor: BlockCursor,
    #[serde(default)]
    pub queues: BTreeMap<String, QueueSnapshot>,
    #[serde(default)]
    pub eligibility: EligibilityState,
    /// The running day's tally.
    #[serde(default)]
    pub tally: DaySummary,
}

impl Checkpoint {
    pub fn new(cursor: BlockCursor) -> Self {
        Self {
            cursor,
            queues: BTreeMap::new(),
            eligibility: EligibilityState::default(),
            tally: DaySummary::default(),
        }
    }
}

/// Reads and atomically replaces the checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    saves: Arc<AtomicU64>,
}

impl CheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            saves: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoints written through this store and its clones.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// `None` if no checkpoint was ever written.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| Error::Checkpoint(format!("{}: {}", self.path.display(), e)))
    }

    /// Write to a sibling temp file, then rename over the old checkpoint.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let data = serde_json::to_string(checkpoint)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        let saves = self.saves.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Checkpoint {} saved at block {}",
            saves,
            checkpoint.cursor.next()
        );
        Ok(())
    }
}
