//! Per-job state records.
//!
//! One JSON file per base name, atomically replaced on every save. The
//! record is the single source of truth for which pipeline steps still
//! need to run; the worker never re-derives progress from the filesystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, SubflowError};

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ProcessAudio,
    AssToSrt,
    Translate,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::ProcessAudio, Step::AssToSrt, Step::Translate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ProcessAudio => "process_audio",
            Step::AssToSrt => "ass_to_srt",
            Step::Translate => "translate",
        }
    }

    /// One-based position used by the resume command.
    pub fn number(&self) -> u8 {
        match self {
            Step::ProcessAudio => 1,
            Step::AssToSrt => 2,
            Step::Translate => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Step> {
        Step::ALL.iter().copied().find(|s| s.number() == n)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    #[serde(default)]
    pub steps_completed: BTreeMap<Step, bool>,
    #[serde(default)]
    pub ass_hash: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for JobRecord {
    fn default() -> Self {
        Self {
            steps_completed: BTreeMap::new(),
            ass_hash: None,
            last_updated: Utc::now(),
        }
    }
}

impl JobRecord {
    pub fn is_complete(&self, step: Step) -> bool {
        self.steps_completed.get(&step).copied().unwrap_or(false)
    }

    pub fn mark_complete(&mut self, step: Step) {
        self.steps_completed.insert(step, true);
    }

    pub fn clear(&mut self, step: Step) {
        self.steps_completed.insert(step, false);
    }
}

/// Stores one record per base name under the state directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Result<Self> {
        let dir = state_dir.as_ref().join("jobs");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, base: &str) -> PathBuf {
        self.dir.join(format!("{}.json", base))
    }

    /// Returns the persisted record, or an empty one when none exists yet.
    pub fn load(&self, base: &str) -> Result<JobRecord> {
        let path = self.record_path(base);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SubflowError::Metadata(format!(
                    "Corrupt record for '{}' at {}: {}",
                    base,
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JobRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persists the record atomically: write to a temporary file in the
    /// same directory, then rename over the destination. A crash mid-write
    /// never leaves a partial record visible to a later load.
    pub fn save(&self, base: &str, record: &JobRecord) -> Result<()> {
        let mut record = record.clone();
        record.last_updated = Utc::now();

        let content = serde_json::to_string_pretty(&record)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.record_path(base))
            .map_err(|e| SubflowError::Io(e.error))?;

        Ok(())
    }
}
