//! Observations and results produced by a validation run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::Metadata;

use crate::error::DecodeError;
use crate::format::format_timestamp;

/// Name, size and modification time of a file, captured at scan time
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileObservation {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl FileObservation {
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            name: name.into(),
            size_bytes: metadata.len(),
            modified: metadata.modified()?.into(),
        })
    }
}

/// Outcome of decoding one file found in the primary directory
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ScannedFile {
    Decoded {
        file: FileObservation,
        time: DateTime<Utc>,
    },
    Skipped {
        file: FileObservation,
        #[serde(serialize_with = "serialize_reason")]
        reason: DecodeError,
    },
}

fn serialize_reason<S: serde::Serializer>(reason: &DecodeError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

impl ScannedFile {
    pub fn file(&self) -> &FileObservation {
        match self {
            ScannedFile::Decoded { file, .. } | ScannedFile::Skipped { file, .. } => file,
        }
    }

    pub fn decoded_time(&self) -> Option<DateTime<Utc>> {
        match self {
            ScannedFile::Decoded { time, .. } => Some(*time),
            ScannedFile::Skipped { .. } => None,
        }
    }
}

/// A backup file confirmed on one target, with the time it is credited with
///
/// On the primary target `time` is decoded from the filename; on the secondary
/// it is the file's modification time.
#[derive(Debug, Clone, Serialize)]
pub struct BackupObservation {
    pub file: FileObservation,
    pub time: DateTime<Utc>,
    pub time_display: String,
}

impl BackupObservation {
    fn new(file: FileObservation, time: DateTime<Utc>) -> Self {
        Self {
            time_display: format_timestamp(time),
            file,
            time,
        }
    }
}

/// Result of validating one server's backups
///
/// A secondary observation only exists alongside a primary one.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    server_name: String,
    primary: Option<BackupObservation>,
    secondary: Option<BackupObservation>,
    scanned: Vec<ScannedFile>,
}

impl ValidationResult {
    /// No fresh backup was found on the primary target
    pub fn missing_primary(server_name: impl Into<String>, scanned: Vec<ScannedFile>) -> Self {
        Self {
            server_name: server_name.into(),
            primary: None,
            secondary: None,
            scanned,
        }
    }

    /// A fresh primary backup, decoded at `decoded_time`
    pub fn with_primary(
        server_name: impl Into<String>,
        file: FileObservation,
        decoded_time: DateTime<Utc>,
        scanned: Vec<ScannedFile>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            primary: Some(BackupObservation::new(file, decoded_time)),
            secondary: None,
            scanned,
        }
    }

    /// Record the replica found on the secondary target
    ///
    /// Returns the result unchanged when there is no primary backup.
    pub fn replicated(mut self, file: FileObservation) -> Self {
        if self.primary.is_some() {
            let modified = file.modified;
            self.secondary = Some(BackupObservation::new(file, modified));
        }
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn primary_valid(&self) -> bool {
        self.primary.is_some()
    }

    pub fn secondary_valid(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn primary(&self) -> Option<&BackupObservation> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&BackupObservation> {
        self.secondary.as_ref()
    }

    /// Decode outcomes for every file in the primary directory
    pub fn scanned(&self) -> &[ScannedFile] {
        &self.scanned
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ScannedFile> {
        self.scanned
            .iter()
            .filter(|s| matches!(s, ScannedFile::Skipped { .. }))
    }
}
