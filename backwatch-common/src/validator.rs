//! Backup validation against primary and secondary targets
//!
//! A server's backup is valid on the primary target when a file whose decoded
//! timestamp is newer than `now - freshness` exists in the primary directory.
//! It is valid on the secondary target when a file with the same name exists
//! in the secondary directory.

use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use walkdir::WalkDir;

use crate::codec::FileNameCodec;
use crate::config::BackupTargetConfig;
use crate::error::{DirectoryError, DirectoryErrorKind, TargetRole, ValidationError};
use crate::types::{FileObservation, ScannedFile, ValidationResult};

/// Default freshness window
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// Validates servers' backups against a freshness window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupValidator {
    freshness: Duration,
}

impl Default for BackupValidator {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_FRESHNESS_HOURS))
    }
}

impl BackupValidator {
    pub fn new(freshness: Duration) -> Self {
        Self { freshness }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Validate one server's backups as of `now`
    ///
    /// Both directories are checked before any file is read. When no fresh
    /// primary backup exists the secondary directory is not scanned.
    pub fn validate(
        &self,
        config: &BackupTargetConfig,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, ValidationError> {
        let codec = config.codec()?;

        check_directory(&config.base_dir, TargetRole::Primary)?;
        check_directory(&config.secondary_base_dir, TargetRole::Secondary)?;

        let freshness = config.freshness_override().unwrap_or(self.freshness);
        let threshold = now - freshness;

        let primary_files = scan_files(&config.base_dir, TargetRole::Primary)?;
        let scanned = decode_all(&codec, &config.server_name, primary_files);

        let Some((file, decoded_time)) = select_fresh(&scanned, threshold) else {
            log::info!(
                "{}: no backup newer than {} in {}",
                config.server_name,
                threshold.to_rfc3339(),
                config.base_dir.display()
            );
            return Ok(ValidationResult::missing_primary(
                config.server_name.as_str(),
                scanned,
            ));
        };

        log::debug!(
            "{}: selected primary backup {} ({})",
            config.server_name,
            file.name,
            decoded_time.to_rfc3339()
        );

        let result = ValidationResult::with_primary(
            config.server_name.as_str(),
            file.clone(),
            decoded_time,
            scanned,
        );

        let replica = scan_files(&config.secondary_base_dir, TargetRole::Secondary)?
            .into_iter()
            .find(|candidate| candidate.name == file.name);

        match replica {
            Some(replica) => Ok(result.replicated(replica)),
            None => {
                log::info!(
                    "{}: {} not found in {}",
                    config.server_name,
                    file.name,
                    config.secondary_base_dir.display()
                );
                Ok(result)
            }
        }
    }
}

/// Validate with the default 24 hour freshness window
pub fn validate(
    config: &BackupTargetConfig,
    now: DateTime<Utc>,
) -> Result<ValidationResult, ValidationError> {
    BackupValidator::default().validate(config, now)
}

/// Confirm `path` exists and is a directory
pub fn check_directory(path: &Path, role: TargetRole) -> Result<(), DirectoryError> {
    let error = |kind| DirectoryError {
        role,
        path: path.to_path_buf(),
        kind,
    };

    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(error(DirectoryErrorKind::NotADirectory)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(error(DirectoryErrorKind::Missing))
        }
        Err(e) => Err(error(DirectoryErrorKind::Stat(e))),
    }
}

/// List every non-directory entry below `dir`, recursively
///
/// Order is whatever the filesystem returns.
pub fn scan_files(dir: &Path, role: TargetRole) -> Result<Vec<FileObservation>, ValidationError> {
    let scan_error = |source: std::io::Error| ValidationError::Scan {
        role,
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| scan_error(e.into()))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| scan_error(e.into()))?;
        let name = entry.file_name().to_string_lossy();
        let observation = FileObservation::from_metadata(name, &metadata).map_err(scan_error)?;
        files.push(observation);
    }

    Ok(files)
}

fn decode_all(
    codec: &FileNameCodec,
    server_name: &str,
    files: Vec<FileObservation>,
) -> Vec<ScannedFile> {
    files
        .into_iter()
        .map(|file| match codec.decode(&file.name) {
            Ok(time) => ScannedFile::Decoded { file, time },
            Err(reason) => {
                log::warn!("{server_name}: skipping {}: {reason}", file.name);
                ScannedFile::Skipped { file, reason }
            }
        })
        .collect()
}

/// Most recent decoded file strictly newer than `threshold`
///
/// Ties on time are broken by file name so the choice does not depend on
/// directory listing order.
fn select_fresh(
    scanned: &[ScannedFile],
    threshold: DateTime<Utc>,
) -> Option<(FileObservation, DateTime<Utc>)> {
    let mut candidates: Vec<(&FileObservation, DateTime<Utc>)> = scanned
        .iter()
        .filter_map(|s| s.decoded_time().map(|time| (s.file(), time)))
        .collect();

    candidates.sort_by(|(a_file, a_time), (b_file, b_time)| {
        b_time.cmp(a_time).then_with(|| a_file.name.cmp(&b_file.name))
    });

    candidates
        .into_iter()
        .find(|(_, time)| *time > threshold)
        .map(|(file, time)| (file.clone(), time))
}
