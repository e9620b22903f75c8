//! Error types for backup validation

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::TimeFormat;

/// Which storage target a directory belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    Primary,
    Secondary,
}

impl TargetRole {
    pub fn as_str(&self) -> &str {
        match self {
            TargetRole::Primary => "primary",
            TargetRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a backup directory could not be used
#[derive(Debug, Error)]
pub enum DirectoryErrorKind {
    #[error("does not exist")]
    Missing,

    #[error("exists but is not a directory")]
    NotADirectory,

    #[error("could not stat path: {0}")]
    Stat(#[source] std::io::Error),
}

/// A primary or secondary backup directory is missing, of the wrong type, or unreadable
#[derive(Debug, Error)]
#[error("{role} backup directory '{}' {kind}", .path.display())]
pub struct DirectoryError {
    pub role: TargetRole,
    pub path: PathBuf,
    pub kind: DirectoryErrorKind,
}

/// A backup filename whose timestamp could not be extracted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("'{file_name}' does not start with prefix '{prefix}'")]
    MissingPrefix { file_name: String, prefix: String },

    #[error("'{file_name}' does not end with extension '{extension}'")]
    MissingExtension {
        file_name: String,
        extension: String,
    },

    #[error("'{value}' is not a valid {format} timestamp: {reason}")]
    InvalidTimestamp {
        value: String,
        format: TimeFormat,
        reason: String,
    },
}

/// Failure of a single server's validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("could not walk {role} directory '{}': {source}", .path.display())]
    Scan {
        role: TargetRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognised time_format '{value}' (expected rfc3339, unixdate or epoch)")]
    UnknownTimeFormat { value: String },
}

impl ValidationError {
    /// The target the failure occurred on, if it concerns a directory
    pub fn role(&self) -> Option<TargetRole> {
        match self {
            ValidationError::Directory(e) => Some(e.role),
            ValidationError::Scan { role, .. } => Some(*role),
            ValidationError::UnknownTimeFormat { .. } => None,
        }
    }
}
