// Backup validation engine for Backwatch

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod report;
pub mod types;
pub mod validator;

pub use codec::{FileNameCodec, StripMode, TimeFormat, TimeFormatSetting, decode, encode};
pub use config::{BackupTargetConfig, BackwatchConfig, ConfigIssue};
pub use error::{DecodeError, DirectoryError, DirectoryErrorKind, TargetRole, ValidationError};
pub use format::{format_age, format_bytes, format_run_time, format_timestamp};
pub use types::{BackupObservation, FileObservation, ScannedFile, ValidationResult};
pub use validator::{BackupValidator, validate};
