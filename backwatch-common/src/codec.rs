//! Backup filename codec
//!
//! Backup files are named `<prefix><timestamp><extension>`, where the timestamp
//! is rendered in one of several formats depending on how the backup job was
//! configured over time.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

/// Layout of the timestamp embedded in a backup filename
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum TimeFormat {
    /// RFC 3339, e.g. `2025-02-08T19:15:36Z`
    Rfc3339,
    /// OS default `date` output, e.g. `Sat Feb  8 19:15:36 UTC 2025`
    UnixDate,
    /// Seconds since the Unix epoch, e.g. `1739042136`
    #[default]
    Epoch,
}

impl TimeFormat {
    pub fn as_str(&self) -> &str {
        match self {
            TimeFormat::Rfc3339 => "rfc3339",
            TimeFormat::UnixDate => "unixdate",
            TimeFormat::Epoch => "epoch",
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Layout strings as stored by older configs
        match s.trim() {
            "2006-01-02T15:04:05Z07:00" => return Ok(TimeFormat::Rfc3339),
            "Mon Jan _2 15:04:05 MST 2006" => return Ok(TimeFormat::UnixDate),
            _ => {}
        }

        match s.trim().to_ascii_lowercase().as_str() {
            "rfc3339" => Ok(TimeFormat::Rfc3339),
            "unixdate" | "unix_date" | "date" => Ok(TimeFormat::UnixDate),
            "epoch" | "unix" | "unix_epoch" => Ok(TimeFormat::Epoch),
            _ => Err(format!(
                "Invalid time format '{s}'. Must be one of: rfc3339, unixdate, epoch"
            )),
        }
    }
}

impl TryFrom<String> for TimeFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeFormat> for String {
    fn from(format: TimeFormat) -> Self {
        format.as_str().to_string()
    }
}

/// `time_format` as written in a server's configuration
///
/// Unrecognised values are kept verbatim so the rest of the configuration still
/// loads; they only fail when that server's filenames are decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum TimeFormatSetting {
    Known(TimeFormat),
    Unrecognised(String),
}

impl Default for TimeFormatSetting {
    fn default() -> Self {
        Self::Known(TimeFormat::default())
    }
}

impl TimeFormatSetting {
    pub fn resolve(&self) -> Result<TimeFormat, String> {
        match self {
            TimeFormatSetting::Known(format) => Ok(*format),
            TimeFormatSetting::Unrecognised(raw) => Err(raw.clone()),
        }
    }
}

impl From<TimeFormat> for TimeFormatSetting {
    fn from(format: TimeFormat) -> Self {
        Self::Known(format)
    }
}

impl From<String> for TimeFormatSetting {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(format) => Self::Known(format),
            Err(_) => Self::Unrecognised(value),
        }
    }
}

impl From<TimeFormatSetting> for String {
    fn from(setting: TimeFormatSetting) -> Self {
        match setting {
            TimeFormatSetting::Known(format) => format.into(),
            TimeFormatSetting::Unrecognised(raw) => raw,
        }
    }
}

/// How the prefix and extension are removed before parsing the timestamp
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StripMode {
    /// Prefix must be a literal prefix and extension a literal suffix
    #[default]
    Anchored,
    /// Remove the first occurrence of each wherever it appears
    Substring,
}

/// Decoder/encoder bound to one server's naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameCodec {
    pub prefix: String,
    pub extension: String,
    pub format: TimeFormat,
    pub mode: StripMode,
}

impl FileNameCodec {
    pub fn new(
        prefix: impl Into<String>,
        extension: impl Into<String>,
        format: TimeFormat,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
            format,
            mode: StripMode::Anchored,
        }
    }

    pub fn with_mode(mut self, mode: StripMode) -> Self {
        self.mode = mode;
        self
    }

    /// Extract the point in time embedded in `file_name`
    pub fn decode(&self, file_name: &str) -> Result<DateTime<Utc>, DecodeError> {
        let timestamp = self.strip(file_name)?;
        parse_timestamp(&timestamp, self.format)
    }

    /// Build the filename for a backup taken at `instant`
    pub fn encode(&self, instant: DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            render_timestamp(instant, self.format),
            self.extension
        )
    }

    fn strip<'a>(&self, file_name: &'a str) -> Result<Cow<'a, str>, DecodeError> {
        match self.mode {
            StripMode::Anchored => {
                let without_ext = file_name.strip_suffix(self.extension.as_str()).ok_or_else(|| {
                    DecodeError::MissingExtension {
                        file_name: file_name.to_string(),
                        extension: self.extension.clone(),
                    }
                })?;
                let timestamp = without_ext.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
                    DecodeError::MissingPrefix {
                        file_name: file_name.to_string(),
                        prefix: self.prefix.clone(),
                    }
                })?;
                Ok(Cow::Borrowed(timestamp))
            }
            StripMode::Substring => {
                let mut rest = file_name.to_string();
                if !self.extension.is_empty() {
                    rest = rest.replacen(self.extension.as_str(), "", 1);
                }
                if !self.prefix.is_empty() {
                    rest = rest.replacen(self.prefix.as_str(), "", 1);
                }
                Ok(Cow::Owned(rest))
            }
        }
    }
}

/// Decode a backup filename using anchored prefix/extension stripping
pub fn decode(
    file_name: &str,
    prefix: &str,
    extension: &str,
    format: TimeFormat,
) -> Result<DateTime<Utc>, DecodeError> {
    FileNameCodec::new(prefix, extension, format).decode(file_name)
}

/// Render `prefix + timestamp + extension` for the given instant
pub fn encode(prefix: &str, instant: DateTime<Utc>, extension: &str, format: TimeFormat) -> String {
    FileNameCodec::new(prefix, extension, format).encode(instant)
}

/// Parse a bare timestamp string in the given format
pub fn parse_timestamp(value: &str, format: TimeFormat) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidTimestamp {
        value: value.to_string(),
        format,
        reason,
    };

    match format {
        TimeFormat::Rfc3339 => DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| invalid(e.to_string())),
        TimeFormat::Epoch => {
            let secs: i64 = value
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
            DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid("out of range".to_string()))
        }
        TimeFormat::UnixDate => parse_unix_date(value).map_err(invalid),
    }
}

/// Render an instant as the timestamp part of a filename
pub fn render_timestamp(instant: DateTime<Utc>, format: TimeFormat) -> String {
    match format {
        TimeFormat::Rfc3339 => instant.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        TimeFormat::UnixDate => instant.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
        TimeFormat::Epoch => instant.timestamp().to_string(),
    }
}

// Parses `Mon Jan _2 15:04:05 MST 2006`. The weekday must be a weekday name but
// is not checked against the date.
fn parse_unix_date(value: &str) -> Result<DateTime<Utc>, String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let [weekday, month, day, time, zone, year] = parts.as_slice() else {
        return Err(format!("expected 6 fields, found {}", parts.len()));
    };

    weekday
        .parse::<Weekday>()
        .map_err(|_| format!("unknown weekday '{weekday}'"))?;

    let naive = NaiveDateTime::parse_from_str(
        &format!("{month} {day} {year} {time}"),
        "%b %d %Y %H:%M:%S",
    )
    .map_err(|e| e.to_string())?;

    let offset = FixedOffset::east_opt(zone_offset_seconds(zone))
        .ok_or_else(|| format!("invalid offset for zone '{zone}'"))?;

    naive
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| "ambiguous local time".to_string())
}

// Unknown abbreviations get a zero offset.
fn zone_offset_seconds(zone: &str) -> i32 {
    const HOUR: i32 = 3600;
    match zone.to_ascii_uppercase().as_str() {
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_rfc3339_round_trip() {
        for raw in [
            "2025-02-08T19:15:36Z",
            "2025-02-08T19:15:36-06:00",
            "1999-12-31T23:59:59.250+02:00",
        ] {
            let t = DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc);
            let name = encode("db01-", t, ".tar.gz", TimeFormat::Rfc3339);
            let decoded = decode(&name, "db01-", ".tar.gz", TimeFormat::Rfc3339).unwrap();
            assert_eq!(decoded, t, "round trip of {raw} via {name}");
        }
    }

    #[test]
    fn test_decode_epoch() {
        let t = decode("web-1739042136.sql", "web-", ".sql", TimeFormat::Epoch).unwrap();
        assert_eq!(t, instant(1739042136));
    }

    #[test]
    fn test_decode_unix_date() {
        let t = decode(
            "backup_Sat Feb  8 19:15:36 UTC 2025.tgz",
            "backup_",
            ".tgz",
            TimeFormat::UnixDate,
        )
        .unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 2, 8, 19, 15, 36).unwrap());
    }

    #[test]
    fn test_decode_unix_date_with_zone() {
        let t = parse_timestamp("Sat Feb  8 13:15:36 CST 2025", TimeFormat::UnixDate).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 2, 8, 19, 15, 36).unwrap());
    }

    #[test]
    fn test_unix_date_encode_then_decode() {
        let t = Utc.with_ymd_and_hms(2024, 11, 3, 4, 5, 6).unwrap();
        let name = encode("srv-", t, ".bak", TimeFormat::UnixDate);
        assert_eq!(name, "srv-Sun Nov  3 04:05:06 UTC 2024.bak");
        assert_eq!(decode(&name, "srv-", ".bak", TimeFormat::UnixDate).unwrap(), t);
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let err = decode("web-notatime.sql", "web-", ".sql", TimeFormat::Epoch).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp { .. }));

        let err = decode("web-Friday.sql", "web-", ".sql", TimeFormat::UnixDate).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_anchored_strip_rejects_misplaced_affixes() {
        let err = decode("1739042136-web-.sql", "web-", ".sql", TimeFormat::Epoch).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPrefix { .. }));

        let err = decode("web-1739042136.sql.old", "web-", ".sql", TimeFormat::Epoch).unwrap_err();
        assert!(matches!(err, DecodeError::MissingExtension { .. }));
    }

    #[test]
    fn test_substring_strip_matches_anywhere() {
        let codec =
            FileNameCodec::new("web-", ".sql", TimeFormat::Epoch).with_mode(StripMode::Substring);
        assert_eq!(codec.decode("1739042136web-.sql").unwrap(), instant(1739042136));
        assert_eq!(codec.decode(".sqlweb-1739042136").unwrap(), instant(1739042136));
    }

    #[test]
    fn test_empty_prefix_and_extension() {
        assert_eq!(
            decode("1739042136", "", "", TimeFormat::Epoch).unwrap(),
            instant(1739042136)
        );
    }

    #[test]
    fn test_time_format_parsing() {
        assert_eq!("rfc3339".parse::<TimeFormat>().unwrap(), TimeFormat::Rfc3339);
        assert_eq!("RFC3339".parse::<TimeFormat>().unwrap(), TimeFormat::Rfc3339);
        assert_eq!(
            "2006-01-02T15:04:05Z07:00".parse::<TimeFormat>().unwrap(),
            TimeFormat::Rfc3339
        );
        assert_eq!(
            "Mon Jan _2 15:04:05 MST 2006".parse::<TimeFormat>().unwrap(),
            TimeFormat::UnixDate
        );
        assert_eq!("unix".parse::<TimeFormat>().unwrap(), TimeFormat::Epoch);
        assert!("yesterday".parse::<TimeFormat>().is_err());
    }

    #[test]
    fn test_time_format_serde() {
        let format: TimeFormat = serde_json::from_str("\"unixdate\"").unwrap();
        assert_eq!(format, TimeFormat::UnixDate);
        assert_eq!(serde_json::to_string(&TimeFormat::Epoch).unwrap(), "\"epoch\"");
        assert!(serde_json::from_str::<TimeFormat>("\"hourly\"").is_err());
    }

    #[test]
    fn test_time_format_setting_keeps_unknown_layouts() {
        let setting: TimeFormatSetting =
            serde_json::from_str("\"2006-01-02 15:04:05 -0700 MST\"").unwrap();
        assert_eq!(
            setting.resolve(),
            Err("2006-01-02 15:04:05 -0700 MST".to_string())
        );
        assert_eq!(
            serde_json::to_string(&setting).unwrap(),
            "\"2006-01-02 15:04:05 -0700 MST\""
        );

        let setting: TimeFormatSetting = serde_json::from_str("\"unix\"").unwrap();
        assert_eq!(setting.resolve(), Ok(TimeFormat::Epoch));
        assert_eq!(TimeFormatSetting::default().resolve(), Ok(TimeFormat::Epoch));
    }
}
