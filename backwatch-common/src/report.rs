//! Text report assembled from per-server validation outcomes

use chrono::{DateTime, Local, Utc};

use crate::error::ValidationError;
use crate::format::{format_age, format_bytes, format_run_time};
use crate::types::{BackupObservation, ValidationResult};

/// Header placed at the top of the first message
pub fn format_header(run_time: DateTime<Local>) -> String {
    format!("backwatch run: {}", format_run_time(run_time))
}

/// One status block per server
///
/// A failed validation yields a single FAIL line; otherwise one line per target
/// followed by details of any backup found there.
pub fn format_server_block(
    server_name: &str,
    outcome: &Result<ValidationResult, ValidationError>,
    now: DateTime<Utc>,
) -> String {
    let result = match outcome {
        Ok(result) => result,
        Err(e) => return format!("FAIL: could not check backup for server: {server_name}: {e}"),
    };

    let mut lines = Vec::new();

    match result.primary() {
        Some(primary) => {
            lines.push(format!(
                "SUCCESS: primary backup for server: {server_name} is fresh"
            ));
            lines.extend(describe(primary, now));
        }
        None => lines.push(format!(
            "FAIL: no fresh primary backup for server: {server_name}"
        )),
    }

    match result.secondary() {
        Some(secondary) => {
            lines.push(format!(
                "SUCCESS: secondary backup for server: {server_name} is present"
            ));
            lines.extend(describe(secondary, now));
        }
        None if result.primary_valid() => lines.push(format!(
            "FAIL: secondary backup for server: {server_name} is missing"
        )),
        None => lines.push(format!(
            "FAIL: secondary backup for server: {server_name} not checked"
        )),
    }

    let skipped = result.skipped().count();
    if skipped > 0 {
        lines.push(format!("  ({skipped} unrecognised file(s) skipped)"));
    }

    lines.join("\n")
}

fn describe(observation: &BackupObservation, now: DateTime<Utc>) -> [String; 3] {
    let age = now.signed_duration_since(observation.time);
    [
        format!("  file: {}", observation.file.name),
        format!("  size: {}", format_bytes(observation.file.size_bytes)),
        format!("  time: {} ({} ago)", observation.time_display, format_age(age)),
    ]
}

/// Group server blocks into messages of at most `per_message` servers
///
/// The header is prepended to the first message only. A `per_message` of zero
/// is treated as one.
pub fn batch_messages(header: &str, blocks: &[String], per_message: usize) -> Vec<String> {
    let per_message = per_message.max(1);

    if blocks.is_empty() {
        return vec![header.to_string()];
    }

    blocks
        .chunks(per_message)
        .enumerate()
        .map(|(idx, chunk)| {
            let body = chunk.join("\n\n");
            if idx == 0 {
                format!("{header}\n\n{body}")
            } else {
                body
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DirectoryError, DirectoryErrorKind, TargetRole};
    use crate::types::FileObservation;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 8, 19, 0, 0).unwrap()
    }

    fn file(name: &str) -> FileObservation {
        FileObservation {
            name: name.to_string(),
            size_bytes: 2048,
            modified: now() - Duration::minutes(10),
        }
    }

    #[test]
    fn test_block_for_replicated_backup() {
        let result = ValidationResult::with_primary(
            "db01",
            file("db01-1.sql"),
            now() - Duration::hours(2),
            Vec::new(),
        )
        .replicated(file("db01-1.sql"));

        let block = format_server_block("db01", &Ok(result), now());
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "SUCCESS: primary backup for server: db01 is fresh");
        assert_eq!(lines[1], "  file: db01-1.sql");
        assert_eq!(lines[2], "  size: 2.0 kB");
        assert!(lines[3].ends_with("(2h ago)"));
        assert_eq!(lines[4], "SUCCESS: secondary backup for server: db01 is present");
        assert!(lines[7].ends_with("(10m ago)"));
    }

    #[test]
    fn test_block_for_missing_primary() {
        let result = ValidationResult::missing_primary("db01", Vec::new());
        let block = format_server_block("db01", &Ok(result), now());
        assert_eq!(
            block,
            "FAIL: no fresh primary backup for server: db01\n\
             FAIL: secondary backup for server: db01 not checked"
        );
    }

    #[test]
    fn test_block_for_error_is_single_line() {
        let err: ValidationError = DirectoryError {
            role: TargetRole::Primary,
            path: PathBuf::from("/srv/backups/db01"),
            kind: DirectoryErrorKind::Missing,
        }
        .into();

        let block = format_server_block("db01", &Err(err), now());
        assert_eq!(block.lines().count(), 1);
        assert!(block.starts_with("FAIL: could not check backup for server: db01"));
        assert!(block.contains("does not exist"));
    }

    #[test]
    fn test_batch_two_servers_per_message() {
        let blocks: Vec<String> = (1..=5).map(|i| format!("server {i}")).collect();
        let messages = batch_messages("backwatch run: now", &blocks, 2);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "backwatch run: now\n\nserver 1\n\nserver 2");
        assert_eq!(messages[1], "server 3\n\nserver 4");
        assert_eq!(messages[2], "server 5");
    }

    #[test]
    fn test_batch_without_servers() {
        assert_eq!(batch_messages("hdr", &[], 2), vec!["hdr".to_string()]);
        assert_eq!(batch_messages("hdr", &["a".to_string()], 0).len(), 1);
    }
}
