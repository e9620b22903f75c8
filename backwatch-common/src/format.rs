//! Formatting utilities for displaying sizes and times in reports

use chrono::{DateTime, Duration, Local, Utc};

/// Backup size in decimal units, truncated to one decimal place
///
/// Sizes under a kilobyte are shown as a plain byte count.
pub fn format_bytes(bytes: u64) -> String {
    const SCALES: [(u64, &str); 4] = [
        (1_000_000_000_000, "TB"),
        (1_000_000_000, "GB"),
        (1_000_000, "MB"),
        (1_000, "kB"),
    ];

    match SCALES.iter().find(|(scale, _)| bytes >= *scale) {
        Some(&(scale, unit)) => {
            let tenths = u128::from(bytes) * 10 / u128::from(scale);
            format!("{}.{} {unit}", tenths / 10, tenths % 10)
        }
        None => format!("{bytes} B"),
    }
}

/// How long ago a backup was taken, as its two most significant units
///
/// `90 min` renders as `1h 30m`. The lower unit is dropped when it is zero and
/// ages in the future count as `0s`.
pub fn format_age(age: Duration) -> String {
    const UNITS: [(i64, &str); 4] = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];

    let seconds = age.num_seconds().max(0);
    let Some(idx) = UNITS.iter().position(|(size, _)| seconds >= *size) else {
        return "0s".to_string();
    };

    let (size, unit) = UNITS[idx];
    let mut rendered = format!("{}{unit}", seconds / size);
    if let Some(&(next, next_unit)) = UNITS.get(idx + 1) {
        let rest = (seconds % size) / next;
        if rest > 0 {
            rendered.push_str(&format!(" {rest}{next_unit}"));
        }
    }
    rendered
}

/// Render a backup time in the machine's local zone, e.g. `2025-02-08 13:15:36 -0600`
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S %z")
        .to_string()
}

/// Render the time a check run started, e.g. `02-08-2025 13:15:36`
pub fn format_run_time(time: DateTime<Local>) -> String {
    time.format("%m-%d-%Y %H:%M:%S").to_string()
}
