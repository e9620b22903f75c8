//! Re-encode backup filenames from one timestamp format to another

use anyhow::{Context, Result};
use backwatch_common::{BackupTargetConfig, FileNameCodec, TimeFormat};
use std::path::{Path, PathBuf};

/// A single planned rename inside a server's primary directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Work out the new name of every decodable file in the primary directory
///
/// Only the top level of the directory is considered. Files already in the
/// target format, or that cannot be decoded, are left out.
pub fn plan_renames(target: &BackupTargetConfig, to: TimeFormat) -> Result<Vec<RenamePlan>> {
    let source = target.codec()?;
    let output = FileNameCodec::new(
        target.date_time_prefix.as_str(),
        target.file_extension.as_str(),
        to,
    );

    let mut entries: Vec<_> = std::fs::read_dir(&target.base_dir)
        .with_context(|| format!("Failed to read {}", target.base_dir.display()))?
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("Failed to list {}", target.base_dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut plans = Vec::new();

    for entry in entries {
        if entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let time = match source.decode(&name) {
            Ok(time) => time,
            Err(e) => {
                log::warn!("{}: skipping {}: {}", target.server_name, name, e);
                continue;
            }
        };

        let new_name = output.encode(time);
        if new_name == name {
            continue;
        }

        plans.push(RenamePlan {
            from: entry.path(),
            to: target.base_dir.join(new_name),
        });
    }

    Ok(plans)
}

/// Perform the planned renames, never overwriting an existing file
///
/// A failed rename does not stop the remaining ones. Returns how many files
/// were renamed, or an error naming the failures once every plan was tried.
pub fn apply_renames(plans: &[RenamePlan]) -> Result<usize> {
    let mut renamed = 0;
    let mut failed = Vec::new();

    for plan in plans {
        if plan.to.exists() {
            log::warn!(
                "Not renaming {}: {} already exists",
                display_name(&plan.from),
                plan.to.display()
            );
            continue;
        }

        if let Err(e) = std::fs::rename(&plan.from, &plan.to) {
            log::error!(
                "Failed to rename {} to {}: {}",
                plan.from.display(),
                plan.to.display(),
                e
            );
            failed.push(display_name(&plan.from));
            continue;
        }
        log::info!("Renamed {} -> {}", display_name(&plan.from), display_name(&plan.to));
        renamed += 1;
    }

    if !failed.is_empty() {
        log::info!("Renamed {} of {} file(s) before giving up", renamed, plans.len());
        anyhow::bail!("{} rename(s) failed: {}", failed.len(), failed.join(", "));
    }

    Ok(renamed)
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use backwatch_common::StripMode;
    use std::fs;

    fn target(dir: &Path) -> BackupTargetConfig {
        BackupTargetConfig {
            server_name: "web01".to_string(),
            base_dir: dir.to_path_buf(),
            secondary_base_dir: dir.to_path_buf(),
            daily: true,
            file_extension: ".tar".to_string(),
            date_time_prefix: "web01_".to_string(),
            time_format: TimeFormat::Rfc3339.into(),
            strip_mode: StripMode::Anchored,
            freshness_hours: None,
        }
    }

    #[test]
    fn test_plan_rfc3339_to_epoch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web01_2025-02-08T19:15:36Z.tar"), b"x").unwrap();
        fs::write(dir.path().join("web01_garbage.tar"), b"x").unwrap();
        fs::create_dir(dir.path().join("web01_2025-02-07T19:15:36Z.tar")).unwrap();

        let plans = plan_renames(&target(dir.path()), TimeFormat::Epoch).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(display_name(&plans[0].from), "web01_2025-02-08T19:15:36Z.tar");
        assert_eq!(display_name(&plans[0].to), "web01_1739042136.tar");
    }

    #[test]
    fn test_same_format_plans_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web01_2025-02-08T19:15:36Z.tar"), b"x").unwrap();

        let plans = plan_renames(&target(dir.path()), TimeFormat::Rfc3339).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_apply_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web01_2025-02-08T19:15:36Z.tar"), b"new").unwrap();
        fs::write(dir.path().join("web01_2025-02-09T00:00:00Z.tar"), b"x").unwrap();
        fs::write(dir.path().join("web01_1739042136.tar"), b"existing").unwrap();

        let plans = plan_renames(&target(dir.path()), TimeFormat::Epoch).unwrap();
        assert_eq!(plans.len(), 2);

        let renamed = apply_renames(&plans).unwrap();
        assert_eq!(renamed, 1);
        assert_eq!(
            fs::read(dir.path().join("web01_1739042136.tar")).unwrap(),
            b"existing"
        );
        assert!(dir.path().join("web01_1739059200.tar").exists());
        assert!(dir.path().join("web01_2025-02-08T19:15:36Z.tar").exists());
    }

    #[test]
    fn test_apply_continues_after_failed_rename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web01_2025-02-08T19:15:36Z.tar"), b"x").unwrap();
        fs::write(dir.path().join("web01_2025-02-09T00:00:00Z.tar"), b"x").unwrap();

        let plans = plan_renames(&target(dir.path()), TimeFormat::Epoch).unwrap();
        assert_eq!(plans.len(), 2);
        fs::remove_file(&plans[0].from).unwrap();

        let err = apply_renames(&plans).unwrap_err();
        assert!(err.to_string().contains("1 rename(s) failed"));
        assert!(err.to_string().contains("web01_2025-02-08T19:15:36Z.tar"));
        assert!(dir.path().join("web01_1739059200.tar").exists());
        assert!(!dir.path().join("web01_2025-02-09T00:00:00Z.tar").exists());
    }

    #[test]
    fn test_unknown_source_format_cannot_be_planned() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = target(dir.path());
        target.time_format = "2006-01-02 15:04:05 -0700 MST".to_string().into();

        let err = plan_renames(&target, TimeFormat::Epoch).unwrap_err();
        assert!(err.to_string().contains("unrecognised time_format"));
    }
}
