//! # Report Writer
//!
//! Writes the reports of a successful run. Every file is rendered, then
//! written to a temp file in the target directory. Only when all temp files
//! are synced are they renamed into place, so a reader never sees a
//! half-written report and a failed run leaves earlier reports untouched.

use crate::config::OutputConfig;
use chrono::NaiveDateTime;
use pupdates_core::{PupdatesError, RunReport, render_csv, render_summary};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Render and write the enabled report files. Returns the written paths.
pub fn write_reports(
    report: &RunReport,
    output: &OutputConfig,
    generated_at: NaiveDateTime,
) -> Result<Vec<PathBuf>, PupdatesError> {
    let stamp = generated_at.format("%Y%m%d_%H%M%S");

    let mut rendered: Vec<(PathBuf, String)> = Vec::new();
    if output.json {
        rendered.push((
            output.dir.join(format!("diff_report_{stamp}.json")),
            report.to_json()?,
        ));
    }
    if output.summary {
        rendered.push((
            output.dir.join(format!("diff_summary_{stamp}.txt")),
            render_summary(&report.diff),
        ));
    }
    if output.csv {
        rendered.push((
            output.dir.join(format!("changes_{stamp}.csv")),
            render_csv(&report.diff, &report.changed)?,
        ));
    }

    if rendered.is_empty() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(&output.dir).map_err(|e| {
        PupdatesError::IoError(format!(
            "Cannot create output directory '{}': {}",
            output.dir.display(),
            e
        ))
    })?;

    // Stage every file before renaming any, so a write error leaves the
    // directory as it was.
    let staged = rendered
        .into_iter()
        .map(|(path, contents)| stage(&path, contents.as_bytes()).map(|tmp| (path, tmp)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = Vec::with_capacity(staged.len());
    for (path, tmp) in staged {
        commit(tmp, &path)?;
        tracing::info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PupdatesError> {
    let tmp = stage(path, contents)?;
    commit(tmp, path)
}

/// Synced temp file next to `path`. Removed on drop unless committed.
fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile, PupdatesError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| PupdatesError::IoError(format!("Cannot create temp file: {}", e)))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PupdatesError::IoError(format!("Cannot write temp file: {}", e)))?;
    Ok(tmp)
}

fn commit(tmp: NamedTempFile, path: &Path) -> Result<(), PupdatesError> {
    tmp.persist(path).map_err(|e| {
        PupdatesError::IoError(format!("Cannot move report to '{}': {}", path.display(), e))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pupdates_core::primitives::DEFAULT_SNAPSHOT_PREFIX;
    use pupdates_core::{ClassifiedDiff, RunContext, SnapshotId};
    use tempfile::tempdir;

    fn report(at: NaiveDateTime) -> RunReport {
        let latest =
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, "animal-humane-20251230-1500").expect("id");
        let previous =
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, "animal-humane-20251230-0900").expect("id");
        RunReport::new(
            RunContext {
                latest: &latest,
                previous: &previous,
                total_latest: 0,
                total_previous: 0,
                historical_snapshots: 0,
                skipped_snapshots: 0,
                generated_at: at,
            },
            ClassifiedDiff::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn writes_all_three_reports() {
        let dir = tempdir().expect("tempdir");
        let at = NaiveDate::from_ymd_opt(2025, 12, 30)
            .and_then(|d| d.and_hms_opt(15, 5, 9))
            .expect("time");
        let output = OutputConfig {
            dir: dir.path().join("reports"),
            ..OutputConfig::default()
        };

        let written = write_reports(&report(at), &output, at).expect("write");
        let names: Vec<_> = written
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        assert_eq!(
            names,
            vec![
                "diff_report_20251230_150509.json",
                "diff_summary_20251230_150509.txt",
                "changes_20251230_150509.csv",
            ]
        );

        let summary = std::fs::read_to_string(&written[1]).expect("read");
        assert!(summary.starts_with("New:\n"));

        // No temp files left behind.
        let entries = std::fs::read_dir(&output.dir).expect("dir").count();
        assert_eq!(entries, 3);
    }

    #[test]
    fn failed_rename_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let at = NaiveDate::from_ymd_opt(2025, 12, 30)
            .and_then(|d| d.and_hms_opt(15, 5, 9))
            .expect("time");
        let output = OutputConfig {
            dir: dir.path().to_path_buf(),
            ..OutputConfig::default()
        };
        // A directory where the JSON report should go makes its rename fail.
        std::fs::create_dir(dir.path().join("diff_report_20251230_150509.json")).expect("mkdir");

        let err = write_reports(&report(at), &output, at).expect_err("rename must fail");
        assert!(matches!(err, PupdatesError::IoError(_)));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("dir")
            .filter_map(|e| e.ok().and_then(|e| e.file_name().into_string().ok()))
            .collect();
        assert_eq!(names, vec!["diff_report_20251230_150509.json"]);
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "old").expect("seed");

        write_atomic(&path, b"new").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
    }
}
