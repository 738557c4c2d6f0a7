use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::sparkline::sparkline;
use crate::model::{
    ArtifactRead, BenchmarkRecord, CrossRunView, HISTORY_FILE, SkippedArtifact, TrendEntry,
};
use crate::latest::run_dir_regex;
use crate::util::read_json_artifact;

pub const RECENT_ENTRY_LIMIT: usize = 25;

/// Collects the newest record of every run directory's history log under `export_root`.
///
/// Only `<export_root>/validation_*/benchmark_history.json` counts as a run; shared
/// family logs elsewhere in the tree are ignored. Unreadable, malformed, or empty logs
/// are reported in `skipped` and do not stop the scan.
pub fn cross_run_view(export_root: &Path) -> Result<CrossRunView> {
    let run_dir = run_dir_regex()?;
    let mut entries = Vec::<TrendEntry>::new();
    let mut skipped = Vec::<SkippedArtifact>::new();

    if !export_root.is_dir() {
        warn!(path = %export_root.display(), "export root missing; trend is empty");
    } else {
        let walk = WalkDir::new(export_root)
            .min_depth(2)
            .max_depth(2)
            .follow_links(false);
        for item in walk {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_else(|| export_root.display().to_string());
                    skip(&mut skipped, path, format!("failed to walk: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != HISTORY_FILE {
                continue;
            }
            let in_run_dir = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|name| name.to_str())
                .is_some_and(|name| run_dir.is_match(name));
            if !in_run_dir {
                continue;
            }

            let source = entry.path().display().to_string();
            match read_json_artifact::<Vec<BenchmarkRecord>>(entry.path()) {
                ArtifactRead::Loaded(mut records) => match records.pop() {
                    Some(record) => entries.push(TrendEntry { source, record }),
                    None => skip(&mut skipped, source, "history log is empty".to_string()),
                },
                ArtifactRead::Missing => {
                    skip(&mut skipped, source, "history log vanished during scan".to_string())
                }
                ArtifactRead::Invalid { reason } => skip(&mut skipped, source, reason),
            }
        }
    }

    entries.sort_by(|left, right| {
        left.record
            .timestamp
            .cmp(&right.record.timestamp)
            .then_with(|| left.source.cmp(&right.source))
    });

    let speedups = entries
        .iter()
        .filter_map(|entry| entry.record.speedup)
        .collect::<Vec<f64>>();
    let count = entries.len();
    let recent = entries.split_off(count.saturating_sub(RECENT_ENTRY_LIMIT));

    info!(
        path = %export_root.display(),
        runs = count,
        skipped = skipped.len(),
        "collected cross-run benchmark trend"
    );

    Ok(CrossRunView {
        count,
        sparkline: sparkline(&speedups),
        recent,
        skipped,
    })
}

fn skip(skipped: &mut Vec<SkippedArtifact>, path: String, reason: String) {
    warn!(path = %path, reason = %reason, "skipping history log");
    skipped.push(SkippedArtifact { path, reason });
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::util::write_json_pretty;

    fn record(offset_secs: i64, speedup: f64) -> BenchmarkRecord {
        let base = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        BenchmarkRecord {
            timestamp: base + Duration::seconds(offset_secs),
            speedup: Some(speedup),
            baseline_ms: 100.0 * speedup,
            enhanced_ms: 100.0,
        }
    }

    #[test]
    fn takes_last_entry_per_run_and_sorts_by_timestamp() {
        let root = tempfile::tempdir().expect("tempdir");
        write_json_pretty(
            &root.path().join("validation_b").join(HISTORY_FILE),
            &vec![record(0, 1.0), record(50, 4.0)],
        )
        .expect("write b");
        write_json_pretty(
            &root.path().join("validation_a").join(HISTORY_FILE),
            &vec![record(10, 2.0)],
        )
        .expect("write a");

        let view = cross_run_view(root.path()).expect("trend");

        assert_eq!(view.count, 2);
        let speedups = view
            .recent
            .iter()
            .filter_map(|entry| entry.record.speedup)
            .collect::<Vec<f64>>();
        assert_eq!(speedups, vec![2.0, 4.0]);
        assert_eq!(view.sparkline.chars().count(), 2);
        assert!(view.skipped.is_empty());
    }

    #[test]
    fn malformed_and_empty_logs_are_skipped_individually() {
        let root = tempfile::tempdir().expect("tempdir");
        let broken_dir = root.path().join("validation_broken");
        fs::create_dir_all(&broken_dir).expect("mkdir");
        fs::write(broken_dir.join(HISTORY_FILE), "not json").expect("write broken");
        write_json_pretty(
            &root.path().join("validation_empty").join(HISTORY_FILE),
            &Vec::<BenchmarkRecord>::new(),
        )
        .expect("write empty");
        write_json_pretty(
            &root.path().join("validation_ok").join(HISTORY_FILE),
            &vec![record(5, 3.0)],
        )
        .expect("write ok");

        let view = cross_run_view(root.path()).expect("trend");

        assert_eq!(view.count, 1);
        assert_eq!(view.skipped.len(), 2);
        assert!(
            view.skipped
                .iter()
                .any(|skipped| skipped.reason.contains("failed to parse"))
        );
    }

    #[test]
    fn recent_is_capped_to_newest_entries() {
        let root = tempfile::tempdir().expect("tempdir");
        for run in 0..30_i64 {
            write_json_pretty(
                &root.path().join(format!("validation_{run:02}")).join(HISTORY_FILE),
                &vec![record(run, 1.0 + run as f64)],
            )
            .expect("write run");
        }

        let view = cross_run_view(root.path()).expect("trend");

        assert_eq!(view.count, 30);
        assert_eq!(view.recent.len(), RECENT_ENTRY_LIMIT);
        assert_eq!(view.recent[0].record.speedup, Some(6.0));
        assert_eq!(view.recent[RECENT_ENTRY_LIMIT - 1].record.speedup, Some(30.0));
        assert_eq!(view.sparkline.chars().count(), 30);
    }

    #[test]
    fn family_logs_outside_run_directories_are_not_runs() {
        let root = tempfile::tempdir().expect("tempdir");
        write_json_pretty(
            &root.path().join("validation_a").join(HISTORY_FILE),
            &vec![record(0, 2.0)],
        )
        .expect("write run");
        write_json_pretty(
            &root.path().join("family").join(HISTORY_FILE),
            &vec![record(10, 9.0)],
        )
        .expect("write family");
        write_json_pretty(&root.path().join(HISTORY_FILE), &vec![record(20, 9.0)])
            .expect("write root log");
        write_json_pretty(
            &root
                .path()
                .join("validation_a")
                .join("nested")
                .join(HISTORY_FILE),
            &vec![record(30, 9.0)],
        )
        .expect("write nested");

        let view = cross_run_view(root.path()).expect("trend");

        assert_eq!(view.count, 1);
        assert_eq!(view.recent[0].record.speedup, Some(2.0));
        assert!(view.skipped.is_empty());
    }

    #[test]
    fn missing_root_yields_empty_view() {
        let root = tempfile::tempdir().expect("tempdir");
        let view = cross_run_view(&root.path().join("absent")).expect("trend");
        assert_eq!(view.count, 0);
        assert!(view.recent.is_empty());
        assert_eq!(view.sparkline, "");
    }
}
