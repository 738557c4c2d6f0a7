use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::model::{ArtifactRead, MANIFEST_FILE};
use crate::util::{epoch_seconds_string, read_json_artifact, write_json_pretty};

pub const RUN_DIR_PATTERN: &str = r"^validation_[A-Za-z0-9._-]+$";

pub const NO_RUNS_ERROR: &str = "no validation directories found";
pub const MANIFEST_MISSING_ERROR: &str = "validation_manifest.json missing in newest directory";
pub const MANIFEST_UNREADABLE_ERROR: &str = "validation_manifest.json unreadable in newest directory";

/// Republishes the newest run's manifest at `latest_path`.
pub fn refresh(export_root: &Path, latest_path: &Path) -> Result<Map<String, Value>> {
    let mut pointer = match newest_run_dir(export_root)? {
        None => {
            warn!(path = %export_root.display(), "no validation directories found");
            error_object(json!({ "error": NO_RUNS_ERROR }))
        }
        Some(run_dir) => pointer_for(&run_dir),
    };
    pointer.insert(
        "generated_at".to_string(),
        Value::String(epoch_seconds_string()),
    );

    write_json_pretty(latest_path, &pointer)?;
    info!(path = %latest_path.display(), "refreshed latest validation pointer");
    Ok(pointer)
}

pub fn run_dir_regex() -> Result<Regex> {
    Regex::new(RUN_DIR_PATTERN).context("failed to compile run directory regex")
}

pub fn newest_run_dir(export_root: &Path) -> Result<Option<PathBuf>> {
    let pattern = run_dir_regex()?;

    let entries = match fs::read_dir(export_root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read {}", export_root.display()));
        }
    };

    let mut newest: Option<(SystemTime, String, PathBuf)> = None;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", export_root.display()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !pattern.is_match(&name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => continue,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "cannot stat run directory");
                continue;
            }
        };
        let modified = metadata
            .modified()
            .with_context(|| format!("mtime unavailable for {}", entry.path().display()))?;

        let candidate = (modified, name, entry.path());
        let is_newer = newest
            .as_ref()
            .is_none_or(|(time, name, _)| (candidate.0, &candidate.1) > (*time, name));
        if is_newer {
            newest = Some(candidate);
        }
    }

    Ok(newest.map(|(_, _, path)| path))
}

fn pointer_for(run_dir: &Path) -> Map<String, Value> {
    let manifest_path = run_dir.join(MANIFEST_FILE);
    match read_json_artifact::<Map<String, Value>>(&manifest_path) {
        ArtifactRead::Loaded(fields) => fields,
        ArtifactRead::Missing => {
            warn!(path = %run_dir.display(), "newest run has no manifest");
            error_object(json!({
                "error": MANIFEST_MISSING_ERROR,
                "path": run_dir.display().to_string(),
            }))
        }
        ArtifactRead::Invalid { reason } => {
            warn!(path = %run_dir.display(), reason = %reason, "newest manifest unreadable");
            error_object(json!({
                "error": MANIFEST_UNREADABLE_ERROR,
                "path": run_dir.display().to_string(),
                "cause": reason,
            }))
        }
    }
}

fn error_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(fields) => fields,
        _ => Map::new(),
    }
}
