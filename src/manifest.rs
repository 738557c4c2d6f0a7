use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::model::{
    ArtifactRead, MANIFEST_FILE, PIPELINE_DIFF_FILE, REGRESSION_STATUS_FILE, RegressionStatus,
    SPARKLINE_FILE, SUMMARY_FILE, ValidationManifest,
};
use crate::util::{read_json_artifact, write_json_pretty};

/// Assembles a run directory's manifest from whatever artifacts it currently holds.
pub fn build_manifest(run_dir: &Path) -> ValidationManifest {
    let has_pipeline_diff = run_dir.join(PIPELINE_DIFF_FILE).is_file();
    let benchmark = read_optional::<serde_json::Value>(&run_dir.join(SUMMARY_FILE));
    let regression = read_optional::<RegressionStatus>(&run_dir.join(REGRESSION_STATUS_FILE));
    let sparkline = read_sparkline(&run_dir.join(SPARKLINE_FILE));

    ValidationManifest {
        path: run_dir.display().to_string(),
        has_pipeline_diff,
        benchmark,
        regression,
        sparkline,
    }
}

pub fn write_manifest(run_dir: &Path) -> Result<PathBuf> {
    let manifest = build_manifest(run_dir);
    let manifest_path = run_dir.join(MANIFEST_FILE);
    write_json_pretty(&manifest_path, &manifest)?;
    info!(
        path = %manifest_path.display(),
        has_pipeline_diff = manifest.has_pipeline_diff,
        has_benchmark = manifest.benchmark.is_some(),
        has_regression = manifest.regression.is_some(),
        "wrote validation manifest"
    );
    Ok(manifest_path)
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match read_json_artifact::<T>(path) {
        ArtifactRead::Loaded(value) => Some(value),
        ArtifactRead::Missing => None,
        ArtifactRead::Invalid { reason } => {
            warn!(path = %path.display(), reason = %reason, "manifest input unreadable");
            None
        }
    }
}

fn read_sparkline(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(raw.trim().to_string()).filter(|line| !line.is_empty()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "sparkline unreadable");
            None
        }
    }
}
