use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::model::ArtifactRead;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn epoch_seconds_string() -> String {
    Utc::now().timestamp().to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Replaces `path` with `data` in one rename so readers never see a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_directory(parent)?;

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to stage temp file in {}", parent.display()))?;
    staged
        .write_all(data)
        .with_context(|| format!("failed to write staged data for {}", path.display()))?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("failed to sync staged data for {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;
    data.push(b'\n');
    write_atomic(path, &data)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    let mut data = text.as_bytes().to_vec();
    data.push(b'\n');
    write_atomic(path, &data)
}

/// Reads one JSON artifact without letting a bad file abort the caller.
pub fn read_json_artifact<T: DeserializeOwned>(path: &Path) -> ArtifactRead<T> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ArtifactRead::Missing,
        Err(err) => {
            return ArtifactRead::Invalid {
                reason: format!("failed to read {}: {err}", path.display()),
            };
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(value) => ArtifactRead::Loaded(value),
        Err(err) => ArtifactRead::Invalid {
            reason: format!("failed to parse {}: {err}", path.display()),
        },
    }
}
