use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REGRESSION_STATUS_FILE: &str = "regression_status.json";
pub const HISTORY_FILE: &str = "benchmark_history.json";
pub const SUMMARY_FILE: &str = "benchmark_summary.json";
pub const SPARKLINE_FILE: &str = "benchmark_sparkline.txt";
pub const RUNS_FILE: &str = "benchmark_runs.json";
pub const MANIFEST_FILE: &str = "validation_manifest.json";
pub const PIPELINE_DIFF_FILE: &str = "pipeline_diff.md";
pub const TREND_FILE: &str = "benchmark_trend.json";
pub const LATEST_FILE: &str = "latest_validation.json";
pub const RUN_DIR_PREFIX: &str = "validation_";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Baseline,
    Enhanced,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed invocation of a pipeline variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub variant: Variant,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub timestamp: DateTime<Utc>,
    pub speedup: Option<f64>,
    pub baseline_ms: f64,
    pub enhanced_ms: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedupAnomaly {
    /// Enhanced run reported no elapsed time while the baseline did.
    NonPositiveEnhanced,
    /// Neither variant reported a positive duration.
    DegenerateDurations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionStatus {
    pub regression: bool,
    pub reason: String,
    pub speedup: Option<f64>,
    pub baseline_ms: f64,
    pub enhanced_ms: f64,
    pub min_speedup: f64,
    pub allow_regression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<SpeedupAnomaly>,
}

impl RegressionStatus {
    pub fn to_record(&self, timestamp: DateTime<Utc>) -> BenchmarkRecord {
        BenchmarkRecord {
            timestamp,
            speedup: self.speedup,
            baseline_ms: self.baseline_ms,
            enhanced_ms: self.enhanced_ms,
        }
    }
}

/// A row of the component sample table: one category label plus numeric fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSample {
    pub category: Option<String>,
    pub components: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub components: BTreeMap<String, ComponentStats>,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationManifest {
    pub path: String,
    pub has_pipeline_diff: bool,
    pub benchmark: Option<serde_json::Value>,
    pub regression: Option<RegressionStatus>,
    pub sparkline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendEntry {
    pub source: String,
    #[serde(flatten)]
    pub record: BenchmarkRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArtifact {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRunView {
    pub count: usize,
    pub sparkline: String,
    pub recent: Vec<TrendEntry>,
    pub skipped: Vec<SkippedArtifact>,
}

/// Outcome of reading a single artifact file.
#[derive(Debug)]
pub enum ArtifactRead<T> {
    Loaded(T),
    Missing,
    Invalid { reason: String },
}
