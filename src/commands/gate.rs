use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cli::GateArgs;
use crate::config::{GateConfig, resolve_allow_regression, resolve_min_speedup};
use crate::error::{ExitStatus, GateError};
use crate::harness::{CommandPipeline, TimingHarness, TimingOutcome};
use crate::history::{HistoryStore, sparkline, summarize};
use crate::latest;
use crate::manifest::write_manifest;
use crate::model::{
    ComponentSample, HISTORY_FILE, REGRESSION_STATUS_FILE, RUN_DIR_PREFIX, RUNS_FILE,
    RegressionStatus, RunResult, SPARKLINE_FILE, SUMMARY_FILE,
};
use crate::regression::decide;
use crate::util::{ensure_directory, utc_compact_string, write_json_pretty, write_text};

/// What to feed both pipeline variants.
#[derive(Debug, Clone)]
pub struct Workload {
    pub images: PathBuf,
    pub identity_label: String,
    pub scope_restricted: bool,
    pub reverse_lookup_disabled: bool,
}

#[derive(Debug)]
pub struct GateReport {
    pub status: RegressionStatus,
    pub manifest_path: PathBuf,
    pub history_len: usize,
}

impl GateReport {
    pub fn exit_status(&self) -> ExitStatus {
        if self.status.regression {
            ExitStatus::RegressionDetected
        } else {
            ExitStatus::Success
        }
    }
}

pub fn run(args: GateArgs) -> Result<ExitStatus> {
    let config = build_config(&args)?;

    if !args.images.exists() {
        return Err(GateError::Config(format!(
            "image source does not exist: {}",
            args.images.display()
        ))
        .into());
    }
    let workload = Workload {
        images: args.images.clone(),
        identity_label: args.identity.clone(),
        scope_restricted: args.scope_restricted,
        reverse_lookup_disabled: args.no_reverse_lookup,
    };

    let pipeline = CommandPipeline::new(&args.pipeline_program, args.pipeline_args.clone());
    let harness = TimingHarness::new(Arc::new(pipeline), config.timeout);

    let report = run_gate(&config, &workload, &harness)?;
    Ok(report.exit_status())
}

fn build_config(args: &GateArgs) -> Result<GateConfig, GateError> {
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        args.export_root.join(format!(
            "{RUN_DIR_PREFIX}{}",
            utc_compact_string(Utc::now())
        ))
    });
    let history_path = args
        .history_path
        .clone()
        .unwrap_or_else(|| output_dir.join(HISTORY_FILE));

    let config = GateConfig {
        min_speedup: resolve_min_speedup(args.min_speedup)?,
        allow_regression: resolve_allow_regression(args.allow_regression)?,
        repeat: args.repeat,
        timeout: Duration::from_secs(args.timeout_secs),
        output_dir,
        export_root: args.export_root.clone(),
        history_path,
        latest_path: (!args.skip_latest).then(|| args.latest_path.clone()),
    };
    config.validate()?;
    Ok(config)
}

/// Times both variants, records the decision, and refreshes derived artifacts.
pub fn run_gate(
    config: &GateConfig,
    workload: &Workload,
    harness: &TimingHarness,
) -> Result<GateReport> {
    ensure_directory(&config.output_dir)?;
    info!(
        output_dir = %config.output_dir.display(),
        repeat = config.repeat,
        min_speedup = config.min_speedup,
        allow_regression = config.allow_regression,
        "starting benchmark gate"
    );

    let timed = time_variant(harness, workload, true, config.repeat)
        .context("timing baseline variant")
        .and_then(|baseline| {
            time_variant(harness, workload, false, config.repeat)
                .context("timing enhanced variant")
                .map(|enhanced| (baseline, enhanced))
        });
    let (baseline, enhanced) = match timed {
        Ok(outcomes) => outcomes,
        Err(err) => {
            record_failure(config, &err);
            return Err(err);
        }
    };
    for outcome in [&baseline, &enhanced] {
        debug!(
            variant = %outcome.variant,
            mean_seconds = outcome.mean_seconds,
            runs = outcome.runs.len(),
            "variant timing complete"
        );
    }

    let runs = baseline
        .runs
        .iter()
        .chain(enhanced.runs.iter())
        .cloned()
        .collect::<Vec<RunResult>>();
    write_json_pretty(&config.output_dir.join(RUNS_FILE), &runs)?;

    let status = decide(
        baseline.mean_seconds,
        enhanced.mean_seconds,
        config.min_speedup,
        config.allow_regression,
    );
    write_json_pretty(&config.output_dir.join(REGRESSION_STATUS_FILE), &status)?;

    let store = HistoryStore::new(&config.history_path);
    let history_len = store.append(status.to_record(Utc::now()))?;

    let summary = summarize(&repeat_samples(&runs));
    write_json_pretty(&config.output_dir.join(SUMMARY_FILE), &summary)?;

    write_history_sparkline(&store, &config.output_dir.join(SPARKLINE_FILE))?;

    let manifest_path = write_manifest(&config.output_dir)?;
    if let Some(latest_path) = &config.latest_path {
        latest::refresh(&config.export_root, latest_path)?;
    }

    if status.regression {
        warn!(reason = %status.reason, "performance regression detected");
    } else {
        info!(reason = %status.reason, "no performance regression");
    }

    Ok(GateReport {
        status,
        manifest_path,
        history_len,
    })
}

fn time_variant(
    harness: &TimingHarness,
    workload: &Workload,
    is_baseline: bool,
    repeat: usize,
) -> Result<TimingOutcome> {
    harness.time_run(
        &workload.images,
        &workload.identity_label,
        is_baseline,
        workload.scope_restricted,
        workload.reverse_lookup_disabled,
        repeat,
    )
}

/// Leaves an error object where the status would have been and republishes the run.
fn record_failure(config: &GateConfig, err: &anyhow::Error) {
    let recorded = write_json_pretty(
        &config.output_dir.join(REGRESSION_STATUS_FILE),
        &failure_object(err),
    )
    .and_then(|()| write_manifest(&config.output_dir))
    .and_then(|_| match &config.latest_path {
        Some(latest_path) => latest::refresh(&config.export_root, latest_path).map(|_| ()),
        None => Ok(()),
    });

    if let Err(record_err) = recorded {
        warn!(
            output_dir = %config.output_dir.display(),
            error = %format!("{record_err:#}"),
            "failed to record gate failure"
        );
    }
}

fn failure_object(err: &anyhow::Error) -> Value {
    let (kind, variant, repeat) = match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<GateError>())
    {
        Some(GateError::Timeout {
            variant, repeat, ..
        }) => ("timeout", Some(*variant), Some(*repeat)),
        Some(GateError::PipelineInvocation {
            variant, repeat, ..
        }) => ("pipeline_invocation", Some(*variant), Some(*repeat)),
        Some(GateError::Config(_)) | None => ("runtime", None, None),
    };
    json!({
        "error": format!("{err:#}"),
        "kind": kind,
        "variant": variant,
        "repeat": repeat,
    })
}

/// One sample per repeat: category is the variant, component is `<variant>_ms`.
fn repeat_samples(runs: &[RunResult]) -> Vec<ComponentSample> {
    runs.iter()
        .map(|run| {
            let mut sample = ComponentSample {
                category: Some(run.variant.as_str().to_string()),
                ..ComponentSample::default()
            };
            sample.components.insert(
                format!("{}_ms", run.variant.as_str()),
                Some(run.duration_seconds * 1000.0),
            );
            sample
        })
        .collect()
}

fn write_history_sparkline(store: &HistoryStore, path: &Path) -> Result<()> {
    let speedups = store
        .load()?
        .iter()
        .filter_map(|record| record.speedup)
        .collect::<Vec<f64>>();
    let line = sparkline(&speedups);
    if line.is_empty() {
        warn!(path = %store.path().display(), "no finite speedups for sparkline");
        return Ok(());
    }
    write_text(path, &line)
}
