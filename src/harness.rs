use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::GateError;
use crate::model::{RunResult, Variant};

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub images: PathBuf,
    pub identity_label: String,
    pub variant: Variant,
    pub scope_restricted: bool,
    pub reverse_lookup_disabled: bool,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const WORKER_GRACE: Duration = Duration::from_secs(5);

/// The external compute pipeline being benchmarked. Only completion matters.
///
/// Implementations holding external resources stop them once `deadline` passes
/// and return [`PipelineTimedOut`].
pub trait Pipeline: Send + Sync {
    fn execute(&self, request: &PipelineRequest, deadline: Instant) -> Result<()>;
}

#[derive(Debug, Error)]
#[error("pipeline stopped at its deadline")]
pub struct PipelineTimedOut;

/// Runs the pipeline as a child process, one process per repeat.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn build_command(&self, request: &PipelineRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--images")
            .arg(&request.images)
            .arg("--identity")
            .arg(&request.identity_label)
            .arg("--variant")
            .arg(request.variant.as_str());
        if request.scope_restricted {
            command.arg("--scope-restricted");
        }
        if request.reverse_lookup_disabled {
            command.arg("--no-reverse-lookup");
        }
        command
    }
}

impl Pipeline for CommandPipeline {
    fn execute(&self, request: &PipelineRequest, deadline: Instant) -> Result<()> {
        let mut child = self
            .build_command(request)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {}", self.program.display()))?;

        // Drained off-thread so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });

        let status = loop {
            let polled = child
                .try_wait()
                .with_context(|| format!("failed to poll {}", self.program.display()))?;
            if let Some(status) = polled {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(err) = child.kill() {
                    warn!(pid = child.id(), error = %err, "failed to kill timed out pipeline");
                }
                child
                    .wait()
                    .with_context(|| format!("failed to reap {}", self.program.display()))?;
                return Err(PipelineTimedOut.into());
            }
            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        };

        if !status.success() {
            let stderr = stderr_reader
                .and_then(|reader| reader.join().ok())
                .unwrap_or_default();
            bail!(
                "{} returned {} for {} variant: {}",
                self.program.display(),
                status,
                request.variant,
                stderr.trim()
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TimingOutcome {
    pub variant: Variant,
    pub mean_seconds: f64,
    pub runs: Vec<RunResult>,
}

#[derive(Clone)]
pub struct TimingHarness {
    pipeline: Arc<dyn Pipeline>,
    timeout: Duration,
}

impl std::fmt::Debug for TimingHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingHarness")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TimingHarness {
    pub fn new(pipeline: Arc<dyn Pipeline>, timeout: Duration) -> Self {
        Self { pipeline, timeout }
    }

    /// Times `repeat` identical invocations and returns their mean duration.
    ///
    /// Any failed or timed-out repeat aborts the whole variant; no partial mean is produced.
    pub fn time_run(
        &self,
        images: &Path,
        identity_label: &str,
        is_baseline: bool,
        scope_restricted: bool,
        reverse_lookup_disabled: bool,
        repeat: usize,
    ) -> Result<TimingOutcome> {
        if repeat == 0 {
            return Err(GateError::Config("repeat must be at least 1".to_string()).into());
        }

        let variant = if is_baseline {
            Variant::Baseline
        } else {
            Variant::Enhanced
        };
        let request = PipelineRequest {
            images: images.to_path_buf(),
            identity_label: identity_label.to_string(),
            variant,
            scope_restricted,
            reverse_lookup_disabled,
        };

        let mut runs = Vec::with_capacity(repeat);
        for index in 1..=repeat {
            let elapsed = self.run_once(&request, index)?;
            debug!(
                variant = %variant,
                repeat = index,
                seconds = elapsed.as_secs_f64(),
                "pipeline repeat finished"
            );
            runs.push(RunResult {
                variant,
                duration_seconds: elapsed.as_secs_f64(),
                timestamp: Utc::now(),
            });
        }

        let total = runs.iter().map(|run| run.duration_seconds).sum::<f64>();
        let mean_seconds = total / runs.len() as f64;
        info!(variant = %variant, repeat, mean_seconds, "timed pipeline variant");

        Ok(TimingOutcome {
            variant,
            mean_seconds,
            runs,
        })
    }

    fn run_once(&self, request: &PipelineRequest, index: usize) -> Result<Duration> {
        let (sender, receiver) = mpsc::channel();
        let pipeline = Arc::clone(&self.pipeline);
        let worker_request = request.clone();
        let deadline = Instant::now() + self.timeout;

        thread::Builder::new()
            .name(format!("pipeline-{}-{index}", request.variant))
            .spawn(move || {
                let started = Instant::now();
                let outcome = pipeline.execute(&worker_request, deadline);
                let elapsed = started.elapsed();
                // The receiver is gone once the repeat has been abandoned.
                let _ = sender.send(outcome.map(|()| elapsed));
            })
            .context("failed to spawn pipeline worker thread")?;

        match receiver.recv_timeout(self.timeout) {
            Ok(Ok(elapsed)) => Ok(elapsed),
            Ok(Err(err)) if err.is::<PipelineTimedOut>() => Err(self.timeout_error(request, index)),
            Ok(Err(err)) => Err(GateError::PipelineInvocation {
                variant: request.variant,
                repeat: index,
                message: format!("{err:#}"),
            }
            .into()),
            Err(RecvTimeoutError::Timeout) => {
                // A pipeline that honours the deadline reaps its child within the grace period.
                if receiver.recv_timeout(WORKER_GRACE).is_err() {
                    warn!(
                        variant = %request.variant,
                        repeat = index,
                        "pipeline worker still running after timeout"
                    );
                }
                Err(self.timeout_error(request, index))
            }
            Err(RecvTimeoutError::Disconnected) => Err(GateError::PipelineInvocation {
                variant: request.variant,
                repeat: index,
                message: "pipeline worker exited without reporting".to_string(),
            }
            .into()),
        }
    }

    fn timeout_error(&self, request: &PipelineRequest, index: usize) -> anyhow::Error {
        GateError::Timeout {
            variant: request.variant,
            repeat: index,
            timeout: self.timeout,
        }
        .into()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Sleeps a fixed time per variant and optionally fails on a given call.
    pub(crate) struct FakePipeline {
        pub baseline_delay: Duration,
        pub enhanced_delay: Duration,
        pub fail_on_call: Option<usize>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<PipelineRequest>>,
    }

    impl FakePipeline {
        pub(crate) fn new(baseline_delay: Duration, enhanced_delay: Duration) -> Self {
            Self {
                baseline_delay,
                enhanced_delay,
                fail_on_call: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Pipeline for FakePipeline {
        fn execute(&self, request: &PipelineRequest, _deadline: Instant) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen
                .lock()
                .expect("seen lock")
                .push(request.clone());
            if self.fail_on_call == Some(call) {
                bail!("recognizer crashed on call {call}");
            }
            let delay = match request.variant {
                Variant::Baseline => self.baseline_delay,
                Variant::Enhanced => self.enhanced_delay,
            };
            thread::sleep(delay);
            Ok(())
        }
    }

    fn build_harness(pipeline: FakePipeline, timeout: Duration) -> (TimingHarness, Arc<FakePipeline>) {
        let pipeline = Arc::new(pipeline);
        let harness = TimingHarness::new(pipeline.clone(), timeout);
        (harness, pipeline)
    }

    #[test]
    fn time_run_averages_all_repeats() {
        let (harness, pipeline) = build_harness(
            FakePipeline::new(Duration::from_millis(20), Duration::from_millis(5)),
            Duration::from_secs(5),
        );

        let outcome = harness
            .time_run(Path::new("images"), "subject", true, true, false, 3)
            .expect("timing should succeed");

        assert_eq!(outcome.variant, Variant::Baseline);
        assert_eq!(outcome.runs.len(), 3);
        assert!(outcome.mean_seconds >= 0.020, "mean {}", outcome.mean_seconds);
        let expected = outcome.runs.iter().map(|run| run.duration_seconds).sum::<f64>() / 3.0;
        assert!((outcome.mean_seconds - expected).abs() < 1e-12);

        let seen = pipeline.seen.lock().expect("seen lock");
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|request| request.scope_restricted
            && !request.reverse_lookup_disabled
            && request.identity_label == "subject"));
    }

    #[test]
    fn failing_repeat_aborts_without_partial_mean() {
        let mut fake = FakePipeline::new(Duration::from_millis(1), Duration::from_millis(1));
        fake.fail_on_call = Some(2);
        let (harness, pipeline) = build_harness(fake, Duration::from_secs(5));

        let err = harness
            .time_run(Path::new("images"), "subject", false, false, false, 4)
            .expect_err("second repeat should fail the variant");

        match err.downcast_ref::<GateError>() {
            Some(GateError::PipelineInvocation {
                variant, repeat, ..
            }) => {
                assert_eq!(*variant, Variant::Enhanced);
                assert_eq!(*repeat, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2, "no repeats after failure");
    }

    #[test]
    fn slow_repeat_reports_timeout() {
        let (harness, _) = build_harness(
            FakePipeline::new(Duration::from_millis(500), Duration::from_millis(500)),
            Duration::from_millis(50),
        );

        let err = harness
            .time_run(Path::new("images"), "subject", true, false, false, 2)
            .expect_err("repeat should time out");

        assert!(matches!(
            err.downcast_ref::<GateError>(),
            Some(GateError::Timeout { repeat: 1, .. })
        ));
    }

    #[test]
    fn zero_repeat_is_a_config_error() {
        let (harness, _) = build_harness(
            FakePipeline::new(Duration::ZERO, Duration::ZERO),
            Duration::from_secs(1),
        );
        let err = harness
            .time_run(Path::new("images"), "subject", true, false, false, 0)
            .expect_err("zero repeat");
        assert!(matches!(err.downcast_ref::<GateError>(), Some(GateError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn command_pipeline_passes_variant_flags_and_reports_failures() {
        let ok = CommandPipeline::new("sh", vec!["-c".to_string(), "exit 0".to_string()]);
        let request = PipelineRequest {
            images: PathBuf::from("images"),
            identity_label: "subject".to_string(),
            variant: Variant::Enhanced,
            scope_restricted: true,
            reverse_lookup_disabled: true,
        };
        let deadline = Instant::now() + Duration::from_secs(10);
        ok.execute(&request, deadline).expect("exit 0 should succeed");

        let args = ok
            .build_command(&request)
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect::<Vec<String>>();
        assert_eq!(
            args,
            vec![
                "-c",
                "exit 0",
                "--images",
                "images",
                "--identity",
                "subject",
                "--variant",
                "enhanced",
                "--scope-restricted",
                "--no-reverse-lookup",
            ]
        );

        let failing = CommandPipeline::new(
            "sh",
            vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()],
        );
        let err = failing
            .execute(&request, deadline)
            .expect_err("exit 3 should fail");
        assert!(format!("{err:#}").contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_command_is_killed_before_it_finishes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("finished");
        let script = format!("sleep 2; touch '{}'", marker.display());
        let pipeline = CommandPipeline::new("sh", vec!["-c".to_string(), script]);
        let harness = TimingHarness::new(Arc::new(pipeline), Duration::from_millis(200));

        let started = Instant::now();
        let err = harness
            .time_run(Path::new("images"), "subject", true, false, false, 1)
            .expect_err("repeat should time out");

        assert!(matches!(
            err.downcast_ref::<GateError>(),
            Some(GateError::Timeout { repeat: 1, .. })
        ));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "harness returned after {:?}",
            started.elapsed()
        );
        thread::sleep(Duration::from_millis(2500));
        assert!(!marker.exists(), "killed pipeline kept running");
    }
}
