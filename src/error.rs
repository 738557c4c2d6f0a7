use std::time::Duration;

use thiserror::Error;

use crate::model::Variant;

/// Failures that the gate reports with their own process exit code.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{variant} pipeline failed on repeat {repeat}: {message}")]
    PipelineInvocation {
        variant: Variant,
        repeat: usize,
        message: String,
    },

    #[error("{variant} pipeline exceeded {timeout:?} on repeat {repeat}")]
    Timeout {
        variant: Variant,
        repeat: usize,
        timeout: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    RuntimeFailure = 1,
    RegressionDetected = 2,
    ConfigError = 3,
    Timeout = 4,
}

impl ExitStatus {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn for_error(err: &anyhow::Error) -> Self {
        let gate_error = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<GateError>());

        match gate_error {
            Some(GateError::Config(_)) => Self::ConfigError,
            Some(GateError::Timeout { .. }) => Self::Timeout,
            Some(GateError::PipelineInvocation { .. }) | None => Self::RuntimeFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn regression_code_is_two() {
        assert_eq!(ExitStatus::RegressionDetected.code(), 2);
        assert_eq!(ExitStatus::Success.code(), 0);
    }

    #[test]
    fn exit_status_follows_context_chain() {
        let err = Err::<(), _>(GateError::Timeout {
            variant: Variant::Enhanced,
            repeat: 2,
            timeout: Duration::from_secs(5),
        })
        .context("timing enhanced variant")
        .expect_err("error expected");
        assert_eq!(ExitStatus::for_error(&err), ExitStatus::Timeout);

        let err = anyhow::Error::new(GateError::Config("repeat must be >= 1".to_string()));
        assert_eq!(ExitStatus::for_error(&err), ExitStatus::ConfigError);

        let err = anyhow::anyhow!("disk full");
        assert_eq!(ExitStatus::for_error(&err), ExitStatus::RuntimeFailure);
    }

    #[test]
    fn no_failure_class_maps_to_regression_code() {
        let errors = [
            anyhow::Error::new(GateError::Config("bad".to_string())),
            anyhow::Error::new(GateError::PipelineInvocation {
                variant: Variant::Baseline,
                repeat: 1,
                message: "boom".to_string(),
            }),
            anyhow::anyhow!("io"),
        ];
        for err in &errors {
            assert_ne!(ExitStatus::for_error(err), ExitStatus::RegressionDetected);
        }
    }
}
