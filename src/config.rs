use std::path::PathBuf;
use std::time::Duration;

use crate::error::GateError;

pub const MIN_SPEEDUP_ENV: &str = "MIN_SPEEDUP";
pub const ALLOW_REGRESSION_ENV: &str = "ALLOW_REGRESSION";
pub const DEFAULT_MIN_SPEEDUP: f64 = 1.0;

/// Settings for one gate invocation, resolved once at the entry point.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub min_speedup: f64,
    pub allow_regression: bool,
    pub repeat: usize,
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub export_root: PathBuf,
    pub history_path: PathBuf,
    pub latest_path: Option<PathBuf>,
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), GateError> {
        if self.repeat == 0 {
            return Err(GateError::Config("repeat must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(GateError::Config("timeout must be positive".to_string()));
        }
        check_min_speedup(self.min_speedup)?;
        Ok(())
    }
}

pub fn resolve_min_speedup(flag: Option<f64>) -> Result<f64, GateError> {
    if let Some(value) = flag {
        return check_min_speedup(value);
    }
    parse_min_speedup(std::env::var(MIN_SPEEDUP_ENV).ok().as_deref())
}

pub fn resolve_allow_regression(flag: bool) -> Result<bool, GateError> {
    if flag {
        return Ok(true);
    }
    parse_allow_regression(std::env::var(ALLOW_REGRESSION_ENV).ok().as_deref())
}

pub fn parse_min_speedup(value: Option<&str>) -> Result<f64, GateError> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(DEFAULT_MIN_SPEEDUP);
    };

    let parsed = raw.parse::<f64>().map_err(|err| {
        GateError::Config(format!("{MIN_SPEEDUP_ENV}={raw:?} is not a number: {err}"))
    })?;
    check_min_speedup(parsed)
}

pub fn parse_allow_regression(value: Option<&str>) -> Result<bool, GateError> {
    let Some(raw) = value else {
        return Ok(false);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GateError::Config(format!(
            "{ALLOW_REGRESSION_ENV}={raw:?} is not a recognized boolean"
        ))),
    }
}

fn check_min_speedup(value: f64) -> Result<f64, GateError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GateError::Config(format!(
            "minimum speedup must be a finite non-negative number, got {value}"
        )));
    }
    Ok(value)
}
