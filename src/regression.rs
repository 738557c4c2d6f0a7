use crate::model::{RegressionStatus, SpeedupAnomaly};

/// Compares baseline and enhanced durations (seconds) against the speedup threshold.
pub fn decide(
    baseline_duration: f64,
    enhanced_duration: f64,
    min_speedup: f64,
    allow_regression: bool,
) -> RegressionStatus {
    let baseline_ms = baseline_duration * 1000.0;
    let enhanced_ms = enhanced_duration * 1000.0;

    if enhanced_duration <= 0.0 {
        return decide_anomalous(
            baseline_duration,
            baseline_ms,
            enhanced_ms,
            min_speedup,
            allow_regression,
        );
    }

    let speedup = baseline_duration / enhanced_duration;
    let below_threshold = speedup < min_speedup;
    let regression = below_threshold && !allow_regression;

    let mut reason = if below_threshold {
        format!("Speedup {speedup:?}x is below minimum {min_speedup:?}x")
    } else {
        format!("Speedup {speedup:?}x meets minimum {min_speedup:?}x")
    };
    if below_threshold && allow_regression {
        reason.push_str(" (regression allowed by override)");
    }

    RegressionStatus {
        regression,
        reason,
        speedup: Some(speedup),
        baseline_ms,
        enhanced_ms,
        min_speedup,
        allow_regression,
        anomaly: None,
    }
}

fn decide_anomalous(
    baseline_duration: f64,
    baseline_ms: f64,
    enhanced_ms: f64,
    min_speedup: f64,
    allow_regression: bool,
) -> RegressionStatus {
    let (anomaly, regression, mut reason) = if baseline_duration <= 0.0 {
        (
            SpeedupAnomaly::DegenerateDurations,
            false,
            format!(
                "Speedup undefined: baseline {baseline_ms:.3}ms and enhanced {enhanced_ms:.3}ms are both non-positive (minimum {min_speedup:?}x)"
            ),
        )
    } else {
        (
            SpeedupAnomaly::NonPositiveEnhanced,
            !allow_regression,
            format!(
                "Speedup inf: enhanced duration {enhanced_ms:.3}ms is non-positive against baseline {baseline_ms:.3}ms (minimum {min_speedup:?}x); needs review"
            ),
        )
    };
    if anomaly == SpeedupAnomaly::NonPositiveEnhanced && allow_regression {
        reason.push_str(" (regression allowed by override)");
    }

    RegressionStatus {
        regression,
        reason,
        speedup: None,
        baseline_ms,
        enhanced_ms,
        min_speedup,
        allow_regression,
        anomaly: Some(anomaly),
    }
}
