//! End-of-run summary
//!
//! Rendering is separated from printing so the summary can be asserted on in
//! tests. Nothing here affects request generation.

use crate::metrics::{MetricsSnapshot, ERRORS_METRIC};
use crate::threshold::ThresholdReport;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::time::Duration;

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub started_at: DateTime<Local>,
    pub wall_time: Duration,
    pub snapshot: MetricsSnapshot,
    pub report: ThresholdReport,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

fn millis(duration: Option<Duration>) -> String {
    duration.map_or_else(
        || "-".to_string(),
        |d| format!("{:.1}ms", d.as_secs_f64() * 1000.0),
    )
}

/// Render the human-readable summary block
pub fn render(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==== load test summary ====");
    let _ = writeln!(
        out,
        "started:    {}",
        outcome.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "wall time:  {:.1}s", outcome.wall_time.as_secs_f64());
    let _ = writeln!(out, "requests:   {}", outcome.snapshot.sample_count());

    if let Some(rate) = outcome.snapshot.rate(ERRORS_METRIC) {
        let _ = writeln!(
            out,
            "checks:     {} passed, {} failed (error rate {:.4})",
            rate.successes,
            rate.failures,
            rate.rate().into_inner()
        );
    } else {
        let _ = writeln!(out, "checks:     none recorded");
    }

    let _ = writeln!(
        out,
        "latency:    min {}  p50 {}  p95 {}  max {}",
        millis(outcome.snapshot.latency_min()),
        millis(outcome.snapshot.latency_median()),
        millis(outcome.snapshot.latency_percentile(95.0)),
        millis(outcome.snapshot.latency_max()),
    );

    let _ = writeln!(out, "---- thresholds ----");
    for verdict in outcome.report.verdicts() {
        let status = if verdict.passed { "PASS" } else { "FAIL" };
        let observed = verdict
            .observed
            .map_or_else(|| "no samples".to_string(), |v| format!("observed {v:.4}"));
        let _ = writeln!(
            out,
            "[{status}] {}: {} ({observed})",
            verdict.metric, verdict.expression
        );
    }
    let _ = writeln!(
        out,
        "verdict:    {}",
        if outcome.passed() { "PASS" } else { "FAIL" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use crate::threshold::ThresholdSet;
    use std::collections::HashMap;

    fn thresholds() -> ThresholdSet {
        let mut config = HashMap::new();
        config.insert(
            "http_req_duration".to_string(),
            vec!["p(95)<500".to_string()],
        );
        config.insert(ERRORS_METRIC.to_string(), vec!["rate<0.1".to_string()]);
        ThresholdSet::from_config(&config).unwrap()
    }

    fn outcome(metrics: &MetricsCollector) -> RunOutcome {
        let snapshot = metrics.snapshot();
        let report = thresholds().evaluate(&snapshot);
        RunOutcome {
            started_at: Local::now(),
            wall_time: Duration::from_secs(240),
            snapshot,
            report,
        }
    }

    #[test]
    fn passing_run_renders_pass_verdict() {
        let metrics = MetricsCollector::new();
        for _ in 0..10 {
            metrics.record_success(ERRORS_METRIC);
            metrics.record_latency(Duration::from_millis(50));
        }
        let rendered = render(&outcome(&metrics));
        assert!(rendered.contains("verdict:    PASS"));
        assert!(rendered.contains("[PASS] errors: rate<0.1"));
        assert!(rendered.contains("requests:   10"));
    }

    #[test]
    fn failing_run_renders_fail_verdict() {
        let metrics = MetricsCollector::new();
        for _ in 0..10 {
            metrics.record_failure(ERRORS_METRIC);
            metrics.record_latency(Duration::from_millis(900));
        }
        let rendered = render(&outcome(&metrics));
        assert!(rendered.contains("verdict:    FAIL"));
        assert!(rendered.contains("[FAIL] errors: rate<0.1"));
        assert!(rendered.contains("[FAIL] http_req_duration: p(95)<500"));
    }

    #[test]
    fn empty_run_renders_without_panicking() {
        let rendered = render(&outcome(&MetricsCollector::new()));
        assert!(rendered.contains("checks:     none recorded"));
        assert!(rendered.contains("min -"));
    }
}
