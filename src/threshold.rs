//! Threshold predicates and end-of-run evaluation
//!
//! Predicates use the same grammar as the original test options:
//! `p(95)<500` compares a latency percentile (milliseconds) and `rate<0.1`
//! compares a named error rate. `<`, `<=`, `>` and `>=` are accepted.
//! Unparseable predicates abort the run before any virtual user starts.

use crate::error::{Error, Result};
use crate::metrics::MetricsSnapshot;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, observed: f64, limit: f64) -> bool {
        match self {
            Comparison::Lt => observed < limit,
            Comparison::Le => observed <= limit,
            Comparison::Gt => observed > limit,
            Comparison::Ge => observed >= limit,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// One parsed predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdExpr {
    /// `p(N) OP millis` over the request latency samples
    LatencyPercentile {
        percentile: f64,
        op: Comparison,
        limit_ms: f64,
    },
    /// `rate OP value` over a named error rate
    Rate { op: Comparison, limit: f64 },
}

impl ThresholdExpr {
    pub fn parse(input: &str) -> Result<Self> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(rest) = compact.strip_prefix("p(") {
            let close = rest
                .find(')')
                .ok_or_else(|| Error::invalid_threshold(input, "unclosed percentile"))?;
            let percentile: f64 = rest[..close]
                .parse()
                .map_err(|_| Error::invalid_threshold(input, "percentile is not a number"))?;
            if !(0.0..=100.0).contains(&percentile) {
                return Err(Error::invalid_threshold(
                    input,
                    "percentile must be in [0, 100]",
                ));
            }
            let (op, limit_ms) = parse_comparison(input, &rest[close + 1..])?;
            Ok(Self::LatencyPercentile {
                percentile,
                op,
                limit_ms,
            })
        } else if let Some(rest) = compact.strip_prefix("rate") {
            let (op, limit) = parse_comparison(input, rest)?;
            Ok(Self::Rate { op, limit })
        } else {
            Err(Error::invalid_threshold(
                input,
                "expected `p(N)` or `rate` on the left-hand side",
            ))
        }
    }
}

fn parse_comparison(original: &str, rest: &str) -> Result<(Comparison, f64)> {
    let (op, value) = if let Some(v) = rest.strip_prefix("<=") {
        (Comparison::Le, v)
    } else if let Some(v) = rest.strip_prefix(">=") {
        (Comparison::Ge, v)
    } else if let Some(v) = rest.strip_prefix('<') {
        (Comparison::Lt, v)
    } else if let Some(v) = rest.strip_prefix('>') {
        (Comparison::Gt, v)
    } else {
        return Err(Error::invalid_threshold(
            original,
            "expected a comparison operator (<, <=, >, >=)",
        ));
    };
    let limit: f64 = value
        .parse()
        .map_err(|_| Error::invalid_threshold(original, "right-hand side is not a number"))?;
    if !limit.is_finite() {
        return Err(Error::invalid_threshold(
            original,
            "right-hand side must be finite",
        ));
    }
    Ok((op, limit))
}

/// One predicate bound to the metric it guards
#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub expr: ThresholdExpr,
}

/// The full configured threshold set
#[derive(Debug, Clone, Default)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    /// Parse the metric-name -> predicate-strings map; fatal on any bad entry
    pub fn from_config(config: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut thresholds = Vec::new();
        for (metric, expressions) in config {
            for expression in expressions {
                thresholds.push(Threshold {
                    metric: metric.clone(),
                    expression: expression.clone(),
                    expr: ThresholdExpr::parse(expression)?,
                });
            }
        }
        // Config maps iterate in arbitrary order; keep reports stable.
        thresholds.sort_by(|a, b| {
            (a.metric.as_str(), a.expression.as_str())
                .cmp(&(b.metric.as_str(), b.expression.as_str()))
        });
        Ok(Self { thresholds })
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Evaluate every predicate against the final snapshot
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdReport {
        let verdicts = self
            .thresholds
            .iter()
            .map(|threshold| {
                let observed = match threshold.expr {
                    ThresholdExpr::LatencyPercentile { percentile, .. } => snapshot
                        .latency_percentile(percentile)
                        .map(|d| d.as_secs_f64() * 1000.0),
                    ThresholdExpr::Rate { .. } => snapshot
                        .rate(&threshold.metric)
                        .map(|r| r.rate().into_inner()),
                };
                let passed = match (observed, threshold.expr) {
                    (Some(value), ThresholdExpr::LatencyPercentile { op, limit_ms, .. }) => {
                        op.holds(value, limit_ms)
                    }
                    (Some(value), ThresholdExpr::Rate { op, limit }) => op.holds(value, limit),
                    (None, _) => {
                        // Nothing was recorded for this metric; a run that
                        // never exercised it cannot violate it.
                        warn!(
                            metric = %threshold.metric,
                            expression = %threshold.expression,
                            "threshold passed vacuously: no samples recorded"
                        );
                        true
                    }
                };
                ThresholdVerdict {
                    metric: threshold.metric.clone(),
                    expression: threshold.expression.clone(),
                    observed,
                    passed,
                }
            })
            .collect();
        ThresholdReport { verdicts }
    }
}

/// Outcome of one predicate
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdVerdict {
    pub metric: String,
    pub expression: String,
    /// Observed value: milliseconds for percentiles, a fraction for rates
    pub observed: Option<f64>,
    pub passed: bool,
}

/// All verdicts plus the overall pass/fail
#[derive(Debug, Clone, Default)]
pub struct ThresholdReport {
    verdicts: Vec<ThresholdVerdict>,
}

impl ThresholdReport {
    pub fn verdicts(&self) -> &[ThresholdVerdict] {
        &self.verdicts
    }

    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }
}

impl std::fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdExpr::LatencyPercentile {
                percentile,
                op,
                limit_ms,
            } => write!(f, "p({percentile}){}{limit_ms}", op.symbol()),
            ThresholdExpr::Rate { op, limit } => write!(f, "rate{}{limit}", op.symbol()),
        }
    }
}
