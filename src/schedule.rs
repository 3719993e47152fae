//! Staged concurrency ramp
//!
//! A schedule is an ordered, immutable list of (duration, target) stages.
//! The target for any elapsed time is a linear interpolation between the
//! previous stage's target (0 before the first stage) and the covering
//! stage's target; after the last stage the final target holds.

use crate::error::{Error, Result};
use std::time::Duration;

/// One segment of the load ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Ordered stage sequence, fixed once the test starts
#[derive(Debug, Clone)]
pub struct StageSchedule {
    stages: Vec<Stage>,
}

impl StageSchedule {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::EmptyStagePlan);
        }
        Ok(Self { stages })
    }

    /// Target number of concurrently active virtual users at `elapsed`
    ///
    /// Pure function of time; a zero-duration stage acts as a step.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut stage_start = Duration::ZERO;
        let mut previous_target = 0u32;
        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                if stage.duration.is_zero() {
                    return stage.target;
                }
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let from = f64::from(previous_target);
                let to = f64::from(stage.target);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                return (from + (to - from) * progress).round() as u32;
            }
            previous_target = stage.target;
            stage_start = stage_end;
        }
        // Past the end of the plan the final target holds; the orchestrator
        // stops ticking at total_duration anyway.
        self.stages.last().map_or(0, |s| s.target)
    }

    /// Overall test length: the sum of all stage durations
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

/// Parse a human duration string: `500ms`, `30s`, `1m`, `2h`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    let unit_start = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::invalid_duration(input, "missing unit (ms, s, m, h)"))?;
    let (digits, unit) = s.split_at(unit_start);
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::invalid_duration(input, "expected a leading integer"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(Error::invalid_duration(
            input,
            format!("unknown unit {other:?}"),
        )),
    }
}
