use crate::error::Result;
use crate::metrics::{ERRORS_METRIC, REQUEST_DURATION_METRIC};
use crate::schedule::{parse_duration, Stage, StageSchedule};
use crate::threshold::ThresholdSet;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub targets: TargetSettings,
    pub scenario: ScenarioSettings,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageSetting>,
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, Vec<String>>,
    pub logging: LoggingSettings,
}

/// Base URLs of the two services under test
#[derive(Debug, Deserialize, Clone)]
pub struct TargetSettings {
    pub ingest_base_url: String,
    pub api_base_url: String,
}

/// Per-iteration knobs; the defaults reproduce the original scenario
#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioSettings {
    pub recommend_count: u32,
    pub popular_count: u32,
    pub think_after_ingest_ms: u64,
    pub think_after_recommend_ms: u64,
    pub think_after_popular_ms: u64,
    pub request_timeout_ms: u64,
    pub reconcile_interval_ms: u64,
    /// Seed for the per-user request RNG; unset means a fresh seed per run
    pub seed: Option<u64>,
}

/// One stage as configured; duration is a human string ("30s", "1m")
#[derive(Debug, Deserialize, Clone)]
pub struct StageSetting {
    pub duration: String,
    pub target: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

fn default_stages() -> Vec<StageSetting> {
    vec![
        StageSetting {
            duration: "30s".to_string(),
            target: 10,
        },
        StageSetting {
            duration: "1m".to_string(),
            target: 50,
        },
        StageSetting {
            duration: "2m".to_string(),
            target: 100,
        },
        StageSetting {
            duration: "30s".to_string(),
            target: 0,
        },
    ]
}

fn default_thresholds() -> HashMap<String, Vec<String>> {
    let mut thresholds = HashMap::new();
    thresholds.insert(
        REQUEST_DURATION_METRIC.to_string(),
        vec!["p(95)<500".to_string()],
    );
    thresholds.insert(ERRORS_METRIC.to_string(), vec!["rate<0.1".to_string()]);
    thresholds
}

impl Settings {
    /// Load settings from defaults, optional config files, and environment
    ///
    /// Environment overrides use the `STAMPEDE` prefix with `__` separating
    /// nested keys, e.g. `STAMPEDE_TARGETS__API_BASE_URL=http://reco:8081`.
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("targets.ingest_base_url", "http://localhost:8080")?
            .set_default("targets.api_base_url", "http://localhost:8081")?
            .set_default("scenario.recommend_count", 10)?
            .set_default("scenario.popular_count", 20)?
            .set_default("scenario.think_after_ingest_ms", 1000)?
            .set_default("scenario.think_after_recommend_ms", 1000)?
            .set_default("scenario.think_after_popular_ms", 2000)?
            .set_default("scenario.request_timeout_ms", 30_000)?
            .set_default("scenario.reconcile_interval_ms", 500)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("STAMPEDE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Parse the configured stage list into an executable schedule
    pub fn stage_schedule(&self) -> Result<StageSchedule> {
        let stages = self
            .stages
            .iter()
            .map(|s| Ok(Stage::new(parse_duration(&s.duration)?, s.target)))
            .collect::<Result<Vec<_>>>()?;
        StageSchedule::new(stages)
    }

    /// Parse the configured threshold map
    pub fn threshold_set(&self) -> Result<ThresholdSet> {
        ThresholdSet::from_config(&self.thresholds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario.request_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.scenario.reconcile_interval_ms)
    }

    pub fn think_times(&self) -> [Duration; 3] {
        [
            Duration::from_millis(self.scenario.think_after_ingest_ms),
            Duration::from_millis(self.scenario.think_after_recommend_ms),
            Duration::from_millis(self.scenario.think_after_popular_ms),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_can_be_loaded() {
        let settings = Settings::new();
        assert!(settings.is_ok());
    }

    #[test]
    fn default_targets_point_at_localhost() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.targets.ingest_base_url, "http://localhost:8080");
        assert_eq!(settings.targets.api_base_url, "http://localhost:8081");
    }

    #[test]
    fn default_stage_plan_matches_the_original_ramp() {
        let settings = Settings::new().unwrap();
        let schedule = settings.stage_schedule().unwrap();
        assert_eq!(schedule.total_duration(), Duration::from_secs(240));
        assert_eq!(schedule.stages().len(), 4);
        assert_eq!(schedule.stages()[2].target, 100);
    }

    #[test]
    fn default_thresholds_parse() {
        let settings = Settings::new().unwrap();
        let thresholds = settings.threshold_set().unwrap();
        assert!(!thresholds.is_empty());
    }

    #[test]
    fn default_think_times_are_one_one_two_seconds() {
        let settings = Settings::new().unwrap();
        assert_eq!(
            settings.think_times(),
            [
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
    }
}
