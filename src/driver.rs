//! The per-virtual-user iteration loop
//!
//! One iteration runs ingest, recommend, and popular strictly in sequence
//! with a think-time sleep after each action. Every per-request failure
//! (non-2xx, timeout, refused connection, malformed body) is absorbed into
//! the error-rate metric; nothing aborts the virtual user.

use crate::config::Settings;
use crate::domain::{EventPayload, IterationIndex, UserId, VuId};
use crate::metrics::{MetricsCollector, ERRORS_METRIC};
use crate::scenario::{check_response, requests, Action, RequestSpec};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Transport-level failure; carries only a message because every variant is
/// handled the same way (check failure, keep going)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SendError(pub String);

/// Seam between the driver and the HTTP transport
///
/// The production implementation is the hyper-util legacy client; tests plug
/// in canned responders.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<(StatusCode, Bytes), SendError>;
}

/// hyper-util client with a per-request timeout
pub struct HyperSender {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HyperSender {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }
}

#[async_trait]
impl HttpSend for HyperSender {
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<(StatusCode, Bytes), SendError> {
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| SendError("request timed out".to_string()))?
            .map_err(|e| SendError(e.to_string()))?;
        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| SendError(e.to_string()))?
            .to_bytes();
        Ok((parts.status, bytes))
    }
}

/// Everything one driver needs besides the transport and the collector
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub ingest_base_url: String,
    pub api_base_url: String,
    pub recommend_count: u32,
    pub popular_count: u32,
    pub think_times: [Duration; 3],
}

impl DriverConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ingest_base_url: settings.targets.ingest_base_url.clone(),
            api_base_url: settings.targets.api_base_url.clone(),
            recommend_count: settings.scenario.recommend_count,
            popular_count: settings.scenario.popular_count,
            think_times: settings.think_times(),
        }
    }
}

/// Runs the scripted scenario once per call, for one virtual user
pub struct VirtualUserDriver {
    config: DriverConfig,
    sender: Arc<dyn HttpSend>,
    metrics: Arc<MetricsCollector>,
}

impl VirtualUserDriver {
    pub fn new(
        config: DriverConfig,
        sender: Arc<dyn HttpSend>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            sender,
            metrics,
        }
    }

    /// One full iteration: ingest -> recommend -> popular, with think-times
    pub async fn run_iteration<R: Rng + Send>(
        &self,
        vu: VuId,
        iteration: IterationIndex,
        rng: &mut R,
    ) {
        let payload = EventPayload::random(rng, vu, iteration);
        match requests::ingest(&self.config.ingest_base_url, &payload) {
            Ok(spec) => self.execute(Action::Ingest, spec).await,
            Err(e) => self.record_build_failure(Action::Ingest, &e),
        }
        tokio::time::sleep(self.config.think_times[0]).await;

        let spec = requests::recommend(
            &self.config.api_base_url,
            UserId::random(rng),
            self.config.recommend_count,
        );
        self.execute(Action::Recommend, spec).await;
        tokio::time::sleep(self.config.think_times[1]).await;

        let spec = requests::popular(&self.config.api_base_url, self.config.popular_count);
        self.execute(Action::Popular, spec).await;
        tokio::time::sleep(self.config.think_times[2]).await;
    }

    async fn execute(&self, action: Action, spec: RequestSpec) {
        let request = match spec.into_request(action) {
            Ok(request) => request,
            Err(e) => {
                self.record_build_failure(action, &e);
                return;
            }
        };

        let start = Instant::now();
        let outcome = self.sender.send(request).await;
        self.metrics.record_latency(start.elapsed());

        let passed = match outcome {
            Ok((status, body)) => check_response(action, status, &body),
            Err(e) => {
                debug!(%action, error = %e, "request failed");
                false
            }
        };
        if passed {
            self.metrics.record_success(ERRORS_METRIC);
        } else {
            self.metrics.record_failure(ERRORS_METRIC);
        }
    }

    fn record_build_failure(&self, action: Action, error: &crate::error::Error) {
        warn!(%action, %error, "could not build request");
        self.metrics.record_failure(ERRORS_METRIC);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use serde_json::json;

    /// Canned transport: replays one scripted response per action, in order
    struct ScriptedSender {
        responses: Mutex<Vec<std::result::Result<(StatusCode, Bytes), SendError>>>,
        seen_urls: Mutex<Vec<String>>,
    }

    impl ScriptedSender {
        fn new(responses: Vec<std::result::Result<(StatusCode, Bytes), SendError>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen_urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpSend for ScriptedSender {
        async fn send(
            &self,
            request: Request<Full<Bytes>>,
        ) -> std::result::Result<(StatusCode, Bytes), SendError> {
            self.seen_urls.lock().push(request.uri().to_string());
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(SendError("script exhausted".to_string())))
        }
    }

    fn driver(sender: Arc<dyn HttpSend>, metrics: Arc<MetricsCollector>) -> VirtualUserDriver {
        let config = DriverConfig {
            ingest_base_url: "http://localhost:8080".to_string(),
            api_base_url: "http://localhost:8081".to_string(),
            recommend_count: 10,
            popular_count: 20,
            think_times: [Duration::ZERO; 3],
        };
        VirtualUserDriver::new(config, sender, metrics)
    }

    fn ok_json(body: serde_json::Value) -> std::result::Result<(StatusCode, Bytes), SendError> {
        Ok((StatusCode::OK, Bytes::from(body.to_string())))
    }

    #[tokio::test]
    async fn iteration_hits_the_three_endpoints_in_order() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Ok((StatusCode::OK, Bytes::new())),
            ok_json(json!({"recommendations": []})),
            ok_json(json!({"recommendations": []})),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let mut rng = SmallRng::seed_from_u64(1);
        driver(sender.clone(), metrics.clone())
            .run_iteration(VuId::from(1), IterationIndex::from(0), &mut rng)
            .await;

        let urls = sender.seen_urls.lock().clone();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("/events"));
        assert!(urls[1].contains("/recommendations?user_id="));
        assert!(urls[1].ends_with("&count=10"));
        assert!(urls[2].ends_with("/popular?count=20"));

        let snapshot = metrics.snapshot();
        let rate = snapshot.rate(ERRORS_METRIC).unwrap();
        assert_eq!(rate.successes, 3);
        assert_eq!(rate.failures, 0);
        assert_eq!(snapshot.sample_count(), 3);
    }

    #[tokio::test]
    async fn transport_failure_is_absorbed_and_the_iteration_continues() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Err(SendError("connection refused".to_string())),
            ok_json(json!({"recommendations": []})),
            ok_json(json!({"recommendations": []})),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let mut rng = SmallRng::seed_from_u64(2);
        driver(sender.clone(), metrics.clone())
            .run_iteration(VuId::from(1), IterationIndex::from(0), &mut rng)
            .await;

        // All three actions ran despite the first one failing
        assert_eq!(sender.seen_urls.lock().len(), 3);
        let rate = metrics.snapshot().rate(ERRORS_METRIC).unwrap();
        assert_eq!(rate.failures, 1);
        assert_eq!(rate.successes, 2);
    }

    #[tokio::test]
    async fn bad_statuses_and_bad_bodies_count_as_failures() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())),
            Ok((StatusCode::OK, Bytes::from_static(b"not json"))),
            ok_json(json!({})),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let mut rng = SmallRng::seed_from_u64(3);
        driver(sender, metrics.clone())
            .run_iteration(VuId::from(1), IterationIndex::from(0), &mut rng)
            .await;

        let rate = metrics.snapshot().rate(ERRORS_METRIC).unwrap();
        assert_eq!(rate.failures, 3);
        assert_eq!(rate.successes, 0);
    }

    #[tokio::test]
    async fn latency_is_recorded_for_failed_attempts_too() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Err(SendError("timeout".to_string())),
            Err(SendError("timeout".to_string())),
            Err(SendError("timeout".to_string())),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let mut rng = SmallRng::seed_from_u64(4);
        driver(sender, metrics.clone())
            .run_iteration(VuId::from(1), IterationIndex::from(0), &mut rng)
            .await;
        assert_eq!(metrics.snapshot().sample_count(), 3);
    }
}
