//! Ramp orchestration: spawning and retiring virtual users
//!
//! The orchestrator never assumes a concurrency primitive. It reads the
//! schedule's target on a fixed tick and converges a `UserPool` toward it;
//! the tokio-backed pool is the production implementation.

use crate::config::Settings;
use crate::domain::{IterationIndex, VuId};
use crate::driver::{DriverConfig, HttpSend, HyperSender, VirtualUserDriver};
use crate::error::Result;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::report::RunOutcome;
use crate::schedule::StageSchedule;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A set of running virtual users that can grow and shrink
pub trait UserPool {
    fn spawn_user(&mut self);
    fn retire_user(&mut self);
    fn active(&self) -> usize;
}

/// Converge the pool size toward the scheduler's target
pub fn reconcile(pool: &mut dyn UserPool, target: u32) {
    let target = target as usize;
    while pool.active() < target {
        pool.spawn_user();
    }
    while pool.active() > target {
        pool.retire_user();
    }
}

struct UserHandle {
    vu: VuId,
    active: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Task-per-user pool; each user loops the driver with its own seeded rng
pub struct TokioUserPool {
    driver: Arc<VirtualUserDriver>,
    seed: u64,
    next_id: u32,
    users: Vec<UserHandle>,
    retired: Vec<JoinHandle<()>>,
}

impl TokioUserPool {
    pub fn new(driver: Arc<VirtualUserDriver>, seed: u64) -> Self {
        Self {
            driver,
            seed,
            next_id: 1,
            users: Vec::new(),
            retired: Vec::new(),
        }
    }

    /// Retire everyone and wait for in-flight iterations to finish
    ///
    /// Users that outlive the grace period (a stuck request, a long
    /// think-time) are aborted; no fast-cancel guarantee is needed.
    pub async fn drain(mut self, grace: Duration) {
        let mut tasks = Vec::with_capacity(self.users.len() + self.retired.len());
        for user in self.users.drain(..) {
            let _ = user.active.send(false);
            tasks.push(user.task);
        }
        tasks.append(&mut self.retired);

        let deadline = Instant::now() + grace;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                warn!("virtual user did not finish within the drain grace period, aborting");
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl UserPool for TokioUserPool {
    fn spawn_user(&mut self) {
        let vu = VuId::from(self.next_id);
        // Per-user seed derived from the run seed, so one run seed fixes
        // every user's request sequence.
        let mut rng = SmallRng::seed_from_u64(self.seed.wrapping_add(u64::from(self.next_id)));
        self.next_id += 1;
        let (active, flag) = watch::channel(true);
        let driver = Arc::clone(&self.driver);
        let task = tokio::spawn(async move {
            let mut iteration = 0u64;
            while *flag.borrow() {
                driver
                    .run_iteration(vu, IterationIndex::from(iteration), &mut rng)
                    .await;
                iteration += 1;
            }
            debug!(%vu, iterations = iteration, "virtual user finished");
        });
        debug!(%vu, "virtual user spawned");
        self.users.push(UserHandle { vu, active, task });
    }

    fn retire_user(&mut self) {
        if let Some(user) = self.users.pop() {
            debug!(vu = %user.vu, "virtual user retiring");
            // The user exits after its current iteration completes.
            let _ = user.active.send(false);
            self.retired.push(user.task);
        }
    }

    fn active(&self) -> usize {
        self.users.len()
    }
}

/// Drives a pool along the stage schedule until the test duration elapses
pub struct Orchestrator {
    schedule: StageSchedule,
    tick: Duration,
}

impl Orchestrator {
    pub fn new(schedule: StageSchedule, tick: Duration) -> Self {
        Self { schedule, tick }
    }

    pub async fn run<P: UserPool>(&self, pool: &mut P) {
        let started = Instant::now();
        let total = self.schedule.total_duration();
        let mut interval = tokio::time::interval(self.tick);
        let mut last_target = 0u32;
        loop {
            interval.tick().await;
            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }
            let target = self.schedule.target_at(elapsed);
            if target != last_target {
                info!(elapsed = ?elapsed, target, "ramp target changed");
                last_target = target;
            }
            reconcile(pool, target);
        }
    }
}

/// Run a complete load test from settings: ramp, drain, snapshot, evaluate
pub async fn run_test(settings: &Settings) -> Result<RunOutcome> {
    let schedule = settings.stage_schedule()?;
    let thresholds = settings.threshold_set()?;
    let metrics = Arc::new(MetricsCollector::new());
    let sender: Arc<dyn HttpSend> = Arc::new(HyperSender::new(settings.request_timeout()));
    let driver = Arc::new(VirtualUserDriver::new(
        DriverConfig::from_settings(settings),
        sender,
        Arc::clone(&metrics),
    ));
    let seed = settings
        .scenario
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen());

    info!(
        total_duration = ?schedule.total_duration(),
        stages = schedule.stages().len(),
        seed,
        "starting load test"
    );
    let started_at = chrono::Local::now();
    let started = Instant::now();

    let mut pool = TokioUserPool::new(driver, seed);
    let orchestrator = Orchestrator::new(schedule, settings.reconcile_interval());
    orchestrator.run(&mut pool).await;
    pool.drain(DRAIN_GRACE).await;

    let snapshot: MetricsSnapshot = metrics.snapshot();
    let report = thresholds.evaluate(&snapshot);
    info!(
        samples = snapshot.sample_count(),
        passed = report.passed(),
        "load test finished"
    );
    Ok(RunOutcome {
        started_at,
        wall_time: started.elapsed(),
        snapshot,
        report,
    })
}

/// Long enough for one full iteration (requests plus think-times) to finish
const DRAIN_GRACE: Duration = Duration::from_secs(15);
