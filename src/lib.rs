//! Stampede - a staged-ramp HTTP load driver
//!
//! Drives the event-ingestion, recommendation, and popularity endpoints with
//! ramping virtual-user concurrency, records latency and check outcomes, and
//! evaluates threshold-based pass/fail criteria at the end of the run.

pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod scenario;
pub mod schedule;
pub mod threshold;

pub use error::{Error, Result};
pub use orchestrator::run_test;
