//! Value types shared across the driver, metrics, and orchestrator

use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};

/// Identifier of one virtual user within a run
///
/// Assigned sequentially by the user pool; never reused within a run so that
/// session ids stay unique without coordination.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    From,
    AsRef,
    Display
))]
pub struct VuId(u32);

/// Per-user iteration counter, starting at zero
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    From,
    AsRef,
    Display
))]
pub struct IterationIndex(u64);

/// Session identifier carried in every ingested event
///
/// Composed from (virtual-user id, iteration index), which makes it unique
/// across concurrent users without any shared counter.
#[nutype(
    validate(not_empty),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct SessionId(String);

impl SessionId {
    /// Session id for one (virtual user, iteration) pair
    pub fn for_iteration(vu: VuId, iteration: IterationIndex) -> Self {
        Self::try_new(format!("session_{vu}_{iteration}"))
            .unwrap_or_else(|_| unreachable!("formatted session id is never empty"))
    }
}

/// Fraction of checked actions that failed, constrained to [0.0, 1.0]
#[nutype(
    validate(finite, greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Display)
)]
pub struct ErrorRate(f64);

impl ErrorRate {
    /// Zero error rate (no failures recorded)
    pub fn zero() -> Self {
        Self::try_new(0.0).unwrap()
    }

    /// Exact rate from a failure/total counter pair
    ///
    /// A total of zero yields a zero rate rather than NaN.
    pub fn from_counts(failures: u64, total: u64) -> Self {
        if total == 0 {
            return Self::zero();
        }
        let rate = failures as f64 / total as f64;
        Self::try_new(rate).unwrap_or_else(|_| unreachable!("failures <= total"))
    }
}
