//! Domain types for the load scenario
//!
//! Validated newtypes for every bounded value that crosses a module boundary,
//! plus the randomized event payload sent to the ingestion endpoint.

pub mod event;
pub mod types;

pub use event::{EventPayload, EventType, ItemId, UserId};
pub use types::{ErrorRate, IterationIndex, SessionId, VuId};
