//! The event payload posted to the ingestion endpoint

use crate::domain::types::{IterationIndex, SessionId, VuId};
use nutype::nutype;
use rand::Rng;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};

/// User identifier, constrained to the synthetic population [1, 1000]
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        TryFrom,
        AsRef,
        Display
    )
)]
pub struct UserId(u32);

impl UserId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 1000;

    /// Uniformly random user id from an explicit randomness source
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::try_new(rng.gen_range(Self::MIN..=Self::MAX))
            .unwrap_or_else(|_| unreachable!("gen_range stays within bounds"))
    }
}

/// Item identifier, constrained to the synthetic catalog [1, 100]
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 100),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        TryFrom,
        AsRef,
        Display
    )
)]
pub struct ItemId(u32);

impl ItemId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    /// Uniformly random item id from an explicit randomness source
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::try_new(rng.gen_range(Self::MIN..=Self::MAX))
            .unwrap_or_else(|_| unreachable!("gen_range stays within bounds"))
    }
}

/// Interaction kind recorded by the ingestion service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    View,
    Click,
    Cart,
    Purchase,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::View,
        EventType::Click,
        EventType::Cart,
        EventType::Purchase,
    ];

    /// Uniformly random event type from an explicit randomness source
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// JSON body for `POST /events`
///
/// Created fresh each iteration and discarded after the send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub event_type: EventType,
    pub session_id: SessionId,
}

impl EventPayload {
    /// Randomized payload for one (virtual user, iteration) pair
    ///
    /// Randomness comes only from the caller-supplied source, so a seeded rng
    /// reproduces the exact request sequence.
    pub fn random(rng: &mut impl Rng, vu: VuId, iteration: IterationIndex) -> Self {
        Self {
            user_id: UserId::random(rng),
            item_id: ItemId::random(rng),
            event_type: EventType::random(rng),
            session_id: SessionId::for_iteration(vu, iteration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn event_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&EventType::Purchase).unwrap(),
            "\"PURCHASE\""
        );
        assert_eq!(serde_json::to_string(&EventType::View).unwrap(), "\"VIEW\"");
    }

    #[test]
    fn payload_serializes_to_ingestion_shape() {
        let payload = EventPayload {
            user_id: UserId::try_new(12).unwrap(),
            item_id: ItemId::try_new(3).unwrap(),
            event_type: EventType::Click,
            session_id: SessionId::for_iteration(VuId::from(1), IterationIndex::from(0)),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user_id": 12,
                "item_id": 3,
                "event_type": "CLICK",
                "session_id": "session_1_0",
            })
        );
    }

    #[test]
    fn random_payload_is_reproducible_for_a_seed() {
        let vu = VuId::from(4);
        let iter = IterationIndex::from(9);
        let a = EventPayload::random(&mut SmallRng::seed_from_u64(99), vu, iter);
        let b = EventPayload::random(&mut SmallRng::seed_from_u64(99), vu, iter);
        assert_eq!(a, b);
    }

    #[test]
    fn id_bounds_are_enforced() {
        assert!(UserId::try_new(0).is_err());
        assert!(UserId::try_new(1001).is_err());
        assert!(ItemId::try_new(0).is_err());
        assert!(ItemId::try_new(101).is_err());
    }
}
