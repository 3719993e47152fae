//! Response checks for each scenario action
//!
//! Checks are pure predicates over a completed response. A malformed body is
//! a failed check, never a panic or an aborted iteration.

use http::StatusCode;
use serde_json::Value;

/// The scenario action that produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Ingest,
    Recommend,
    Popular,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Ingest, Action::Recommend, Action::Popular];

    pub fn name(self) -> &'static str {
        match self {
            Action::Ingest => "ingest",
            Action::Recommend => "recommendations",
            Action::Popular => "popular",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pass/fail for one completed response
///
/// Ingest passes on a 200 alone. Recommend and popular additionally require
/// a JSON body with a `recommendations` field; the field may be empty but
/// must be present.
pub fn check_response(action: Action, status: StatusCode, body: &[u8]) -> bool {
    if status != StatusCode::OK {
        return false;
    }
    match action {
        Action::Ingest => true,
        Action::Recommend | Action::Popular => has_recommendations_field(body),
    }
}

fn has_recommendations_field(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .map(|value| value.get("recommendations").is_some())
        .unwrap_or(false)
}
