//! The scripted scenario: request builders and response checks
//!
//! One iteration of the scenario exercises event ingestion, personalized
//! recommendations, and the popularity endpoint, in that order.

pub mod checks;
pub mod requests;

pub use checks::{check_response, Action};
pub use requests::RequestSpec;
