//! Request builders for the three scenario actions
//!
//! Builders are pure: given the same payload and parameters they produce the
//! same spec. All randomness happens upstream in `EventPayload::random`.

use crate::domain::{EventPayload, UserId};
use crate::error::{Error, Result};
use crate::scenario::checks::Action;
use bytes::Bytes;
use http::{Method, Request};
use http_body_util::Full;

/// One fully-described HTTP request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestSpec {
    /// Convert into a hyper request ready to send
    pub fn into_request(self, action: Action) -> Result<Request<Full<Bytes>>> {
        let mut builder = Request::builder().method(self.method).uri(&self.url);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(self.body.unwrap_or_default()))
            .map_err(|e| Error::invalid_request(action.name(), e.to_string()))
    }
}

/// `POST {ingest_base}/events` with a JSON event payload
pub fn ingest(ingest_base: &str, payload: &EventPayload) -> Result<RequestSpec> {
    let body = serde_json::to_vec(payload)?;
    Ok(RequestSpec {
        method: Method::POST,
        url: format!("{}/events", ingest_base.trim_end_matches('/')),
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Some(Bytes::from(body)),
    })
}

/// `GET {api_base}/recommendations?user_id={user}&count={count}`
pub fn recommend(api_base: &str, user: UserId, count: u32) -> RequestSpec {
    RequestSpec {
        method: Method::GET,
        url: format!(
            "{}/recommendations?user_id={user}&count={count}",
            api_base.trim_end_matches('/')
        ),
        headers: Vec::new(),
        body: None,
    }
}

/// `GET {api_base}/popular?count={count}`
pub fn popular(api_base: &str, count: u32) -> RequestSpec {
    RequestSpec {
        method: Method::GET,
        url: format!("{}/popular?count={count}", api_base.trim_end_matches('/')),
        headers: Vec::new(),
        body: None,
    }
}
