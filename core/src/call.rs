//! The call descriptor contract: one value per logical API call.
//!
//! # Design
//! A call holds its own mutable query/form state and knows how to turn a raw
//! response body into its typed result. The same instance may be sent more
//! than once (pagination advances it, and the adaptive listing protocol
//! rewrites its query in place before asking the caller to retry), so
//! `url()` and `payload()` always reflect the latest state.
//!
//! `parse` returns an explicit [`Outcome`] instead of signaling retries
//! through errors: the caller's send loop matches on `Done`/`Retry` and
//! imposes its own attempt cap. Hard failures propagate as
//! [`ApiError`](crate::error::ApiError).

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::envelope;
use crate::error::ApiResult;
use crate::http::{HttpMethod, HttpRequest};

/// A decoded JSON response envelope.
pub type JsonObject = Map<String, Value>;

/// Insertion-ordered key/value pairs for query strings and form bodies.
///
/// `set` replaces an existing key in place, preserving its position; new
/// keys append. The retry protocol relies on this when it rewrites the
/// order fields of an already-built query.
#[derive(Debug, Clone, Default)]
pub struct ParamList(Vec<(String, String)>);

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn urlencode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.iter() {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

/// Mutable state of one in-flight call.
///
/// Not shareable across threads by construction: every concurrent call gets
/// its own instance, while sequential reuse (pagination, retry) mutates the
/// same one.
#[derive(Debug, Clone, Default)]
pub struct CallState {
    pub query: ParamList,
    pub form: ParamList,
    /// Route this call through the alternate network path. The transport
    /// layer reads this; the core only carries it.
    pub alt_route: bool,
}

/// Result of parsing one response.
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    /// The call produced its typed result.
    Done(T),
    /// The call rewrote its own state; re-issue the same instance.
    Retry,
}

/// Classifier verdict for a non-failing envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Success,
    Retry,
}

/// One logical API call: target URL, outgoing payload, response parsing.
///
/// Implementors provide the endpoint, access to their [`CallState`], and the
/// typed extraction hook; everything else has reusable defaults. Listing
/// calls override [`classify`](ApiCall::classify) for the sort-order retry
/// handshake, and encrypted calls override [`payload`](ApiCall::payload).
pub trait ApiCall {
    type Output;

    /// Endpoint URL without the query string. May depend on current state.
    fn endpoint(&self) -> &str;

    fn state(&self) -> &CallState;

    fn state_mut(&mut self) -> &mut CallState;

    /// Turn a success-classified envelope into the call's typed result.
    fn extract(&mut self, envelope: JsonObject) -> ApiResult<Self::Output>;

    /// Full target URL, reflecting the current query state.
    fn url(&self) -> String {
        let query = &self.state().query;
        if query.is_empty() {
            self.endpoint().to_string()
        } else {
            format!("{}?{}", self.endpoint(), query.urlencode())
        }
    }

    /// URL-encoded form body, or `None` for query-only calls.
    fn payload(&self) -> Option<String> {
        let form = &self.state().form;
        if form.is_empty() {
            None
        } else {
            Some(form.urlencode())
        }
    }

    /// Classify a decoded envelope. The default delegates to
    /// [`envelope::classify`]; a positive error code becomes a hard failure.
    fn classify(&mut self, envelope: &JsonObject) -> ApiResult<Step> {
        envelope::classify(envelope)
    }

    /// Parse a raw response body into this call's outcome.
    fn parse(&mut self, raw: &[u8]) -> ApiResult<Outcome<Self::Output>> {
        let obj: JsonObject = serde_json::from_slice(raw)?;
        match self.classify(&obj)? {
            Step::Retry => Ok(Outcome::Retry),
            Step::Success => Ok(Outcome::Done(self.extract(obj)?)),
        }
    }

    /// Describe the next send attempt as a plain-data HTTP request.
    fn request(&self) -> HttpRequest {
        match self.payload() {
            Some(body) => HttpRequest {
                method: HttpMethod::Post,
                url: self.url(),
                headers: vec![(
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )],
                body: Some(body),
            },
            None => HttpRequest {
                method: HttpMethod::Get,
                url: self.url(),
                headers: Vec::new(),
                body: None,
            },
        }
    }
}
