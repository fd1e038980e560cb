//! Incoming HTTP request type and the per-request identifier.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::envelope::Fault;

/// What [`Request::id`] returns for a request the trace middleware never
/// saw. A visible sentinel, not an error — log correlation degrades, the
/// request does not.
pub const MISSING_REQUEST_ID: &str = "<missing-request-id>";

// ── RequestId ─────────────────────────────────────────────────────────────────

/// A per-request unique token, generated once at the edge and read-only
/// afterwards. Echoed to clients as the `x-request-id` header by the trace
/// middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh token. 128 random bits — collisions are not a
    /// practical concern.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// An incoming HTTP request with its body already collected.
///
/// Exclusively owned by the task handling it — nothing here is shared
/// across requests.
pub struct Request {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            params: HashMap::new(),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header lookup by name (case-insensitive). Returns `None` for absent
    /// headers and for values that are not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Request-scoped extension storage. Middleware stashes values here
    /// (the trace middleware stores the [`RequestId`]); handlers read them.
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// The request identifier, or [`MISSING_REQUEST_ID`] if the trace
    /// middleware never ran. Once attached the token never changes.
    pub fn id(&self) -> &str {
        self.parts
            .extensions
            .get::<RequestId>()
            .map_or(MISSING_REQUEST_ID, RequestId::as_str)
    }

    /// Decodes the body as JSON into `T`.
    ///
    /// Failure is a domain error, not an infrastructure one: the caller
    /// gets a ready-made `400` fault whose cause carries the decoder detail
    /// and whose public message stays generic.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Fault> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Fault::bad_request(format!("decode request body: {e}"))
                .with_message("invalid request body")
        })
    }
}

#[cfg(test)]
pub(crate) fn synthetic(method: Method, path: &str, body: &[u8]) -> Request {
    let (parts, ()) = http::Request::builder()
        .method(method)
        .uri(path)
        .body(())
        .unwrap()
        .into_parts();
    Request::new(parts, Bytes::copy_from_slice(body))
}
