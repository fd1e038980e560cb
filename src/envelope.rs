//! Response and error envelopes — the uniform JSON wire contract.
//!
//! Every response leaving a manila service is one of two shapes:
//!
//! ```text
//! success  {"status": 200, "message": "created", "data": {…}, "ts": 1712345678}
//! error    {"status": 404, "error": "no such user", "ts": 1712345678}
//! ```
//!
//! Handlers build a [`Reply`] or a [`Fault`] and return it; the framework
//! serializes it. Clients get one stable shape regardless of which internal
//! path produced the response.
//!
//! Both types are immutable values: every `with_*` method copies. A base
//! reply can be shared across handlers and specialized per request without
//! any of them observing the others' changes.

use bytes::Bytes;
use http::{StatusCode, header};
use http_body_util::Full;
use serde_json::{Value, json};

use crate::cookie::Cookie;
use crate::error::Error;

/// The response body type used throughout the crate.
pub type Body = Full<Bytes>;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// A success envelope.
///
/// ```rust
/// use manila::Reply;
/// use serde_json::json;
///
/// Reply::ok("created").with_data(json!({"id": 42}));
/// Reply::no_content();
/// ```
#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    message: String,
    data: Option<Value>,
    cookie: Option<Cookie>,
}

impl Reply {
    /// `200 OK` with a message and no payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
            cookie: None,
        }
    }

    /// `204 No Content`. Writes no body.
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            message: String::new(),
            data: None,
            cookie: None,
        }
    }

    /// Returns a copy carrying `data` as the payload. The receiver is
    /// untouched.
    ///
    /// Pass a [`serde_json::Value`] — `json!({...})` or
    /// `serde_json::to_value(&typed)?`.
    pub fn with_data(&self, data: Value) -> Self {
        Self {
            data: Some(data),
            ..self.clone()
        }
    }

    /// Returns a copy carrying a cookie directive. The receiver is
    /// untouched.
    ///
    /// Cookies ride in headers, and headers are frozen once the status line
    /// goes out — which is why attachment only exists here, on the unwritten
    /// value. [`write`](Reply::write) consumes the envelope, so a cookie can
    /// never arrive too late.
    pub fn with_cookie(&self, cookie: Cookie) -> Self {
        Self {
            cookie: Some(cookie),
            ..self.clone()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Serializes the envelope into an HTTP response.
    ///
    /// The cookie header is placed before anything else; then content-type
    /// and status; then the body:
    /// - payload present → `{status, message, data, ts}`
    /// - message only → `{status, message, ts}`
    /// - neither → empty body (the no-content case)
    ///
    /// Encoding failure is terminal for this response — the error is
    /// returned, never retried.
    pub fn write(self) -> Result<http::Response<Body>, Error> {
        let mut builder = http::Response::builder();
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::SET_COOKIE, cookie.to_string());
        }
        builder = builder
            .header(header::CONTENT_TYPE, "application/json")
            .status(self.status);

        let body = if let Some(data) = self.data {
            serde_json::to_vec(&json!({
                "status": self.status.as_u16(),
                "message": self.message,
                "data": data,
                "ts": unix_ts(),
            }))?
        } else if self.message.is_empty() {
            Vec::new()
        } else {
            serde_json::to_vec(&json!({
                "status": self.status.as_u16(),
                "message": self.message,
                "ts": unix_ts(),
            }))?
        };

        builder.body(Full::new(Bytes::from(body))).map_err(Error::Http)
    }
}

// ── Fault ─────────────────────────────────────────────────────────────────────

/// An error envelope.
///
/// Carries two strings with very different audiences: the *cause* is for
/// logs, the *message* is for clients. Only the message ever reaches the
/// wire.
///
/// ```rust
/// use manila::Fault;
///
/// Fault::not_found("user 42 missing from primary and replica")
///     .with_message("no such user");
/// ```
#[derive(Clone, Debug)]
pub struct Fault {
    status: StatusCode,
    cause: String,
    message: String,
}

impl Fault {
    pub fn new(status: StatusCode, cause: impl Into<String>) -> Self {
        Self {
            status,
            cause: cause.into(),
            message: String::new(),
        }
    }

    pub fn bad_request(cause: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, cause)
    }

    pub fn not_authorized(cause: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, cause)
    }

    pub fn forbidden(cause: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, cause)
    }

    pub fn not_found(cause: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, cause)
    }

    pub fn internal(cause: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, cause)
    }

    /// Returns a copy with the client-visible text set. The internal cause
    /// is kept for logging; it is never serialized.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The internal cause. Log it with the request id; do not send it.
    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Serializes the envelope: always `{status, error, ts}` with the
    /// public message. The cause never appears in the body.
    pub fn write(self) -> Result<http::Response<Body>, Error> {
        let body = serde_json::to_vec(&json!({
            "status": self.status.as_u16(),
            "error": self.message,
            "ts": unix_ts(),
        }))?;

        http::Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .status(self.status)
            .body(Full::new(Bytes::from(body)))
            .map_err(Error::Http)
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cause)
    }
}

impl std::error::Error for Fault {}

/// Maps a JSON decode failure to a `400` with a generic public message.
/// Lets handlers use `?` on `serde_json` calls.
impl From<serde_json::Error> for Fault {
    fn from(e: serde_json::Error) -> Self {
        Self::bad_request(format!("json: {e}")).with_message("invalid JSON")
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Either envelope shape, ready to be written.
pub enum Envelope {
    Reply(Reply),
    Fault(Fault),
}

impl Envelope {
    pub fn write(self) -> Result<http::Response<Body>, Error> {
        match self {
            Self::Reply(r) => r.write(),
            Self::Fault(f) => f.write(),
        }
    }
}

/// Conversion into an [`Envelope`].
///
/// Implemented for [`Reply`], [`Fault`], and `Result<Reply, Fault>`, so a
/// handler can return whichever reads best:
///
/// ```rust,no_run
/// use manila::{Fault, Reply, Request};
///
/// async fn plain(_req: Request) -> Reply {
///     Reply::ok("pong")
/// }
///
/// async fn fallible(req: Request) -> Result<Reply, Fault> {
///     let input: serde_json::Value = req.decode()?;
///     Ok(Reply::ok("created").with_data(input))
/// }
/// ```
pub trait IntoEnvelope {
    fn into_envelope(self) -> Envelope;
}

impl IntoEnvelope for Envelope {
    fn into_envelope(self) -> Envelope {
        self
    }
}

impl IntoEnvelope for Reply {
    fn into_envelope(self) -> Envelope {
        Envelope::Reply(self)
    }
}

impl IntoEnvelope for Fault {
    fn into_envelope(self) -> Envelope {
        Envelope::Fault(self)
    }
}

impl IntoEnvelope for Result<Reply, Fault> {
    fn into_envelope(self) -> Envelope {
        match self {
            Ok(r) => Envelope::Reply(r),
            Err(f) => Envelope::Fault(f),
        }
    }
}

// ── Shared pieces ─────────────────────────────────────────────────────────────

/// Seconds since the unix epoch — the `ts` field of every body.
pub(crate) fn unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Last-resort `500` used when an envelope itself fails to encode. Built
/// by hand so this path cannot fail the same way twice.
pub(crate) fn fallback_internal() -> http::Response<Body> {
    let body = format!(
        r#"{{"status":500,"error":"internal server error","ts":{}}}"#,
        unix_ts()
    );
    http::Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
}
