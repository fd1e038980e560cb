//! Request-identifier injection.
//!
//! Tags every request with a fresh [`RequestId`] so logs across a request's
//! lifetime correlate, and echoes the token back to the client in the
//! `x-request-id` header so support conversations can start from something
//! concrete. Never short-circuits.

use std::sync::Arc;

use http::HeaderValue;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::{Request, RequestId};

/// The trace header every tagged response carries.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that attaches a [`RequestId`] to the request and mirrors it
/// onto the response.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Tagger { next })
    }
}

struct Tagger {
    next: BoxedHandler,
}

impl ErasedHandler for Tagger {
    fn call(&self, mut req: Request) -> BoxFuture {
        let id = RequestId::generate();
        req.extensions_mut().insert(id.clone());

        let fut = self.next.call(req);
        Box::pin(async move {
            let mut resp = fut.await;
            // A v4 UUID is plain ASCII; from_str only fails if the token
            // type ever changes shape.
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                resp.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            resp
        })
    }
}
