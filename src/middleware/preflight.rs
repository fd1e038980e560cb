//! CORS preflight short-circuit.
//!
//! Browsers probe cross-origin permissions with an `OPTIONS` request before
//! sending the real one. The probe exists for header inspection only — no
//! application work should happen for it, so this layer answers `204 No
//! Content` immediately and never invokes the next stage. The CORS
//! decorator sits outside the whole chain, so the short-circuited response
//! still picks up its access-control headers.

use std::sync::Arc;

use http::Method;

use crate::envelope::{Reply, fallback_internal};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Middleware that answers `OPTIONS` probes with an empty `204` and passes
/// every other method through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preflight;

impl Middleware for Preflight {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(ShortCircuit { next })
    }
}

struct ShortCircuit {
    next: BoxedHandler,
}

impl ErasedHandler for ShortCircuit {
    fn call(&self, req: Request) -> BoxFuture {
        // `http::Method` equality is an exact byte comparison — a mangled
        // or multi-valued method string can never alias OPTIONS.
        if req.method() == Method::OPTIONS {
            return Box::pin(async {
                Reply::no_content()
                    .write()
                    .unwrap_or_else(|_| fallback_internal())
            });
        }
        self.next.call(req)
    }
}
