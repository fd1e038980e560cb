//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router needs to hold handlers of *different* types in a single
//! `HashMap<Method, Tree>`. Rust collections can only hold one concrete type,
//! so we use **trait objects** (`dyn ErasedHandler`) to hide the concrete
//! handler type behind a common interface and store everything uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn hello(req: Request) -> Reply { … }      ← user writes this
//!        ↓ scope.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.into_envelope().write() })
//! ```
//!
//! The erased future resolves to a fully serialized [`http::Response`] — not
//! to an envelope value — so middleware stages can decorate response headers
//! without knowing which envelope shape the handler produced.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{error, warn};

use crate::envelope::{Body, Envelope, IntoEnvelope, fallback_internal};
use crate::request::Request;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a serialized
/// response.
///
/// `Pin<Box<…>>` is required because the async runtime must be able to poll
/// the future in-place — it cannot move it in memory after the first poll.
/// `Send + 'static` let tokio move the future across threads safely.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = http::Response<Body>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method
/// and in the `Middleware` trait's `wrap` signature.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
///
/// `Arc` gives us cheap, thread-safe shared ownership (one atomic reference
/// count increment per request) without copying the handler.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoEnvelope
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it. This prevents accidental misuse and
/// keeps the API surface stable across versions.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoEnvelope + Send + 'static,
{
}

/// Implement `Handler` for any function with the right signature:
/// named `async fn` items, `async` closures, or any struct implementing `Fn`.
impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoEnvelope + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoEnvelope + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // The id is captured before the handler consumes the request so the
        // fault/serialization logs below stay correlated.
        let request_id = req.id().to_owned();
        let fut = (self.0)(req);

        Box::pin(async move {
            let envelope = fut.await.into_envelope();

            // The adapter is the last owner of the internal cause — the
            // wire body only ever carries the public message.
            if let Envelope::Fault(fault) = &envelope {
                if fault.status().is_server_error() {
                    error!(request_id = %request_id, status = %fault.status(), cause = %fault.cause(), "handler fault");
                } else {
                    warn!(request_id = %request_id, status = %fault.status(), cause = %fault.cause(), "handler fault");
                }
            }

            match envelope.write() {
                Ok(resp) => resp,
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "envelope serialization failed");
                    fallback_internal()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Fault, Reply};
    use crate::request::synthetic;
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    async fn run(handler: impl Handler, req: Request) -> http::Response<Body> {
        handler.into_boxed_handler().call(req).await
    }

    #[tokio::test]
    async fn plain_reply_handlers_serialize() {
        async fn pong(_req: Request) -> Reply {
            Reply::ok("pong")
        }

        let resp = run(pong, synthetic(Method::GET, "/ping", b"")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fallible_handlers_serialize_the_fault_arm() {
        async fn always_fails(_req: Request) -> Result<Reply, Fault> {
            Err(Fault::forbidden("role mismatch").with_message("forbidden"))
        }

        let resp = run(always_fails, synthetic(Method::GET, "/admin", b"")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "forbidden");
        assert!(body.get("cause").is_none());
    }

    #[tokio::test]
    async fn handlers_can_thread_decoded_input_into_the_payload() {
        async fn echo(req: Request) -> Result<Reply, Fault> {
            let input: Value = req.decode()?;
            Ok(Reply::ok("echoed").with_data(input))
        }

        let resp = run(echo, synthetic(Method::POST, "/echo", br#"{"k":"v"}"#)).await;
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"], json!({"k":"v"}));
    }

    #[tokio::test]
    async fn decode_failure_becomes_a_uniform_400() {
        async fn echo(req: Request) -> Result<Reply, Fault> {
            let input: Value = req.decode()?;
            Ok(Reply::ok("echoed").with_data(input))
        }

        let resp = run(echo, synthetic(Method::POST, "/echo", b"nope")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid request body");
    }
}
