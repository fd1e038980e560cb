//! # manila
//!
//! A uniform JSON-envelope layer for HTTP services behind a reverse proxy.
//! One response shape. One error shape. Nothing else to argue about.
//!
//! ## The contract
//!
//! Every response a manila service sends is one of two JSON objects:
//!
//! ```text
//! success  {"status": 200, "message": "created", "data": {…}, "ts": 1712345678}
//! error    {"status": 404, "error": "no such user", "ts": 1712345678}
//! ```
//!
//! Handlers build [`Reply`] and [`Fault`] values; the framework serializes
//! them, tags them with a request id, and decorates them with your CORS
//! policy. Internal error causes stay in the logs — the wire only ever
//! carries the message you explicitly set.
//!
//! What manila deliberately leaves to collaborators:
//!
//! - **Transport** — hyper over tokio, HTTP/1.1 and HTTP/2 negotiated by
//!   hyper-util's auto builder
//! - **Route matching** — radix trees via [`matchit`]
//! - **TLS, rate limiting, body-size limits** — your proxy's job
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use manila::{Fault, Preflight, Reply, Request, Scope, Service, Trace};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), manila::Error> {
//!     Service::builder()
//!         .bind("0.0.0.0:3000")
//!         .layer(Trace)
//!         .layer(Preflight)
//!         .route(Scope::new("/api").post("/users", create_user))
//!         .build()
//!         .listen()
//!         .await
//! }
//!
//! async fn create_user(req: Request) -> Result<Reply, Fault> {
//!     let input: serde_json::Value = req.decode()?;
//!     Ok(Reply::ok("created").with_data(json!({"id": 42, "input": input})))
//! }
//! ```
//!
//! Middleware order is yours: `Trace` before `Preflight` means even
//! short-circuited `OPTIONS` probes carry an `x-request-id`. The CORS
//! policy always decorates last, outside everything.

mod cookie;
mod cors;
mod envelope;
mod error;
mod handler;
mod request;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use cookie::{Cookie, SameSite};
pub use cors::CorsConfig;
pub use envelope::{Body, Envelope, Fault, IntoEnvelope, Reply};
pub use error::Error;
pub use handler::{BoxedHandler, Handler};
pub use middleware::{Middleware, Preflight, REQUEST_ID_HEADER, Trace};
pub use request::{MISSING_REQUEST_ID, Request, RequestId};
pub use router::{Router, Scope};
pub use server::{Builder, Service};
