//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. manila answers them — in envelope form,
//! like everything else it sends.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your service:
//!
//! ```rust,no_run
//! use manila::{Service, health};
//!
//! Service::builder()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Override `readiness` with a custom handler if you need to gate on
//! dependency availability (database connections, downstream services, etc.):
//!
//! ```rust,no_run
//! use manila::{Fault, Reply, Request};
//!
//! async fn readiness(_req: Request) -> Result<Reply, Fault> {
//!     if dependencies_are_healthy().await {
//!         Ok(Reply::ok("ready"))
//!     } else {
//!         Err(Fault::internal("pg pool exhausted").with_message("not ready"))
//!     }
//! }
//!
//! async fn dependencies_are_healthy() -> bool { true }
//! ```

use crate::envelope::Reply;
use crate::request::Request;

/// Kubernetes liveness probe handler.
///
/// Always returns `200` with message `"ok"`. If the process can respond to
/// HTTP at all, it is alive — this handler intentionally has no dependencies.
pub async fn liveness(_req: Request) -> Reply {
    Reply::ok("ok")
}

/// Kubernetes readiness probe handler (default implementation).
///
/// Returns `200` with message `"ready"`. Replace this with your own handler
/// if your application needs a warm-up period or must verify dependency
/// health before accepting traffic.
pub async fn readiness(_req: Request) -> Reply {
    Reply::ok("ready")
}
