//! Service configuration and the listen loop.
//!
//! A [`Service`] is configured once through its [`Builder`], then run with
//! [`listen`](Service::listen) — a one-way trip. There is no reconfiguring
//! a listening service and no restarting a stopped one; build a new value
//! instead.
//!
//! The composed request path, outermost first:
//!
//! ```text
//! CORS decoration → registered middleware (in order) → router → handler
//! ```
//!
//! CORS decoration is always the outermost layer so that responses produced
//! by a short-circuiting middleware — the preflight 204 — still carry the
//! policy's headers.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! The listen loop reacts by:
//! 1. Immediately stopping `listener.accept()` — no new connections.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Service::listen`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cors::{self, CorsConfig};
use crate::envelope::{Body, Fault, fallback_internal};
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{self, Middleware};
use crate::request::Request;
use crate::router::{Router, Scope};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// ── Builder ───────────────────────────────────────────────────────────────────

/// Draft service configuration.
///
/// ```rust,no_run
/// use manila::{CorsConfig, Preflight, Reply, Request, Scope, Service, Trace};
///
/// # async fn get_user(_: Request) -> Reply { Reply::ok("") }
/// # async fn run() -> Result<(), manila::Error> {
/// Service::builder()
///     .bind("0.0.0.0:3000")
///     .cors(CorsConfig::for_origins(["https://app.example"]))
///     .layer(Trace)
///     .layer(Preflight)
///     .route(Scope::new("/api").get("/users/{id}", get_user))
///     .build()
///     .listen()
///     .await
/// # }
/// ```
pub struct Builder {
    addr: String,
    cors: CorsConfig,
    layers: Vec<Box<dyn Middleware>>,
    router: Router,
}

impl Builder {
    fn new() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            cors: CorsConfig::allow_all(),
            layers: Vec::new(),
            router: Router::new(),
        }
    }

    /// The `host:port` to bind. Defaults to loopback `127.0.0.1:8080`.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Replaces the default permissive CORS policy.
    pub fn cors(mut self, config: CorsConfig) -> Self {
        self.cors = config;
        self
    }

    /// Appends a middleware layer. Layers registered earlier wrap — and
    /// therefore execute around — layers registered later.
    pub fn layer(mut self, layer: impl Middleware) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Mounts a prefix-scoped group of routes.
    pub fn route(mut self, scope: Scope) -> Self {
        self.router = std::mem::take(&mut self.router).mount(scope);
        self
    }

    /// Registers a single route.
    pub fn on(mut self, method: http::Method, path: &str, handler: impl Handler) -> Self {
        self.router = std::mem::take(&mut self.router).on(method, path, handler);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(http::Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(http::Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(http::Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(http::Method::DELETE, path, handler)
    }

    /// Freezes the configuration and composes the request path. After this
    /// point nothing about the service can change.
    pub fn build(self) -> Service {
        let app = middleware::compose(&self.layers, self.router.into_handler());
        let app = cors::wrap(Arc::new(self.cors), app);
        Service {
            addr: self.addr,
            app,
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// A configured, not-yet-listening service.
pub struct Service {
    addr: String,
    app: BoxedHandler,
}

impl Service {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// Bind failures are fatal and returned immediately — no retry, no
    /// fallback port. On success this call blocks until a SIGTERM or
    /// Ctrl-C arrives and every in-flight connection has drained.
    pub async fn listen(self) -> Result<(), Error> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|_| Error::InvalidAddr(self.addr.clone()))?;

        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: self.addr.clone(),
            source,
        })?;

        // The composed chain is read-only from here on; Arc lets every
        // connection task share it without copying the routing table.
        let app = self.app;

        info!(addr = %addr, "manila listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom. Shutdown
                // is checked first so a SIGTERM immediately stops accepting
                // new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` is called once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req).await }
                        });

                        // `auto::Builder` transparently handles both
                        // HTTP/1.1 and HTTP/2 — whatever the client
                        // negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not
                // grow without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection before returning.
        while tasks.join_next().await.is_some() {}

        info!("manila stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: collects the body and runs one request through the
/// composed chain.
///
/// The error type is [`Infallible`] — every failure becomes an envelope
/// (400 for unreadable bodies, 404, 500, …), so hyper never sees an error.
async fn dispatch(
    app: BoxedHandler,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            let fault = Fault::bad_request(format!("read request body: {e}"))
                .with_message("unreadable request body");
            return Ok(fault.write().unwrap_or_else(|_| fallback_internal()));
        }
    };

    Ok(app.call(Request::new(parts, body)).await)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Reply;
    use crate::middleware::{Preflight, REQUEST_ID_HEADER, Trace};
    use http::{Method, StatusCode, header};
    use serde_json::{Value, json};

    async fn create_user(req: Request) -> Result<Reply, Fault> {
        let _input: Value = req.decode()?;
        Ok(Reply::ok("created").with_data(json!({"id": 42})))
    }

    fn app_under_test() -> BoxedHandler {
        Service::builder()
            .cors(CorsConfig::for_origins(["https://app.example"]))
            .layer(Trace)
            .layer(Preflight)
            .route(Scope::new("/api").post("/users", create_user))
            .build()
            .app
    }

    fn request(method: Method, path: &str, origin: Option<&str>, body: &[u8]) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(o) = origin {
            builder = builder.header(header::ORIGIN, o);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Request::new(parts, bytes::Bytes::copy_from_slice(body))
    }

    #[tokio::test]
    async fn post_round_trip_produces_the_full_envelope() {
        let app = app_under_test();
        let resp = app
            .call(request(
                Method::POST,
                "/api/users",
                Some("https://app.example"),
                br#"{"name":"alice"}"#,
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://app.example"
        );

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"], "created");
        assert_eq!(body["data"], json!({"id": 42}));
        assert!(body["ts"].is_u64());
    }

    #[tokio::test]
    async fn preflight_is_short_circuited_but_still_decorated() {
        let app = app_under_test();
        let resp = app
            .call(request(
                Method::OPTIONS,
                "/api/users",
                Some("https://app.example"),
                b"",
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        // Trace is registered before Preflight, so even the short-circuited
        // probe is tagged; CORS wraps everything, so it is decorated too.
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://app.example"
        );

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn unlisted_origin_is_tagged_but_not_decorated() {
        let app = app_under_test();
        let resp = app
            .call(request(
                Method::POST,
                "/api/users",
                Some("https://evil.example"),
                br#"{}"#,
            ))
            .await;

        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
        assert!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_route_is_a_uniform_404_with_trace_header() {
        let app = app_under_test();
        let resp = app
            .call(request(Method::GET, "/nope", None, b""))
            .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn default_config_binds_loopback() {
        let builder = Service::builder();
        assert_eq!(builder.addr, DEFAULT_ADDR);
    }

    #[tokio::test]
    async fn invalid_address_fails_before_binding() {
        let err = Service::builder()
            .bind("not-an-address")
            .build()
            .listen()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddr(_)));
    }

    #[tokio::test]
    async fn occupied_port_is_a_fatal_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = Service::builder()
            .bind(addr.clone())
            .build()
            .listen()
            .await
            .unwrap_err();

        match err {
            Error::Bind { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {other}"),
        }
    }
}
