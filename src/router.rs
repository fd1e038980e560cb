//! Radix-tree request router.
//!
//! One matchit tree per HTTP method, built once at startup. Matching is
//! delegated entirely to [`matchit`]; this module only owns registration
//! and the unmatched-path fault.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::envelope::{Fault, fallback_internal};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router.
///
/// Each registration call returns `self` so routes chain naturally:
///
/// ```rust,no_run
/// # use manila::{Reply, Request, Router, Scope};
/// # async fn get_user(_: Request) -> Reply { Reply::ok("") }
/// # async fn create_user(_: Request) -> Reply { Reply::ok("") }
/// # async fn live(_: Request) -> Reply { Reply::ok("ok") }
/// let app = Router::new()
///     .get("/healthz", live)
///     .mount(
///         Scope::new("/api")
///             .get("/users/{id}", get_user)
///             .post("/users", create_user),
///     );
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for
    /// chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves
    /// them.
    ///
    /// # Panics
    ///
    /// Panics if the path pattern is invalid or conflicts with an existing
    /// registration. Routes are wired at startup; a bad table is a
    /// programming error, not a runtime condition.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler.into_boxed_handler());
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Mounts every route registered on a [`Scope`] under its prefix.
    pub fn mount(mut self, scope: Scope) -> Self {
        for (method, path, handler) in scope.routes {
            self.add(method, &path, handler);
        }
        self
    }

    fn add(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Finalizes the table into the innermost stage of the middleware
    /// chain: route, or answer with the uniform JSON 404.
    pub(crate) fn into_handler(self) -> BoxedHandler {
        Arc::new(Dispatch { router: self })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

struct Dispatch {
    router: Router,
}

impl ErasedHandler for Dispatch {
    fn call(&self, mut req: Request) -> BoxFuture {
        match self.router.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.set_params(params);
                handler.call(req)
            }
            None => {
                debug!(method = %req.method(), path = req.path(), "no route matched");
                let fault = Fault::not_found(format!(
                    "no route for {} {}",
                    req.method(),
                    req.path()
                ))
                .with_message("not found");
                Box::pin(async move { fault.write().unwrap_or_else(|_| fallback_internal()) })
            }
        }
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// A sub-registration handle scoped to a path prefix.
///
/// Routes registered on a scope are stored relative to it and joined with
/// the prefix when the scope is [mounted](Router::mount).
pub struct Scope {
    prefix: String,
    routes: Vec<(Method, String, BoxedHandler)>,
}

impl Scope {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: Vec::new(),
        }
    }

    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let full = join(&self.prefix, path);
        self.routes.push((method, full, handler.into_boxed_handler()));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }
}

fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}
