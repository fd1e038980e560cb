//! CORS policy configuration and response decoration.
//!
//! The policy is evaluated per request against the `Origin` header:
//! wildcard configs always decorate with `*`; allow-list configs echo the
//! origin back only on an exact match and add no allow-origin header
//! otherwise, leaving the block to the browser. The decorator is applied
//! as the outermost layer of the service, so even responses produced by a
//! short-circuiting middleware (the preflight 204) carry CORS headers.

use std::sync::Arc;

use http::{HeaderValue, Method, header};
use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;

/// CORS policy: which origins, methods, and headers cross-origin callers
/// may use, and whether credentialed requests are allowed.
///
/// Read-only after the service starts; shared across all request tasks.
#[derive(Clone, Debug)]
pub struct CorsConfig {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Option<u32>,
}

impl CorsConfig {
    /// The permissive policy: any origin, common methods, any header,
    /// credentials allowed. The service default — tighten it with
    /// [`for_origins`](CorsConfig::for_origins) before exposing anything
    /// real.
    pub fn allow_all() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec!["*".to_owned()],
            allow_credentials: true,
            max_age: None,
        }
    }

    /// An allow-list policy: only the given origins match, by exact string
    /// comparison. Credentials default to off for listed origins.
    pub fn for_origins(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_origins: origins.into_iter().map(Into::into).collect(),
            allow_credentials: false,
            ..Self::allow_all()
        }
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.allowed_methods = methods.into_iter().collect();
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Preflight cache lifetime in seconds (`access-control-max-age`).
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    fn is_wildcard(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// The `access-control-allow-origin` value for a request from
    /// `origin`, or `None` when the policy does not admit it.
    fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.is_wildcard() {
            return Some("*".to_owned());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|o| o == origin)
            .then(|| origin.to_owned())
    }

    /// Adds the policy's headers to `resp` for a request from `origin`.
    pub(crate) fn decorate(&self, origin: Option<&str>, resp: &mut http::Response<crate::envelope::Body>) {
        match self.allowed_origin(origin) {
            Some(allowed) => {
                if let Ok(value) = HeaderValue::from_str(&allowed) {
                    resp.headers_mut()
                        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                }
            }
            None => {
                debug!(origin = origin.unwrap_or("<none>"), "origin not in CORS allow-list");
            }
        }

        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            resp.headers_mut()
                .insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }

        if !self.allowed_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.allowed_headers.join(", ")) {
                resp.headers_mut()
                    .insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }

        if self.allow_credentials {
            resp.headers_mut().insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if let Some(age) = self.max_age {
            if let Ok(value) = HeaderValue::from_str(&age.to_string()) {
                resp.headers_mut()
                    .insert(header::ACCESS_CONTROL_MAX_AGE, value);
            }
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::allow_all()
    }
}

/// Wraps the fully composed chain so the policy decorates every response,
/// short-circuited ones included.
pub(crate) fn wrap(config: Arc<CorsConfig>, next: BoxedHandler) -> BoxedHandler {
    Arc::new(Decorator { config, next })
}

struct Decorator {
    config: Arc<CorsConfig>,
    next: BoxedHandler,
}

impl ErasedHandler for Decorator {
    fn call(&self, req: Request) -> BoxFuture {
        let origin = req.header(header::ORIGIN.as_str()).map(str::to_owned);
        let config = Arc::clone(&self.config);
        let fut = self.next.call(req);
        Box::pin(async move {
            let mut resp = fut.await;
            config.decorate(origin.as_deref(), &mut resp);
            resp
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Reply;
    use crate::handler::Handler;
    use crate::request::Request;
    use bytes::Bytes;
    use http::StatusCode;

    fn with_origin(origin: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(Method::GET).uri("/");
        if let Some(o) = origin {
            builder = builder.header(header::ORIGIN, o);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Request::new(parts, Bytes::new())
    }

    async fn ping(_req: Request) -> Reply {
        Reply::ok("pong")
    }

    #[tokio::test]
    async fn wildcard_policy_decorates_every_origin() {
        let app = wrap(Arc::new(CorsConfig::allow_all()), ping.into_boxed_handler());
        let resp = app.call(with_origin(Some("https://anywhere.example"))).await;

        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn allow_list_echoes_listed_origins_only() {
        let config = Arc::new(CorsConfig::for_origins(["https://app.example"]));
        let app = wrap(Arc::clone(&config), ping.into_boxed_handler());

        let listed = app.call(with_origin(Some("https://app.example"))).await;
        assert_eq!(
            listed
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://app.example"
        );

        let unlisted = app.call(with_origin(Some("https://evil.example"))).await;
        assert!(
            unlisted
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
        // The request itself still went through; the browser enforces the
        // block client-side.
        assert_eq!(unlisted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn allow_list_with_no_origin_header_adds_no_allow_origin() {
        let config = Arc::new(CorsConfig::for_origins(["https://app.example"]));
        let app = wrap(config, ping.into_boxed_handler());
        let resp = app.call(with_origin(None)).await;
        assert!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn configured_methods_headers_and_max_age_are_emitted() {
        let config = Arc::new(
            CorsConfig::for_origins(["https://app.example"])
                .methods([Method::GET, Method::POST])
                .headers(["content-type", "authorization"])
                .max_age(86400),
        );
        let app = wrap(config, ping.into_boxed_handler());
        let resp = app.call(with_origin(Some("https://app.example"))).await;

        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            "GET, POST"
        );
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
                .unwrap(),
            "content-type, authorization"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(),
            "86400"
        );
        assert!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .is_none()
        );
    }
}
