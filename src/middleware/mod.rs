//! Middleware layer.
//!
//! A middleware is a transformation over the type-erased handler: it takes
//! the next stage and returns a new stage wrapped around it. Cross-cutting
//! concerns — preflight short-circuiting, request-id injection — live here,
//! outside every route handler.
//!
//! Ordering is significant and belongs to whoever registers the layers:
//! the **first** registered middleware is the **outermost**. Register
//! [`Trace`] before [`Preflight`] and even short-circuited preflight
//! responses carry an `x-request-id`; swap them and they do not. The
//! framework fixes neither order.
//!
//! Custom middleware needs no trait impl — any closure from handler to
//! handler qualifies:
//!
//! ```rust,no_run
//! use manila::{BoxedHandler, Service};
//!
//! let deny_nothing = |next: BoxedHandler| -> BoxedHandler { next };
//! Service::builder().layer(deny_nothing);
//! ```

pub mod preflight;
pub mod trace;

pub use preflight::Preflight;
pub use trace::{REQUEST_ID_HEADER, Trace};

use crate::handler::BoxedHandler;

/// A `Handler → Handler` transformation.
pub trait Middleware: Send + Sync + 'static {
    /// Wraps `next`, returning the new outer stage.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Folds the registered layers around the innermost handler. Iterating in
/// reverse makes the first registered layer the outermost.
pub(crate) fn compose(layers: &[Box<dyn Middleware>], innermost: BoxedHandler) -> BoxedHandler {
    layers
        .iter()
        .rev()
        .fold(innermost, |next, layer| layer.wrap(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Reply;
    use crate::handler::{BoxFuture, ErasedHandler, Handler};
    use crate::request::{Request, synthetic};
    use http::Method;
    use std::sync::Arc;

    struct Mark {
        tag: &'static str,
        next: BoxedHandler,
    }

    impl ErasedHandler for Mark {
        fn call(&self, req: Request) -> BoxFuture {
            let tag = self.tag;
            let fut = self.next.call(req);
            Box::pin(async move {
                let mut resp = fut.await;
                resp.headers_mut().append(
                    "x-order",
                    http::HeaderValue::from_static(tag),
                );
                resp
            })
        }
    }

    fn marker(tag: &'static str) -> impl Middleware {
        move |next: BoxedHandler| -> BoxedHandler { Arc::new(Mark { tag, next }) }
    }

    async fn ping(_req: Request) -> Reply {
        Reply::ok("pong")
    }

    #[tokio::test]
    async fn first_registered_layer_is_outermost() {
        let layers: Vec<Box<dyn Middleware>> = vec![
            Box::new(marker("outer")) as Box<dyn Middleware>,
            Box::new(marker("inner")),
        ];
        let app = compose(&layers, ping.into_boxed_handler());

        let resp = app.call(synthetic(Method::GET, "/", b"")).await;
        let order: Vec<_> = resp
            .headers()
            .get_all("x-order")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();

        // Response decoration runs inside-out: the inner layer stamps
        // first, the outer layer last.
        assert_eq!(order, ["inner", "outer"]);
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler_itself() {
        let app = compose(&[], ping.into_boxed_handler());
        let resp = app.call(synthetic(Method::GET, "/", b"")).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
    }
}
