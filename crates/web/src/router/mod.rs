//! First-match routing.
//!
//! A [`Router`] is an ordered list of entries, each either a route or a plain middleware
//! (nested routers included). The router itself is a [`Middleware`]: it hands the request to
//! its entries in registration order, and once they are exhausted the chain continues after
//! the router. The first route whose method, path and filters accept the request wins;
//! routes that don't match pass the request on.
//!
//! ```
//! use sprig::router::{Router, get};
//! use sprig::{handler_fn, WebError};
//!
//! # fn main() -> Result<(), sprig::error::RouteError> {
//! let router = Router::with_base_path("/api")
//!     .route("/users/:id", get(handler_fn(|ctx| {
//!         Box::pin(async move {
//!             let id = ctx.param("id").unwrap_or_default().to_string();
//!             Ok::<_, WebError>(id)
//!         })
//!     })))?
//!     .route_spec("POST /users", handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>("created") })))?;
//! # Ok(())
//! # }
//! ```

pub mod filter;
mod pattern;

pub use pattern::{PathPattern, join_paths};

use crate::RequestContext;
use crate::error::{RouteError, WebError};
use crate::handler::RouteHandler;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use filter::{AllFilter, Filter, MethodFilter};
use http::Method;
use std::fmt;
use tracing::trace;

/// Ordered route table, usable as middleware.
pub struct Router {
    base_path: Option<String>,
    entries: Vec<Box<dyn Middleware>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { base_path: None, entries: Vec::new() }
    }

    /// Creates a router whose route patterns are all prefixed with `base_path`.
    pub fn with_base_path<S: Into<String>>(base_path: S) -> Self {
        Self { base_path: Some(base_path.into()), entries: Vec::new() }
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Creates an empty router for a sub-tree of this one: its base path is this router's
    /// base path joined with `prefix`. Add it back with [`Router::nest`].
    pub fn scope(&self, prefix: &str) -> Router {
        Router::with_base_path(self.full_path(prefix))
    }

    /// Registers a route. Routes are tried in registration order.
    pub fn route(mut self, path: &str, method_route: MethodRoute) -> Result<Self, RouteError> {
        let full_path = self.full_path(path);
        let pattern = PathPattern::compile(&full_path)?;
        trace!(method = %method_route.method, pattern = %pattern, "register route");
        self.entries.push(Box::new(Route {
            method: method_route.method,
            pattern,
            filters: method_route.filters,
            middlewares: method_route.middlewares,
            handler: method_route.handler,
        }));
        Ok(self)
    }

    /// Registers a route from a `"METHOD /path"` definition. A missing method, `*` or `ANY`
    /// accept every method.
    pub fn route_spec<H: RouteHandler + 'static>(self, definition: &str, handler: H) -> Result<Self, RouteError> {
        let (method, path) = parse_definition(definition)?;
        self.route(path, MethodRoute::new(method, handler))
    }

    /// Registers many routes from `("METHOD /path", handler)` pairs, in iteration order.
    pub fn routes<I, K, H>(self, routes: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: RouteHandler + 'static,
    {
        routes.into_iter().try_fold(self, |router, (definition, handler)| router.route_spec(definition.as_ref(), handler))
    }

    /// Adds a middleware entry; it sees every request that reaches this position.
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.entries.push(Box::new(middleware));
        self
    }

    /// Adds a nested router. Its routes are tried at this position; if none of them claims
    /// the request, matching continues after it.
    #[must_use]
    pub fn nest(self, router: Router) -> Self {
        self.middleware(router)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn full_path(&self, path: &str) -> String {
        match &self.base_path {
            Some(base_path) => join_paths(base_path, path),
            None => path.to_string(),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("base_path", &self.base_path).field("entries", &self.entries.len()).finish()
    }
}

#[async_trait]
impl Middleware for Router {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError> {
        Next::scoped(&self.entries, next).run(ctx).await
    }
}

/// Splits a `"METHOD /path"` definition.
fn parse_definition(definition: &str) -> Result<(MethodFilter, &str), RouteError> {
    let definition_trimmed = definition.trim();
    let (method, path) = match definition_trimmed.split_once(char::is_whitespace) {
        Some((method, path)) => (MethodFilter::parse(method)?, path.trim()),
        None => (MethodFilter::Any, definition_trimmed),
    };
    if path.is_empty() {
        return Err(RouteError::MissingPath { definition: definition.to_string() });
    }
    Ok((method, path))
}

/// A handler together with the method, filters and middleware of one route.
pub struct MethodRoute {
    method: MethodFilter,
    filters: AllFilter,
    middlewares: Vec<Box<dyn Middleware>>,
    handler: Box<dyn RouteHandler>,
}

impl MethodRoute {
    pub fn new<H: RouteHandler + 'static>(method: MethodFilter, handler: H) -> Self {
        Self { method, filters: filter::all_filter(), middlewares: Vec::new(), handler: Box::new(handler) }
    }

    /// Adds a filter the request must pass for this route to match.
    #[must_use]
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.and(filter);
        self
    }

    /// Adds route middleware. It only runs for requests this route matched, before the
    /// handler; [`Next::skip`] hands the request to the following routes instead.
    #[must_use]
    pub fn wrap<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }
}

impl fmt::Debug for MethodRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRoute").field("method", &self.method).field("middlewares", &self.middlewares.len()).finish()
    }
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a route for HTTP ", stringify!($upper_case_method), " requests.")]
        pub fn $method<H: RouteHandler + 'static>(handler: H) -> MethodRoute {
            MethodRoute::new(MethodFilter::Exact(Method::$upper_case_method), handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

/// Creates a route that accepts every method.
pub fn any<H: RouteHandler + 'static>(handler: H) -> MethodRoute {
    MethodRoute::new(MethodFilter::Any, handler)
}

/// Creates a route for an arbitrary method, such as `PURGE`.
pub fn method<H: RouteHandler + 'static>(method: &str, handler: H) -> Result<MethodRoute, RouteError> {
    Ok(MethodRoute::new(MethodFilter::parse(method)?, handler))
}

struct Route {
    method: MethodFilter,
    pattern: PathPattern,
    filters: AllFilter,
    middlewares: Vec<Box<dyn Middleware>>,
    handler: Box<dyn RouteHandler>,
}

#[async_trait]
impl Middleware for Route {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError> {
        if !self.method.matches_method(ctx.method()) {
            return next.run(ctx).await;
        }
        let Some(params) = self.pattern.matches(ctx.path()) else {
            return next.run(ctx).await;
        };
        if !self.filters.matches(ctx) {
            return next.run(ctx).await;
        }

        trace!(method = %self.method, pattern = %self.pattern, path = ctx.path(), "route matched");
        ctx.set_path_params(params);

        if self.middlewares.is_empty() {
            self.handler.invoke(ctx).await
        } else {
            Next::route(&self.middlewares, self.handler.as_ref(), next).run(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::filter::header;
    use super::*;
    use crate::body::Payload;
    use crate::handler::handler_fn;
    use crate::middleware::middleware_fn;
    use crate::{OptionReqBody, PathParams};
    use http::{HeaderName, HeaderValue, Request, StatusCode};

    fn context(method: Method, uri: &str) -> RequestContext {
        let (parts, ()) = Request::builder().method(method).uri(uri).body(()).unwrap().into_parts();
        RequestContext::new(parts, OptionReqBody::empty())
    }

    fn reply(text: &'static str) -> impl RouteHandler {
        handler_fn(move |_ctx| Box::pin(async move { Ok::<_, WebError>(text) }))
    }

    fn echo_params() -> impl RouteHandler {
        handler_fn(|ctx| {
            Box::pin(async move {
                let params: Vec<String> = ctx.path_params().iter().map(|(k, v)| format!("{k}={v}")).collect();
                Ok::<_, WebError>(params.join("&"))
            })
        })
    }

    async fn dispatch(router: &Router, method: Method, uri: &str) -> RequestContext {
        let chain: Vec<Box<dyn Middleware>> = Vec::new();
        let mut ctx = context(method, uri);
        router.handle(&mut ctx, Next::new(&chain)).await.unwrap();
        ctx
    }

    fn body_text(ctx: &RequestContext) -> Option<&str> {
        match ctx.response().body() {
            Payload::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let router = Router::new().route("/a/:x", get(reply("first"))).unwrap().route("/a/b", get(reply("second"))).unwrap();

        let ctx = dispatch(&router, Method::GET, "/a/b").await;
        assert_eq!(body_text(&ctx), Some("first"));
    }

    #[tokio::test]
    async fn test_method_and_path_mismatch_fall_through() {
        let router = Router::new().route("/", post(reply("post"))).unwrap().route("/", any(reply("any"))).unwrap();

        let ctx = dispatch(&router, Method::GET, "/").await;
        assert_eq!(body_text(&ctx), Some("any"));

        let ctx = dispatch(&router, Method::GET, "/missing").await;
        assert!(ctx.is_unhandled());
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_params_in_pattern_order() {
        let router = Router::new().route("/:org/:repo/pulls/:number", get(echo_params())).unwrap();

        let ctx = dispatch(&router, Method::GET, "/rust-lang/rust/pulls/7").await;
        assert_eq!(body_text(&ctx), Some("org=rust-lang&repo=rust&number=7"));
        assert_eq!(ctx.param("repo"), Some("rust"));
    }

    #[tokio::test]
    async fn test_wildcard_route() {
        let router = Router::new().route("/files/:rest*", get(echo_params())).unwrap();

        let ctx = dispatch(&router, Method::GET, "/files/a/b/c").await;
        assert_eq!(body_text(&ctx), Some("rest=a/b/c"));

        let router = Router::new().route("/files/*rest", get(echo_params())).unwrap();
        let ctx = dispatch(&router, Method::GET, "/files/a/b/c").await;
        assert_eq!(body_text(&ctx), Some("rest=a/b/c"));
        assert_eq!(ctx.param("rest"), Some("a/b/c"));
    }

    #[tokio::test]
    async fn test_base_path_and_scope() {
        let api = Router::with_base_path("/api/");
        let users = api.scope("users").route("/:id", get(echo_params())).unwrap().route("", get(reply("list"))).unwrap();
        let router = api.nest(users);

        let ctx = dispatch(&router, Method::GET, "/api/users/9").await;
        assert_eq!(body_text(&ctx), Some("id=9"));

        let ctx = dispatch(&router, Method::GET, "/api/users").await;
        assert_eq!(body_text(&ctx), Some("list"));

        let ctx = dispatch(&router, Method::GET, "/users/9").await;
        assert!(ctx.is_unhandled());
    }

    #[tokio::test]
    async fn test_nested_router_falls_through_to_parent() {
        let inner = Router::new().route("/inner", get(reply("inner"))).unwrap();
        let router = Router::new().nest(inner).route("/outer", get(reply("outer"))).unwrap();

        assert_eq!(body_text(&dispatch(&router, Method::GET, "/inner").await), Some("inner"));
        assert_eq!(body_text(&dispatch(&router, Method::GET, "/outer").await), Some("outer"));
    }

    #[tokio::test]
    async fn test_route_middleware_and_skip() {
        let tagging = middleware_fn(|ctx, next| {
            Box::pin(async move {
                ctx.response_mut().set_header("x-route", "guarded")?;
                next.run(ctx).await
            })
        });
        let skipping = middleware_fn(|ctx, next| {
            Box::pin(async move {
                if ctx.headers().contains_key("x-skip") {
                    return next.skip(ctx).await;
                }
                next.run(ctx).await
            })
        });

        let router = Router::new()
            .route("/guarded", get(reply("guarded")).wrap(tagging).wrap(skipping))
            .unwrap()
            .route("/guarded", get(reply("fallback")))
            .unwrap();

        let ctx = dispatch(&router, Method::GET, "/guarded").await;
        assert_eq!(body_text(&ctx), Some("guarded"));
        assert_eq!(ctx.response().headers().get("x-route").unwrap(), "guarded");

        let (parts, ()) = Request::builder().uri("/guarded").header("x-skip", "1").body(()).unwrap().into_parts();
        let mut ctx = RequestContext::new(parts, OptionReqBody::empty());
        let chain: Vec<Box<dyn Middleware>> = Vec::new();
        router.handle(&mut ctx, Next::new(&chain)).await.unwrap();
        assert_eq!(body_text(&ctx), Some("fallback"));
    }

    #[tokio::test]
    async fn test_filters() {
        let form = HeaderValue::from_str(mime::APPLICATION_WWW_FORM_URLENCODED.as_ref()).unwrap();
        let router = Router::new()
            .route("/", post(reply("form")).with(header(http::header::CONTENT_TYPE, form)))
            .unwrap()
            .route("/", post(reply("plain")))
            .unwrap();

        let (parts, ()) = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(HeaderName::from_static("content-type"), "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let mut ctx = RequestContext::new(parts, OptionReqBody::empty());
        let chain: Vec<Box<dyn Middleware>> = Vec::new();
        router.handle(&mut ctx, Next::new(&chain)).await.unwrap();
        assert_eq!(body_text(&ctx), Some("form"));

        let ctx = dispatch(&router, Method::POST, "/").await;
        assert_eq!(body_text(&ctx), Some("plain"));
    }

    #[tokio::test]
    async fn test_any_filter_on_route() {
        let mut versioned = filter::any_filter();
        versioned
            .or(header(HeaderName::from_static("x-version"), HeaderValue::from_static("1")))
            .or(header(HeaderName::from_static("x-version"), HeaderValue::from_static("2")));
        let router = Router::new().route("/", get(reply("versioned")).with(versioned)).unwrap().route("/", get(reply("latest"))).unwrap();

        let (parts, ()) = Request::builder().uri("/").header("x-version", "2").body(()).unwrap().into_parts();
        let mut ctx = RequestContext::new(parts, OptionReqBody::empty());
        let chain: Vec<Box<dyn Middleware>> = Vec::new();
        router.handle(&mut ctx, Next::new(&chain)).await.unwrap();
        assert_eq!(body_text(&ctx), Some("versioned"));

        let ctx = dispatch(&router, Method::GET, "/").await;
        assert_eq!(body_text(&ctx), Some("latest"));
    }

    #[tokio::test]
    async fn test_route_spec_and_bulk_routes() {
        let router = Router::new()
            .routes([("GET /a", reply("a")), ("post /b", reply("b")), ("/c", reply("c")), ("* /d", reply("d"))])
            .unwrap();

        assert_eq!(body_text(&dispatch(&router, Method::GET, "/a").await), Some("a"));
        assert_eq!(body_text(&dispatch(&router, Method::POST, "/b").await), Some("b"));
        assert_eq!(body_text(&dispatch(&router, Method::DELETE, "/c").await), Some("c"));
        assert_eq!(body_text(&dispatch(&router, Method::PATCH, "/d").await), Some("d"));
        assert!(dispatch(&router, Method::GET, "/b").await.is_unhandled());
    }

    #[test]
    fn test_registration_errors() {
        assert!(matches!(Router::new().route_spec("   ", reply("x")), Err(RouteError::MissingPath { .. })));
        assert!(matches!(Router::new().route_spec("G:T /x", reply("x")), Err(RouteError::InvalidMethod { .. })));
        assert!(matches!(Router::new().route("/:id/:id", get(reply("x"))), Err(RouteError::DuplicateParam { .. })));
        assert!(matches!(method("PURGE", reply("x")), Ok(_)));
        assert!(matches!(Router::with_base_path("/org/:id").route("/:id", get(reply("x"))), Err(RouteError::DuplicateParam { .. })));
        assert!(matches!(Router::with_base_path("/org/:id").scope("/repos").route("/:id", get(reply("x"))), Err(RouteError::DuplicateParam { .. })));
    }

    #[test]
    fn test_path_params_default_empty() {
        let ctx = context(Method::GET, "/");
        assert_eq!(ctx.path_params(), &PathParams::empty());
    }
}
