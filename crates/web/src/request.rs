//! Request handling module that provides access to HTTP request information and path parameters.
//!
//! This module contains the core per-request types:
//! - `RequestContext`: the state threaded through every middleware and handler of one request
//! - `PathParams`: the path variables captured by the router

mod negotiation;

use crate::body::OptionReqBody;
use crate::error::WebError;
use crate::response::ResponseContext;
use http::request::Parts;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Represents the context of an HTTP request.
///
/// It bundles the immutable request facts, the mutable [`ResponseContext`] and the path
/// parameters filled in by the router. A context is created for exactly one request and is
/// never shared between requests.
#[derive(Debug)]
pub struct RequestContext {
    request_header: Parts,
    body: OptionReqBody,
    path_params: PathParams,
    response: ResponseContext,
    cancellation: CancellationToken,
    unhandled: bool,
}

impl RequestContext {
    /// Creates a new RequestContext with the given request header and body
    pub fn new(request_header: Parts, body: OptionReqBody) -> Self {
        Self {
            request_header,
            body,
            path_params: PathParams::empty(),
            response: ResponseContext::new(),
            cancellation: CancellationToken::new(),
            unhandled: false,
        }
    }

    /// Replaces the lifetime signal of this request.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns a reference to the underlying request header parts
    pub fn request_header(&self) -> &Parts {
        &self.request_header
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.request_header.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.request_header.uri
    }

    /// Returns the request path, as delivered by the transport (no percent-decoding)
    pub fn path(&self) -> &str {
        self.request_header.uri.path()
    }

    /// Returns the raw query string, if any
    pub fn query_string(&self) -> Option<&str> {
        self.request_header.uri.query()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.request_header.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.request_header.headers
    }

    /// Returns the request body; it can be read once
    pub fn body(&self) -> &OptionReqBody {
        &self.body
    }

    /// Decoded query pairs in their original order; repeated keys are kept.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, WebError> {
        let query = self.query_string().unwrap_or_default();
        Ok(serde_urlencoded::from_str(query)?)
    }

    /// Deserializes the query string into `T`.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        let query = self.query_string().unwrap_or_default();
        Ok(serde_urlencoded::from_str(query)?)
    }

    /// Returns the most preferred of `types` according to the `Accept` header.
    ///
    /// `types` may contain full media types (`text/html`, `image/*`) or one of the shorthands
    /// `json`, `html`, `css`, `js`, `javascript`, `svg`, `png`, `jpeg`, `jpg`. Returns `None`
    /// when nothing is acceptable.
    pub fn accepts<'t>(&self, types: &[&'t str]) -> Option<&'t str> {
        let accept = self.headers().get(http::header::ACCEPT).and_then(|value| value.to_str().ok());
        negotiation::preferred(accept, types)
    }

    /// Returns a reference to the path parameters extracted from the request URL
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Shortcut for `path_params().get(name)`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }

    pub(crate) fn set_path_params(&mut self, path_params: PathParams) {
        self.path_params = path_params;
    }

    pub fn response(&self) -> &ResponseContext {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseContext {
        &mut self.response
    }

    /// Temporary redirect: `307`, or `303` for PUT and POST requests.
    pub fn redirect(&mut self, location: &str) -> Result<&mut Self, WebError> {
        self.redirect_with(location, StatusCode::TEMPORARY_REDIRECT)
    }

    /// Permanent redirect: `308`, or `303` for PUT and POST requests.
    pub fn redirect_permanent(&mut self, location: &str) -> Result<&mut Self, WebError> {
        self.redirect_with(location, StatusCode::PERMANENT_REDIRECT)
    }

    /// Permanent redirect for old clients without `308` support: `301`, or `303` for PUT and POST.
    pub fn redirect_permanent_compat(&mut self, location: &str) -> Result<&mut Self, WebError> {
        self.redirect_with(location, StatusCode::MOVED_PERMANENTLY)
    }

    fn redirect_with(&mut self, location: &str, status: StatusCode) -> Result<&mut Self, WebError> {
        let status = if matches!(self.method(), &Method::PUT | &Method::POST) { StatusCode::SEE_OTHER } else { status };
        self.response.set_status(status).set_header(http::header::LOCATION, location)?;
        Ok(self)
    }

    /// The lifetime signal of this request, cancelled when the connection goes away.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Marks the request as not claimed by any middleware: the top-level chain ran out.
    pub(crate) fn mark_unhandled(&mut self) {
        self.unhandled = true;
        self.response.set_status(StatusCode::NOT_FOUND);
    }

    pub fn is_unhandled(&self) -> bool {
        self.unhandled
    }

    pub(crate) fn into_response_context(self) -> ResponseContext {
        self.response
    }
}

/// Path variables captured by the router, in pattern order.
///
/// Path parameters are named segments in the URL path that can be extracted and accessed
/// by name. For example, in the pattern "/users/:id", "id" is a path parameter. Unnamed
/// wildcards are stored under the keys `0`, `1`, ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { params: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Iterates over `(name, value)` pairs in pattern order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn context(request: Request<()>) -> RequestContext {
        let (parts, ()) = request.into_parts();
        RequestContext::new(parts, OptionReqBody::empty())
    }

    #[test]
    fn test_request_facts() {
        let ctx = context(
            Request::builder().method(Method::POST).uri("/users/42?sort=asc&tag=a&tag=b").header("X-Trace", "1").body(()).unwrap(),
        );

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.query_string(), Some("sort=asc&tag=a&tag=b"));
        assert_eq!(ctx.headers().get("x-trace").unwrap(), "1");
        assert!(ctx.path_params().is_empty());
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert!(!ctx.is_unhandled());
    }

    #[test]
    fn test_query_pairs_keep_repeated_keys() {
        let ctx = context(Request::builder().uri("/search?q=rust%20web&tag=a&tag=b").body(()).unwrap());

        let pairs = ctx.query_pairs().unwrap();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "rust web".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn test_typed_query() {
        #[derive(serde::Deserialize)]
        struct Page {
            page: u32,
            size: Option<u32>,
        }

        let ctx = context(Request::builder().uri("/list?page=3").body(()).unwrap());
        let page: Page = ctx.query().unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.size, None);

        let ctx = context(Request::builder().uri("/list?page=abc").body(()).unwrap());
        assert!(matches!(ctx.query::<Page>(), Err(WebError::Query { .. })));
    }

    #[test]
    fn test_path_params_keep_order() {
        let mut params = PathParams::with_capacity(2);
        params.push("org", "rust-lang");
        params.push("repo", "cargo");

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("repo"), Some("cargo"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["org", "repo"]);
    }

    #[test]
    fn test_redirects() {
        let mut ctx = context(Request::builder().method(Method::GET).uri("/old").body(()).unwrap());
        ctx.redirect("/new").unwrap();
        assert_eq!(ctx.response().status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(ctx.response().headers().get(http::header::LOCATION).unwrap(), "/new");

        let mut ctx = context(Request::builder().method(Method::GET).uri("/old").body(()).unwrap());
        ctx.redirect_permanent_compat("/new").unwrap();
        assert_eq!(ctx.response().status(), StatusCode::MOVED_PERMANENTLY);

        let mut ctx = context(Request::builder().method(Method::POST).uri("/form").body(()).unwrap());
        ctx.redirect_permanent("/done").unwrap();
        assert_eq!(ctx.response().status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_accepts_uses_header() {
        let ctx = context(Request::builder().uri("/").header("Accept", "text/html, application/json;q=0.8").body(()).unwrap());

        assert_eq!(ctx.accepts(&["json", "html"]), Some("html"));
        assert_eq!(ctx.accepts(&["json"]), Some("json"));
        assert_eq!(ctx.accepts(&["png"]), None);
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = context(Request::builder().uri("/").body(()).unwrap()).with_cancellation(token.clone());

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
