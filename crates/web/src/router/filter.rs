//! Request filtering module that provides composable request filters.
//!
//! Filters are extra predicates a route checks after its method and path matched:
//! - Filter requests based on HTTP methods
//! - Filter requests based on headers
//! - Combine multiple filters using AND/OR logic
//! - Create custom filters using closures
//!
//! A route whose filters reject the request behaves like a route that didn't match:
//! the chain continues with the next entry.
//!
//! # Examples
//!
//! ```
//! use http::{HeaderName, HeaderValue, Method};
//! use sprig::router::filter::{MethodFilter, all_filter, header};
//!
//! // Create a filter that matches GET requests
//! let get_filter = MethodFilter::Exact(Method::GET);
//!
//! // Create a filter that checks for specific header
//! let auth_filter = header(HeaderName::from_static("authorization"), HeaderValue::from_static("Bearer token"));
//!
//! // Combine filters with AND logic
//! let mut combined = all_filter();
//! combined.and(get_filter).and(auth_filter);
//! ```

use crate::RequestContext;
use crate::error::RouteError;
use http::{HeaderName, HeaderValue, Method};
use std::fmt;

/// Core trait for request filtering.
///
/// The `Filter` trait requires `Send + Sync`, ensuring that filters
/// can be safely used in a multi-threaded environment.
pub trait Filter: Send + Sync {
    /// Returns `true` if the request should be allowed, `false` otherwise.
    fn matches(&self, req: &RequestContext) -> bool;
}

/// A filter that wraps a closure.
struct FnFilter<F: Fn(&RequestContext) -> bool>(F);

impl<F: Fn(&RequestContext) -> bool + Send + Sync> Filter for FnFilter<F> {
    fn matches(&self, req: &RequestContext) -> bool {
        (self.0)(req)
    }
}

/// Creates a new filter from a closure.
///
/// # Example
/// ```
/// use sprig::router::filter::fn_filter;
///
/// let custom_filter = fn_filter(|req| {
///     req.path().starts_with("/api")
/// });
/// ```
pub fn fn_filter<F>(f: F) -> impl Filter
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    FnFilter(f)
}

/// Creates a new OR-composed filter chain.
pub fn any_filter() -> AnyFilter {
    AnyFilter::new()
}

/// Compose filters with OR logic.
///
/// An empty filter chain returns true by default.
pub struct AnyFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AnyFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    /// Add a new filter to the OR chain.
    pub fn or<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl fmt::Debug for AnyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyFilter").field("filters", &self.filters.len()).finish()
    }
}

impl Filter for AnyFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(req))
    }
}

/// Creates a new AND-composed filter chain.
pub fn all_filter() -> AllFilter {
    AllFilter::new()
}

/// Compose filters with AND logic.
///
/// An empty filter chain returns true by default.
pub struct AllFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AllFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    /// Add a new filter to the AND chain.
    pub fn and<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for AllFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllFilter").field("filters", &self.filters.len()).finish()
    }
}

impl Filter for AllFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.filters.iter().all(|filter| filter.matches(req))
    }
}

/// A filter that matches HTTP methods; `Any` accepts every method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Exact(Method),
}

impl MethodFilter {
    /// Parses a route method. `*` and `ANY` mean any method, everything else is upper-cased.
    pub fn parse(method: &str) -> Result<Self, RouteError> {
        let method = method.trim();
        if method == "*" || method.eq_ignore_ascii_case("any") {
            return Ok(MethodFilter::Any);
        }
        let upper = method.to_ascii_uppercase();
        if upper.is_empty() || !upper.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-' || b == b'_') {
            return Err(RouteError::invalid_method(method));
        }
        Method::from_bytes(upper.as_bytes()).map(MethodFilter::Exact).map_err(|_| RouteError::invalid_method(method))
    }

    pub fn matches_method(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Exact(expected) => expected.as_str().eq_ignore_ascii_case(method.as_str()),
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("ANY"),
            MethodFilter::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

impl Filter for MethodFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.matches_method(req.method())
    }
}

/// Creates a filter that matches a specific header name and value.
#[inline]
pub fn header(header_name: HeaderName, header_value: HeaderValue) -> HeaderFilter {
    HeaderFilter(header_name, header_value)
}

/// A filter that matches HTTP headers.
#[derive(Debug)]
pub struct HeaderFilter(HeaderName, HeaderValue);

impl Filter for HeaderFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        req.headers().get(&self.0).is_some_and(|value| self.1.eq(value))
    }
}
