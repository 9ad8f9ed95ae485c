//! Error types surfaced by the framework.
//!
//! Errors fall into a small taxonomy:
//! - [`RouteError`]: structural problems found while registering routes. They are returned
//!   by the registration call and never deferred to request time.
//! - [`WebError`]: anything raised while a request travels through the middleware chain.
//!   It is caught exactly once, at the application boundary.
//! - [`HttpError`]: an error carrying the status code the client should see, optionally
//!   wrapping a cause.
//! - [`BodyError`]: failures reading the request body.

use http::StatusCode;
use std::error::Error;
use thiserror::Error;

/// The generic boxed error used as a cause throughout the crate.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route method '{method}'")]
    InvalidMethod { method: String },

    #[error("empty parameter name in pattern '{pattern}'")]
    EmptyParamName { pattern: String },

    #[error("duplicate parameter '{name}' in pattern '{pattern}'")]
    DuplicateParam { name: String, pattern: String },

    #[error("variadic segment ':{name}*' must be the last segment of pattern '{pattern}'")]
    VariadicNotLast { name: String, pattern: String },

    #[error("route definition '{definition}' has no path")]
    MissingPath { definition: String },
}

impl RouteError {
    pub(crate) fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body has been consumed")]
    Consumed,

    #[error("read request body error: {source}")]
    Read { source: BoxError },

    #[error("request body is not valid utf-8")]
    InvalidUtf8,

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}

impl BodyError {
    pub fn read<E: Into<BoxError>>(e: E) -> Self {
        Self::Read { source: e.into() }
    }
}

/// An error with an intended response status.
///
/// When the cause is itself an [`HttpError`], [`HttpError::wrap`] inherits its status,
/// otherwise the status defaults to `500 Internal Server Error`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    #[source]
    cause: Option<BoxError>,
}

impl HttpError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self { status, message: message.into(), cause: None }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Wraps `cause`, taking over its status if it is an [`HttpError`].
    pub fn wrap<S, E>(message: S, cause: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        let cause = cause.into();
        let status = cause.downcast_ref::<HttpError>().map_or(StatusCode::INTERNAL_SERVER_ERROR, HttpError::status);
        Self { status, message: message.into(), cause: Some(cause) }
    }

    /// Attaches a cause while keeping the status chosen at construction.
    #[must_use]
    pub fn with_cause<E: Into<BoxError>>(mut self, cause: E) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

/// Errors raised anywhere in the middleware chain.
#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A framework contract violation, such as a response value that can't be turned into a body.
    #[error("developer error: {reason}")]
    Developer { reason: String },

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("invalid header: {source}")]
    InvalidHeader {
        #[from]
        source: http::Error,
    },

    #[error("json serialization error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("form serialization error: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::ser::Error,
    },

    #[error("invalid query string: {source}")]
    Query {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl WebError {
    pub fn developer<S: ToString>(reason: S) -> Self {
        Self::Developer { reason: reason.to_string() }
    }

    /// The status the application boundary responds with.
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Http(e) => e.status(),
            WebError::Body(_) | WebError::Query { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message of the wrapped cause, if there is one.
    pub fn cause_message(&self) -> Option<String> {
        match self {
            WebError::Http(e) => e.cause().map(ToString::to_string),
            other => other.source().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_inherits_status() {
        let inner = HttpError::new(StatusCode::FORBIDDEN, "no access");
        let outer = HttpError::wrap("request rejected", inner);

        assert_eq!(outer.status(), StatusCode::FORBIDDEN);
        assert_eq!(outer.cause().map(ToString::to_string).as_deref(), Some("no access"));
    }

    #[test]
    fn test_wrap_generic_cause_is_500() {
        let io = std::io::Error::other("disk gone");
        let error = HttpError::wrap("failed", io);

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), "failed");
    }

    #[test]
    fn test_web_error_status() {
        assert_eq!(WebError::from(HttpError::not_found("gone")).status(), StatusCode::NOT_FOUND);
        assert_eq!(WebError::from(BodyError::Consumed).status(), StatusCode::BAD_REQUEST);
        assert_eq!(WebError::developer("bad body").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cause_message() {
        let error = WebError::from(HttpError::bad_request("bad").with_cause("missing field"));
        assert_eq!(error.cause_message().as_deref(), Some("missing field"));

        let error = WebError::developer("oops");
        assert_eq!(error.cause_message(), None);
    }
}
