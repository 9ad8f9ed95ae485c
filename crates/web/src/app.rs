//! The application: the top-level middleware chain plus the error boundary.
//!
//! [`Application::handle`] takes a request through its whole lifecycle: the context is built,
//! the connection hooks of installed extensions run, the chain dispatches, and the finished
//! context is materialized into a response. Any error or panic raised along the way is caught
//! here, once, and turned into a JSON error response.

use crate::body::{OptionReqBody, ResponseBody};
use crate::error::{BoxError, HttpError, WebError};
use crate::extension::Extension;
use crate::middleware::{Middleware, Next};
use crate::router::Router;
use crate::RequestContext;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::join_all;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body::Body as HttpBody;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const ROUTE_NOT_FOUND_BODY: &str = r#"{"status":404,"message":"Route does not exist"}"#;
const INTERNAL_ERROR_BODY: &str = r#"{"status":500,"message":"Internal Server Error"}"#;

pub struct Application {
    middlewares: Vec<Box<dyn Middleware>>,
    extensions: Vec<Box<dyn Extension>>,
    development_mode: bool,
}

#[derive(Default)]
pub struct ApplicationBuilder {
    middlewares: Vec<Box<dyn Middleware>>,
    extensions: Vec<Box<dyn Extension>>,
    development_mode: bool,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// In development mode error responses carry the error message and its cause.
    #[must_use]
    pub fn development_mode(mut self, development_mode: bool) -> Self {
        self.development_mode = development_mode;
        self
    }

    /// Appends a middleware to the application chain.
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// Mounts a router at the current position of the chain.
    #[must_use]
    pub fn router(self, router: Router) -> Self {
        self.middleware(router)
    }

    /// Installs an extension, unless one with the same name is already installed.
    #[must_use]
    pub fn install<E: Extension + 'static>(mut self, extension: E) -> Self {
        if self.extensions.iter().any(|installed| installed.name() == extension.name()) {
            debug!(extension = extension.name(), "extension already installed, skip");
            return self;
        }
        if let Some(middleware) = extension.middleware() {
            self.middlewares.push(middleware);
        }
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn build(self) -> Application {
        Application { middlewares: self.middlewares, extensions: self.extensions, development_mode: self.development_mode }
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("middlewares", &self.middlewares.len())
            .field("extensions", &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("development_mode", &self.development_mode)
            .finish()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("middlewares", &self.middlewares.len())
            .field("extensions", &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("development_mode", &self.development_mode)
            .finish()
    }
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn is_development_mode(&self) -> bool {
        self.development_mode
    }

    /// Handles one request from start to finish. This never fails: errors become responses.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.handle_with_cancellation(request, CancellationToken::new()).await
    }

    /// Like [`Application::handle`], with the token the transport cancels when the
    /// connection goes away.
    pub async fn handle_with_cancellation<B>(&self, request: Request<B>, cancellation: CancellationToken) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        self.run_connection_hooks(&parts).await;

        let mut ctx = RequestContext::new(parts, OptionReqBody::new(body)).with_cancellation(cancellation);
        let dispatched = AssertUnwindSafe(Next::new(&self.middlewares).run(&mut ctx)).catch_unwind().await;

        let result = match dispatched {
            Ok(result) => result,
            Err(panic) => Err(WebError::from(HttpError::internal("request handling panicked").with_cause(panic_message(&*panic)))),
        };

        if ctx.is_cancelled() {
            debug!(path = ctx.path(), "request cancelled while dispatching");
        }

        match result.and_then(|()| Self::finalize(ctx)) {
            Ok(response) => response,
            Err(e) => {
                error!(cause = %e, status = %e.status(), "request failed");
                self.error_response(&e)
            }
        }
    }

    async fn run_connection_hooks(&self, parts: &Parts) {
        let hooks = self.extensions.iter().filter_map(|extension| extension.connection_hook().map(|hook| (extension.name(), hook)));

        let results = join_all(hooks.map(|(name, hook)| async move {
            let result = AssertUnwindSafe(hook.on_connection(parts))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(BoxError::from(panic_message(&*panic))));
            (name, result)
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                warn!(extension = name, cause = %e, "connection hook failed");
            }
        }
    }

    fn finalize(ctx: RequestContext) -> Result<Response<ResponseBody>, WebError> {
        let unhandled = ctx.is_unhandled();
        let mut response = ctx.into_response_context();

        if unhandled && response.body().is_absent() {
            let mut headers = std::mem::take(response.headers_mut());
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(ROUTE_NOT_FOUND_BODY.len()));
            return Ok(json_response(StatusCode::NOT_FOUND, headers, Bytes::from_static(ROUTE_NOT_FOUND_BODY.as_bytes())));
        }

        response.into_response()
    }

    fn error_response(&self, error: &WebError) -> Response<ResponseBody> {
        let status = error.status();
        let body = if self.development_mode {
            ErrorBody { status: status.as_u16(), message: error.to_string(), cause: error.cause_message() }
        } else {
            ErrorBody { status: status.as_u16(), message: "Internal Server Error".to_string(), cause: None }
        };

        let bytes = serde_json::to_vec(&body).map_or_else(|_| Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes()), Bytes::from);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        json_response(status, headers, bytes)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
}

fn json_response(status: StatusCode, headers: HeaderMap, bytes: Bytes) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::once(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
