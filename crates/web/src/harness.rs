//! Drive applications in tests without opening sockets.
//!
//! A [`TestHarness`] keeps the applications under test keyed by the address they would
//! listen on, and resolves requests against them in-process.

use crate::app::Application;
use crate::body::ResponseBody;
use crate::error::BoxError;
use crate::server::ListenAddress;
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body as HttpBody;
use http_body_util::Empty;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("no application registered at {address}")]
    NoApplication { address: String },

    #[error("request uri has no host")]
    MissingHost,

    #[error("invalid request: {source}")]
    InvalidRequest {
        #[from]
        source: http::Error,
    },
}

#[derive(Debug, Default)]
pub struct TestHarness {
    applications: Vec<(ListenAddress, Arc<Application>)>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `application` under `address`; a later registration for the same address wins.
    pub fn register(&mut self, address: ListenAddress, application: Application) -> &mut Self {
        self.applications.retain(|(registered, _)| registered != &address);
        self.applications.push((address, Arc::new(application)));
        self
    }

    /// Resolves a request with the application registered at the request URI's host and port.
    pub async fn resolve<B>(&self, request: Request<B>) -> Result<Response<ResponseBody>, HarnessError>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let host = request.uri().host().ok_or(HarnessError::MissingHost)?;
        let port = request.uri().port_u16().unwrap_or(80);
        let address = ListenAddress::new(host.trim_start_matches('[').trim_end_matches(']'), port);
        self.resolve_at(&address, request).await
    }

    /// Resolves a request with the application registered at `address`.
    pub async fn resolve_at<B>(&self, address: &ListenAddress, request: Request<B>) -> Result<Response<ResponseBody>, HarnessError>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let application = self.find(address).ok_or_else(|| HarnessError::NoApplication { address: address.to_string() })?;
        Ok(application.handle(request).await)
    }

    /// Sends a `GET` for `uri`.
    pub async fn fetch(&self, uri: &str) -> Result<Response<ResponseBody>, HarnessError> {
        let request = Request::get(uri).body(Empty::<Bytes>::new())?;
        self.resolve(request).await
    }

    fn find(&self, address: &ListenAddress) -> Option<&Arc<Application>> {
        self.applications
            .iter()
            .find(|(registered, _)| registered == address)
            .or_else(|| self.applications.iter().find(|(registered, _)| registered.same_endpoint(address)))
            .map(|(_, application)| application)
    }
}
