//! HTTP/1.1 transport for an [`Application`].
//!
//! The server accepts TCP connections, serves each one on its own task and hands every
//! request to [`Application::handle_with_cancellation`]. A request whose connection goes away
//! before the response is ready has its cancellation token cancelled.

use crate::app::Application;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_HOSTNAME: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const HTTP_PORT: u16 = 80;

/// A `hostname:port` pair to listen on or to address an application by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenAddress {
    hostname: String,
    port: u16,
}

impl Default for ListenAddress {
    fn default() -> Self {
        Self { hostname: DEFAULT_HOSTNAME.to_string(), port: DEFAULT_PORT }
    }
}

impl ListenAddress {
    pub fn new<S: Into<String>>(hostname: S, port: u16) -> Self {
        Self { hostname: hostname.into().to_ascii_lowercase(), port }
    }

    /// Parses `host:port`, `host`, `:port` or `[v6]:port`.
    ///
    /// A missing host means every interface (`0.0.0.0`), a missing port means `80`.
    pub fn parse(address: &str) -> Result<Self, ServerError> {
        let invalid = || ServerError::InvalidAddress { address: address.to_string() };

        let trimmed = address.trim();
        let normalized = if trimmed.starts_with(':') && !trimmed.starts_with("::") {
            format!("{DEFAULT_HOSTNAME}{trimmed}")
        } else {
            trimmed.to_string()
        };

        let (hostname, port) = if let Some(rest) = normalized.strip_prefix('[') {
            let (hostname, rest) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match rest {
                "" => None,
                _ => Some(rest.strip_prefix(':').ok_or_else(invalid)?),
            };
            (hostname, port)
        } else {
            match normalized.rsplit_once(':') {
                Some((hostname, _)) if hostname.contains(':') => return Err(invalid()),
                Some((hostname, port)) => (hostname, Some(port)),
                None => (normalized.as_str(), None),
            }
        };

        if hostname.is_empty() || hostname.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(invalid());
        }
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => HTTP_PORT,
        };

        Ok(Self::new(hostname, port))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Same port, and same host where `127.0.0.1`, `0.0.0.0` and `localhost` are all
    /// considered the local machine.
    pub fn same_endpoint(&self, other: &ListenAddress) -> bool {
        self.port == other.port && (self.hostname == other.hostname || (is_local(&self.hostname) && is_local(&other.hostname)))
    }
}

fn is_local(hostname: &str) -> bool {
    matches!(hostname, "127.0.0.1" | "0.0.0.0" | "localhost")
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "[{}]:{}", self.hostname, self.port)
        } else {
            write!(f, "{}:{}", self.hostname, self.port)
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid listen address '{address}'")]
    InvalidAddress { address: String },

    #[error("application must be set")]
    MissingApplication,

    #[error("bind {address} error: {source}")]
    Bind { address: String, source: io::Error },

    #[error("accept connection error: {source}")]
    Accept {
        #[from]
        source: io::Error,
    },
}

#[derive(Debug, Default)]
pub struct ServerBuilder {
    application: Option<Application>,
    address: Option<String>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// The listen address, see [`ListenAddress::parse`]. Defaults to `0.0.0.0:8000`.
    #[must_use]
    pub fn address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn application(mut self, application: Application) -> Self {
        self.application = Some(application);
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let application = self.application.ok_or(ServerError::MissingApplication)?;
        let address = match self.address {
            Some(address) => ListenAddress::parse(&address)?,
            None => ListenAddress::default(),
        };
        Ok(Server { application: Arc::new(application), address })
    }
}

#[derive(Debug)]
pub struct Server {
    application: Arc<Application>,
    address: ListenAddress,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn address(&self) -> &ListenAddress {
        &self.address
    }

    /// Installs a console subscriber unless one is already set, then binds and serves.
    pub async fn start(self) -> Result<(), ServerError> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("global tracing subscriber already set");
        }

        self.bind().await?.serve().await
    }

    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let tcp_listener = TcpListener::bind((self.address.hostname(), self.address.port()))
            .await
            .map_err(|source| ServerError::Bind { address: self.address.to_string(), source })?;

        info!(address = %self.address, "start listening");
        Ok(BoundServer { tcp_listener, application: self.application })
    }
}

/// A server whose socket is bound but that doesn't accept connections yet.
#[derive(Debug)]
pub struct BoundServer {
    tcp_listener: TcpListener,
    application: Arc<Application>,
}

impl BoundServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp_listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            let (tcp_stream, remote_addr) = match self.tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) if is_connection_error(&e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
                Err(e) => return Err(ServerError::from(e)),
            };

            let application = Arc::clone(&self.application);

            tokio::spawn(async move {
                let io = TokioIo::new(tcp_stream);
                let service = service_fn(move |request: http::Request<Incoming>| {
                    let application = Arc::clone(&application);
                    async move {
                        let cancellation = CancellationToken::new();
                        let guard = cancellation.clone().drop_guard();
                        let response = application.handle_with_cancellation(request, cancellation).await;
                        guard.disarm();
                        Ok::<_, Infallible>(response)
                    }
                });

                match http1::Builder::new().timer(TokioTimer::new()).serve_connection(io, service).await {
                    Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => warn!(%remote_addr, cause = %e, "connection error, connection shutdown"),
                }
            });
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset)
}
