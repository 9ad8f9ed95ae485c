//! A micro web framework built around a `next()`-style middleware chain.
//!
//! Requests flow through an ordered list of [`Middleware`]. Each middleware can act before
//! and after the rest of the chain, or answer on its own. A [`Router`] is just another
//! middleware that picks the first matching route; the [`Application`] owns the top-level
//! chain and turns whatever it produced, or whatever error it raised, into a response.
//!
//! ```no_run
//! use sprig::router::{Router, get};
//! use sprig::{Application, Server, WebError, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new().route("/", get(handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>("hello world") }))))?;
//!     let application = Application::builder().router(router).build();
//!
//!     Server::builder().application(application).address("127.0.0.1:8080").build()?.start().await?;
//!     Ok(())
//! }
//! ```

mod app;
mod body;
mod date;
mod extension;
mod handler;
mod harness;
mod middleware;
mod request;
mod response;
mod server;

pub mod error;
pub mod router;

pub use app::{Application, ApplicationBuilder};
pub use body::{OptionReqBody, Payload, ResponseBody};
pub use date::{DateHeader, DateService};
pub use error::{BoxError, HttpError, WebError};
pub use extension::{ConnectionHook, Extension};
pub use handler::{FnHandler, RouteHandler, handler_fn};
pub use harness::{HarnessError, TestHarness};
pub use middleware::{FnMiddleware, Middleware, Next, middleware_fn};
pub use request::{PathParams, RequestContext};
pub use response::ResponseContext;
pub use router::Router;
pub use server::{BoundServer, ListenAddress, Server, ServerBuilder, ServerError};
