//! Pluggable application extensions.
//!
//! An extension is identified by its name and contributes optional capabilities: a hook
//! that runs for every incoming request before the middleware chain, and a middleware that
//! is appended to the application chain when the extension is installed.

use crate::error::BoxError;
use crate::middleware::Middleware;
use async_trait::async_trait;
use http::request::Parts;

pub trait Extension: Send + Sync {
    /// Unique name; installing a second extension with the same name has no effect.
    fn name(&self) -> &str;

    fn connection_hook(&self) -> Option<&dyn ConnectionHook> {
        None
    }

    fn middleware(&self) -> Option<Box<dyn Middleware>> {
        None
    }
}

/// Runs before the middleware chain for every request.
///
/// Hooks of all installed extensions run concurrently. A failing hook is logged and does not
/// affect the request or the other hooks.
#[async_trait]
pub trait ConnectionHook: Send + Sync {
    async fn on_connection(&self, request: &Parts) -> Result<(), BoxError>;
}
