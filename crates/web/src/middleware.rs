//! The middleware chain.
//!
//! A request travels through an ordered list of [`Middleware`]. Each one receives the
//! request context and a [`Next`] continuation; awaiting `next.run(ctx)` runs the rest of
//! the chain, code after the await runs once everything downstream has completed. A
//! middleware that returns without running `next` short-circuits the chain.
//!
//! [`Next`] is consumed when it runs, so a middleware can't continue the chain twice.

use crate::RequestContext;
use crate::error::WebError;
use crate::handler::RouteHandler;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Box<M> {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError> {
        (**self).handle(ctx, next).await
    }
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    chain: &'a [Box<dyn Middleware>],
    tail: Tail<'a>,
}

/// What runs once the entries of the current scope are exhausted.
enum Tail<'a> {
    /// The top-level chain ended without anyone claiming the request.
    End,
    /// A nested router ran out of entries: continue after the router in the enclosing chain.
    Parent(Box<Next<'a>>),
    /// Route middleware ran out: invoke the route handler. `skip` continues with the
    /// entries after the route.
    Handler { handler: &'a dyn RouteHandler, skip: Box<Next<'a>> },
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Box<dyn Middleware>]) -> Self {
        Self { chain, tail: Tail::End }
    }

    pub(crate) fn scoped(chain: &'a [Box<dyn Middleware>], parent: Next<'a>) -> Self {
        Self { chain, tail: Tail::Parent(Box::new(parent)) }
    }

    pub(crate) fn route(chain: &'a [Box<dyn Middleware>], handler: &'a dyn RouteHandler, skip: Next<'a>) -> Self {
        Self { chain, tail: Tail::Handler { handler, skip: Box::new(skip) } }
    }

    /// Runs the rest of the chain.
    pub fn run<'c>(self, ctx: &'c mut RequestContext) -> BoxFuture<'c, Result<(), WebError>>
    where
        'a: 'c,
    {
        Box::pin(async move {
            if let Some((head, rest)) = self.chain.split_first() {
                let next = Next { chain: rest, tail: self.tail };
                return head.handle(ctx, next).await;
            }

            match self.tail {
                Tail::End => {
                    ctx.mark_unhandled();
                    Ok(())
                }
                Tail::Parent(parent) => parent.run(ctx).await,
                Tail::Handler { handler, .. } => handler.invoke(ctx).await,
            }
        })
    }

    /// Leaves the current scope and continues with the enclosing chain.
    ///
    /// Called from route middleware, the route handler is not invoked and matching resumes
    /// with the routes registered after this one.
    pub fn skip<'c>(self, ctx: &'c mut RequestContext) -> BoxFuture<'c, Result<(), WebError>>
    where
        'a: 'c,
    {
        match self.tail {
            Tail::End => Box::pin(async move {
                ctx.mark_unhandled();
                Ok(())
            }),
            Tail::Parent(parent) => parent.run(ctx),
            Tail::Handler { skip, .. } => skip.run(ctx),
        }
    }

    /// Entries left in the current scope.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = match self.tail {
            Tail::End => "end",
            Tail::Parent(_) => "parent",
            Tail::Handler { .. } => "handler",
        };
        f.debug_struct("Next").field("remaining", &self.chain.len()).field("tail", &tail).finish()
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a middleware from a closure returning a boxed future.
///
/// ```
/// use sprig::middleware_fn;
///
/// let timing = middleware_fn(|ctx, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         next.run(ctx).await?;
///         let elapsed = started.elapsed().as_millis().to_string();
///         ctx.response_mut().set_header("x-response-time", elapsed)?;
///         Ok::<_, sprig::WebError>(())
///     })
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'c> Fn(&'c mut RequestContext, Next<'c>) -> BoxFuture<'c, Result<(), WebError>> + Send + Sync,
{
    FnMiddleware { f }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'c> Fn(&'c mut RequestContext, Next<'c>) -> BoxFuture<'c, Result<(), WebError>> + Send + Sync,
{
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError> {
        (self.f)(ctx, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptionReqBody;
    use crate::handler::handler_fn;
    use http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, OptionReqBody::empty())
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Box<dyn Middleware> {
        let log = Arc::clone(log);
        Box::new(middleware_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name}:before"));
                next.run(ctx).await?;
                log.lock().unwrap().push(format!("{name}:after"));
                Ok::<_, WebError>(())
            })
        }))
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder(&log, "a"), recorder(&log, "b"), recorder(&log, "c")];

        let mut ctx = context();
        Next::new(&chain).run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a:before", "b:before", "c:before", "c:after", "b:after", "a:after"]);
        assert!(ctx.is_unhandled());
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stop: Box<dyn Middleware> = Box::new(middleware_fn(|ctx, _next| {
            Box::pin(async move {
                ctx.response_mut().set_status(StatusCode::FORBIDDEN);
                Ok::<_, WebError>(())
            })
        }));
        let chain = vec![recorder(&log, "a"), stop, recorder(&log, "never")];

        let mut ctx = context();
        Next::new(&chain).run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a:before", "a:after"]);
        assert!(!ctx.is_unhandled());
        assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_error_unwinds_outer_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Box<dyn Middleware> =
            Box::new(middleware_fn(|_ctx, _next| Box::pin(async move { Err::<(), _>(WebError::developer("boom")) })));
        let chain = vec![recorder(&log, "a"), failing];

        let mut ctx = context();
        let result = Next::new(&chain).run(&mut ctx).await;

        assert!(matches!(result, Err(WebError::Developer { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["a:before"]);
    }

    #[tokio::test]
    async fn test_scoped_chain_returns_to_parent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = vec![recorder(&log, "inner")];
        let outer = vec![recorder(&log, "outer")];

        let mut ctx = context();
        let parent = Next::new(&outer);
        Next::scoped(&inner, parent).run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["inner:before", "outer:before", "outer:after", "inner:after"]);
        assert!(ctx.is_unhandled());
    }

    #[tokio::test]
    async fn test_route_scope_ends_in_handler_or_skips() {
        let handler = handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>("handled") }));
        let skipper: Vec<Box<dyn Middleware>> = vec![Box::new(middleware_fn(|ctx, next| next.skip(ctx)))];
        let passthrough: Vec<Box<dyn Middleware>> = vec![Box::new(middleware_fn(|ctx, next| next.run(ctx)))];
        let empty: Vec<Box<dyn Middleware>> = Vec::new();

        let mut ctx = context();
        Next::route(&passthrough, &handler, Next::new(&empty)).run(&mut ctx).await.unwrap();
        assert!(!ctx.is_unhandled());
        assert!(matches!(ctx.response().body(), crate::Payload::Text(text) if text == "handled"));

        let mut ctx = context();
        Next::route(&skipper, &handler, Next::new(&empty)).run(&mut ctx).await.unwrap();
        assert!(ctx.is_unhandled());
        assert!(ctx.response().body().is_absent());
    }
}
