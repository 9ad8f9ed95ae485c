//! Route handlers: the terminal step of a matched route.

use crate::RequestContext;
use crate::body::Payload;
use crate::error::WebError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), WebError>;
}

#[async_trait]
impl<H: RouteHandler + ?Sized> RouteHandler for Box<H> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), WebError> {
        (**self).invoke(ctx).await
    }
}

#[async_trait]
impl<H: RouteHandler + ?Sized> RouteHandler for Arc<H> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), WebError> {
        (**self).invoke(ctx).await
    }
}

/// A closure holder which represents an async handler returning a body value
pub struct FnHandler<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Creates a route handler from a closure.
///
/// Whatever the returned future resolves to becomes the response body, unless it converts
/// to [`Payload::Absent`] (as `()` does), in which case the body set through the context stays.
///
/// ```
/// use sprig::handler_fn;
///
/// let hello = handler_fn(|ctx| {
///     Box::pin(async move {
///         let name = ctx.param("name").unwrap_or("world").to_string();
///         Ok::<_, sprig::WebError>(format!("hello {name}"))
///     })
/// });
/// ```
pub fn handler_fn<F, R>(f: F) -> FnHandler<F, R>
where
    F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, Result<R, WebError>> + Send + Sync,
    R: Into<Payload>,
{
    FnHandler { f, _phantom: PhantomData }
}

#[async_trait]
impl<F, R> RouteHandler for FnHandler<F, R>
where
    F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, Result<R, WebError>> + Send + Sync,
    R: Into<Payload>,
{
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), WebError> {
        let payload: Payload = (self.f)(ctx).await?.into();
        if !payload.is_absent() {
            ctx.response_mut().set_body(payload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptionReqBody;
    use http::Request;
    use serde_json::json;

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, OptionReqBody::empty())
    }

    fn assert_is_handler<T: RouteHandler>(_handler: &T) {
        // no op
    }

    #[tokio::test]
    async fn test_return_value_becomes_body() {
        let handler = handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>(json!({"ok": true})) }));
        assert_is_handler(&handler);

        let mut ctx = context();
        handler.invoke(&mut ctx).await.unwrap();
        assert!(matches!(ctx.response().body(), Payload::Value(value) if *value == json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_unit_keeps_context_body() {
        let handler = handler_fn(|ctx| {
            Box::pin(async move {
                ctx.response_mut().text("written");
                Ok::<_, WebError>(())
            })
        });

        let mut ctx = context();
        handler.invoke(&mut ctx).await.unwrap();
        assert!(matches!(ctx.response().body(), Payload::Text(text) if text == "written"));
    }

    #[tokio::test]
    async fn test_none_becomes_null() {
        let handler = handler_fn(|_ctx| Box::pin(async move { Ok::<Option<String>, WebError>(None) }));

        let mut ctx = context();
        handler.invoke(&mut ctx).await.unwrap();
        assert!(matches!(ctx.response().body(), Payload::Null));
    }

    #[tokio::test]
    async fn test_boxed_handler() {
        let handler: Box<dyn RouteHandler> = Box::new(handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>("boxed") })));
        assert_is_handler(&handler);

        let mut ctx = context();
        handler.invoke(&mut ctx).await.unwrap();
        assert!(matches!(ctx.response().body(), Payload::Text(text) if text == "boxed"));
    }
}
