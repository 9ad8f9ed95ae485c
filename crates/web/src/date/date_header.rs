//! Adds an RFC 7231 `Date` header to every response.

use crate::date::DateService;
use crate::error::WebError;
use crate::extension::Extension;
use crate::middleware::{Middleware, Next};
use crate::RequestContext;
use async_trait::async_trait;

/// Extension that sets the `Date` response header from the shared [`DateService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DateHeader;

impl Extension for DateHeader {
    fn name(&self) -> &str {
        "date-header"
    }

    fn middleware(&self) -> Option<Box<dyn Middleware>> {
        Some(Box::new(DateHeader))
    }
}

#[async_trait]
impl Middleware for DateHeader {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), WebError> {
        let result = next.run(ctx).await;
        if let Some(date) = DateService::get_global_instance().http_date() {
            ctx.response_mut().headers_mut().insert(http::header::DATE, date);
        }
        result
    }
}
