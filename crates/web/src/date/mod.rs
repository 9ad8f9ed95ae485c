//! Cached `Date` header values.
//!
//! Formatting an HTTP date on every response is wasteful, so a shared [`DateService`]
//! keeps the current value and a background task refreshes it.

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

mod date_header;

pub use date_header::DateHeader;

/// A service that maintains and periodically updates the current HTTP date string.
///
/// A background task refreshes the cached value every 800ms, so responses don't format the
/// date themselves.
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: tokio::task::JoinHandle<()>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::new_with_update_interval(Duration::from_millis(800)));

impl DateService {
    /// Returns the shared instance, starting its refresh task on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new_with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(now()));
            }
        });

        DateService { current, handle }
    }

    /// The current date as a header value, `None` if the cached value isn't a valid header.
    pub fn http_date(&self) -> Option<HeaderValue> {
        let date = self.current.load().as_ref().clone();
        HeaderValue::from_maybe_shared(date).ok()
    }
}

impl std::fmt::Debug for DateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateService").field("current", &self.current.load_full()).finish_non_exhaustive()
    }
}

fn now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

/// Stops the background refresh task when the service goes away.
impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
