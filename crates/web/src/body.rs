//! Request and response body types.
//!
//! - [`OptionReqBody`]: the request body, which can be consumed at most once.
//! - [`Payload`]: what middleware and handlers assign as the response body before it is
//!   materialized.
//! - [`ResponseBody`]: the materialized body handed to the transport.

use crate::error::{BodyError, BoxError};
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::{BoxBody, UnsyncBoxBody};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::Mutex;

type BoxedBody = UnsyncBoxBody<Bytes, BoxError>;

/// The request body stream, readable at most once.
pub struct OptionReqBody {
    inner: Mutex<Option<BoxedBody>>,
}

impl OptionReqBody {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: Mutex::new(Some(body.map_err(Into::into).boxed_unsync())) }
    }

    pub fn empty() -> Self {
        Self::new(http_body_util::Empty::<Bytes>::new())
    }

    /// Returns true when the body has not been taken yet.
    pub async fn can_consume(&self) -> bool {
        let guard = self.inner.lock().await;
        guard.is_some()
    }

    /// Takes the raw body stream; any later read fails with [`BodyError::Consumed`].
    pub async fn take(&self) -> Result<UnsyncBoxBody<Bytes, BoxError>, BodyError> {
        let mut guard = self.inner.lock().await;
        guard.take().ok_or(BodyError::Consumed)
    }

    pub async fn bytes(&self) -> Result<Bytes, BodyError> {
        let body = self.take().await?;
        body.collect().await.map(|c| c.to_bytes()).map_err(BodyError::read)
    }

    pub async fn text(&self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.into()).map_err(|_utf8_error| BodyError::InvalidUtf8)
    }

    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn form<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let bytes = self.bytes().await?;
        Ok(serde_urlencoded::from_bytes(&bytes)?)
    }
}

impl fmt::Debug for OptionReqBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionReqBody").finish_non_exhaustive()
    }
}

/// A response body value as assigned by middleware or handlers.
///
/// `Absent` means "not handled yet" and is distinct from [`Payload::Null`], which renders the
/// JSON literal `null`.
#[derive(Default)]
pub enum Payload {
    #[default]
    Absent,
    Null,
    Bytes(Bytes),
    Stream(BoxBody<Bytes, BoxError>),
    Text(String),
    Value(Value),
    /// A value whose serialization failed when it was assigned.
    Invalid(String),
}

impl Payload {
    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Payload::Stream(body.map_err(Into::into).boxed())
    }

    /// Serializes `value` into a JSON value; a failure is kept and reported when the response
    /// is materialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Payload::from(value),
            Err(e) => Payload::Invalid(e.to_string()),
        }
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Payload::Absent)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Absent => f.write_str("Absent"),
            Payload::Null => f.write_str("Null"),
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Payload::Stream(_) => f.write_str("Stream(..)"),
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Payload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Payload::Invalid(reason) => f.debug_tuple("Invalid").field(reason).finish(),
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Absent
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            value => Payload::Value(value),
        }
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(option: Option<T>) -> Self {
        option.map_or(Payload::Null, Into::into)
    }
}

macro_rules! payload_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::Value(Value::from(value))
                }
            }
        )*
    };
}

payload_from_scalar!(bool, i32, i64, u32, u64, f64);

/// The materialized response body handed to the transport.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(BoxBody<Bytes, BoxError>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Once(Some(bytes)) } }
    }

    pub fn stream(body: BoxBody<Bytes, BoxError>) -> Self {
        Self { inner: Kind::Stream(body) }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("Once").field(bytes).finish(),
            Kind::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let kind = &mut self.get_mut().inner;
        match kind {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) => {
                let pin = Pin::new(box_body);
                pin.poll_frame(cx)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}
