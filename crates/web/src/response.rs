//! The mutable response under construction.
//!
//! Middleware and handlers write status, headers and body into a [`ResponseContext`].
//! Once the chain has completed, [`ResponseContext::into_response`] turns it into the
//! transport response, picking the body representation and default headers from the
//! kind of [`Payload`] that was set.

use crate::body::{Payload, ResponseBody};
use crate::error::{BoxError, WebError};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug)]
pub struct ResponseContext {
    status: StatusCode,
    headers: HeaderMap,
    body: Payload,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseContext {
    /// A fresh response: `200 OK`, no headers, no body.
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: Payload::Absent }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing every existing value of that name.
    pub fn set_header<K, V>(&mut self, key: K, value: V) -> Result<&mut Self, WebError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let key = header_name(key)?;
        let value = header_value(value)?;
        self.headers.insert(key, value);
        Ok(self)
    }

    /// Replaces a header with a list of values. An empty list changes nothing.
    pub fn set_header_values<K, I, V>(&mut self, key: K, values: I) -> Result<&mut Self, WebError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        I: IntoIterator<Item = V>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let key = header_name(key)?;
        let values = header_values(values)?;
        let mut values = values.into_iter();
        if let Some(first) = values.next() {
            self.headers.insert(key.clone(), first);
            for value in values {
                self.headers.append(key.clone(), value);
            }
        }
        Ok(self)
    }

    /// Adds a value to a header, keeping the existing ones.
    pub fn append_header<K, V>(&mut self, key: K, value: V) -> Result<&mut Self, WebError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let key = header_name(key)?;
        let value = header_value(value)?;
        self.headers.append(key, value);
        Ok(self)
    }

    pub fn append_header_values<K, I, V>(&mut self, key: K, values: I) -> Result<&mut Self, WebError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        I: IntoIterator<Item = V>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let key = header_name(key)?;
        for value in header_values(values)? {
            self.headers.append(key.clone(), value);
        }
        Ok(self)
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }

    pub fn set_body<P: Into<Payload>>(&mut self, body: P) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn take_body(&mut self) -> Payload {
        std::mem::take(&mut self.body)
    }

    pub fn html<S: Into<String>>(&mut self, html: S) -> &mut Self {
        self.default_content_type(&mime::TEXT_HTML);
        self.set_body(html.into())
    }

    pub fn text<S: Into<String>>(&mut self, text: S) -> &mut Self {
        self.default_content_type(&mime::TEXT_PLAIN);
        self.set_body(text.into())
    }

    pub fn binary<B: Into<Bytes>>(&mut self, bytes: B) -> &mut Self {
        self.default_content_type(&mime::APPLICATION_OCTET_STREAM);
        self.set_body(bytes.into())
    }

    /// Serializes `value` right away and stores it as JSON text.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, WebError> {
        let text = serde_json::to_string(value)?;
        self.default_content_type(&mime::APPLICATION_JSON);
        Ok(self.set_body(text))
    }

    pub fn form<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, WebError> {
        let text = serde_urlencoded::to_string(value)?;
        self.default_content_type(&mime::APPLICATION_WWW_FORM_URLENCODED);
        Ok(self.set_body(text))
    }

    pub fn stream<B>(&mut self, body: B) -> &mut Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        self.default_content_type(&mime::APPLICATION_OCTET_STREAM);
        self.set_body(Payload::stream(body))
    }

    /// Copies status, headers and body from a ready-made response.
    pub fn replace_with<B>(&mut self, response: Response<B>) -> &mut Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        self.status = parts.status;
        self.headers = parts.headers;
        self.body = if body.is_end_stream() { Payload::Absent } else { Payload::Stream(body.map_err(Into::into).boxed()) };
        self
    }

    fn default_content_type(&mut self, mime: &mime::Mime) {
        if !self.headers.contains_key(CONTENT_TYPE)
            && let Ok(value) = HeaderValue::from_str(mime.as_ref())
        {
            self.headers.insert(CONTENT_TYPE, value);
        }
    }

    /// Turns the accumulated state into the transport response.
    ///
    /// | body               | representation | headers                                             |
    /// |--------------------|----------------|-----------------------------------------------------|
    /// | bytes              | as-is          | octet-stream if no type, length if none             |
    /// | stream             | streamed       | octet-stream if no type                             |
    /// | null               | `null`         | `application/json` if no type, length 4             |
    /// | text               | utf-8          | length if none                                      |
    /// | value, type set    | coerced text   | length if none                                      |
    /// | value, no type     | JSON           | `application/json`, length always overwritten       |
    /// | absent             | empty          | unchanged                                           |
    pub fn into_response(self) -> Result<Response<ResponseBody>, WebError> {
        let ResponseContext { status, mut headers, body } = self;

        let body = match body {
            Payload::Absent => ResponseBody::empty(),
            Payload::Bytes(bytes) => {
                default_header(&mut headers, CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                default_header(&mut headers, CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                ResponseBody::once(bytes)
            }
            Payload::Stream(stream) => {
                default_header(&mut headers, CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                ResponseBody::stream(stream)
            }
            Payload::Null => {
                default_header(&mut headers, CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("4"));
                ResponseBody::from("null")
            }
            Payload::Text(text) => {
                let bytes = Bytes::from(text);
                default_header(&mut headers, CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                ResponseBody::once(bytes)
            }
            Payload::Value(value) if headers.contains_key(CONTENT_TYPE) => {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                let bytes = Bytes::from(text);
                default_header(&mut headers, CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                ResponseBody::once(bytes)
            }
            Payload::Value(value) => {
                let bytes = Bytes::from(serde_json::to_vec(&value)?);
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                ResponseBody::once(bytes)
            }
            Payload::Invalid(reason) => {
                return Err(WebError::developer(format!("response body can't be converted: {reason}")));
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn default_header(headers: &mut HeaderMap, key: HeaderName, value: HeaderValue) {
    if !headers.contains_key(&key) {
        headers.insert(key, value);
    }
}

fn header_name<K>(key: K) -> Result<HeaderName, WebError>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
{
    HeaderName::try_from(key).map_err(|e| WebError::from(e.into()))
}

fn header_value<V>(value: V) -> Result<HeaderValue, WebError>
where
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    HeaderValue::try_from(value).map_err(|e| WebError::from(e.into()))
}

/// Converts every value before touching the map, so a bad value leaves the headers untouched.
fn header_values<I, V>(values: I) -> Result<Vec<HeaderValue>, WebError>
where
    I: IntoIterator<Item = V>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    values.into_iter().map(header_value).collect()
}
