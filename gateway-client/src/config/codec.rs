//! Pluggable body marshal and unmarshal strategies.
//!
//! Both strategies exchange [`serde_json::Value`] with the client so that
//! they stay object safe; the client handles the typed conversion on either
//! side.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;

use crate::{BoxError, CallContext};

/// Content type produced by [`JsonMarshaler`].
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A marshaled request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Marshaled {
    /// Encoded payload.
    pub body: Bytes,
    /// Content type for the payload. `None` or empty leaves the header unset.
    pub content_type: Option<String>,
}

/// Encodes a request body.
///
/// `method` and `path` describe the request being built; `path` already has
/// its path parameters substituted.
pub trait Marshaler: Send + Sync + 'static {
    fn marshal(
        &self,
        ctx: &CallContext,
        method: &Method,
        path: &str,
        value: &Value,
    ) -> Result<Marshaled, BoxError>;
}

impl<F> Marshaler for F
where
    F: Fn(&CallContext, &Method, &str, &Value) -> Result<Marshaled, BoxError>
        + Send
        + Sync
        + 'static,
{
    fn marshal(
        &self,
        ctx: &CallContext,
        method: &Method,
        path: &str,
        value: &Value,
    ) -> Result<Marshaled, BoxError> {
        self(ctx, method, path, value)
    }
}

/// Decodes a response body.
///
/// Called for successful bodies, error envelopes, and the `result` and
/// `error` payloads of stream frames. `content_type` is the response's
/// `Content-Type` header, and `status` the response status.
pub trait Unmarshaler: Send + Sync + 'static {
    fn unmarshal(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        body: &[u8],
    ) -> Result<Value, BoxError>;
}

impl<F> Unmarshaler for F
where
    F: Fn(&CallContext, Option<&str>, StatusCode, &[u8]) -> Result<Value, BoxError>
        + Send
        + Sync
        + 'static,
{
    fn unmarshal(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        body: &[u8],
    ) -> Result<Value, BoxError> {
        self(ctx, content_type, status, body)
    }
}

/// Default marshaler: JSON via `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMarshaler;

impl Marshaler for JsonMarshaler {
    fn marshal(
        &self,
        _ctx: &CallContext,
        _method: &Method,
        _path: &str,
        value: &Value,
    ) -> Result<Marshaled, BoxError> {
        Ok(Marshaled {
            body: Bytes::from(serde_json::to_vec(value)?),
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
        })
    }
}

/// Default unmarshaler: JSON via `serde_json`, ignoring the content type.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonUnmarshaler;

impl Unmarshaler for JsonUnmarshaler {
    fn unmarshal(
        &self,
        _ctx: &CallContext,
        _content_type: Option<&str>,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<Value, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}
