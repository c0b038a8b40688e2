//! Request construction for gateway calls.
//!
//! Generated clients build a [`GatewayRequest`] from a binding rule's verb and
//! path pattern, substitute path parameters, attach query parameters collected
//! in [`QueryValues`], and optionally attach a marshaled body.

use std::collections::BTreeMap;

use base64::Engine;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, Method, Request};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::GatewayError;
use crate::config::Marshaled;
use crate::transport::TransportBody;

/// Bytes escaped inside a single path segment.
///
/// Unreserved characters and the sub-delimiters that are legal in a segment
/// are kept; `/`, `?`, `#`, `;`, `,`, `%` and everything else are escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Percent-escape a value for use as one path segment.
pub fn escape_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Format a `bytes` field as a parameter value (standard base64).
pub fn bytes_param<B: AsRef<[u8]> + ?Sized>(value: &B) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_ref())
}

/// Query parameters, kept sorted by key.
///
/// A key may carry several values; they are encoded in insertion order as
/// repeated `key=value` pairs, never with index suffixes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryValues {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Get all values for `key`.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode as `application/x-www-form-urlencoded`, keys in sorted order.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.values {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

/// An HTTP request under construction.
///
/// The target URL is the client's base URL concatenated verbatim with the
/// path, followed by the encoded query, if any.
#[derive(Debug)]
pub struct GatewayRequest {
    method: Method,
    base_url: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl GatewayRequest {
    /// Create a request for `base_url` + `path`.
    ///
    /// Usually obtained through
    /// [`GatewayClient::new_request`](crate::GatewayClient::new_request).
    pub fn new(method: Method, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path with any substitutions applied so far.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The encoded query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Replace every `{key}` in the path with the escaped `value`.
    pub fn set_path_param(&mut self, key: &str, value: &str) -> &mut Self {
        let placeholder = format!("{{{key}}}");
        self.path = self.path.replace(&placeholder, &escape_path_segment(value));
        self
    }

    /// Set the query string. An empty set clears it.
    pub fn set_query(&mut self, query: &QueryValues) -> &mut Self {
        self.query = (!query.is_empty()).then(|| query.encode());
        self
    }

    /// Insert a header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a marshaled body, setting `Content-Type` when one is given.
    pub fn set_body(&mut self, marshaled: Marshaled) -> Result<&mut Self, GatewayError> {
        if let Some(content_type) = marshaled.content_type.filter(|ct| !ct.is_empty()) {
            let value = HeaderValue::try_from(content_type)
                .map_err(|e| GatewayError::Request(Box::new(e)))?;
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.body = Some(marshaled.body);
        Ok(self)
    }

    /// Full target URL.
    pub fn url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}{}?{}", self.base_url, self.path, query),
            None => format!("{}{}", self.base_url, self.path),
        }
    }

    /// Build the HTTP request.
    pub fn into_http(self) -> Result<Request<TransportBody>, GatewayError> {
        let uri: http::Uri = self
            .url()
            .parse()
            .map_err(|e: http::uri::InvalidUri| GatewayError::Request(Box::new(e)))?;

        let body = match self.body {
            Some(data) => TransportBody::full(data),
            None => TransportBody::empty(),
        };

        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(body)
            .map_err(|e| GatewayError::Request(Box::new(e)))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}
