//! Gateway client.
//!
//! [`GatewayClient`] holds the read-only configuration shared by every call:
//! base URL, transport, TLS policy, body strategies and the rewrite hook. The
//! unary and streaming executors live in [`crate::unary`] and
//! [`crate::streaming`].

use std::sync::Arc;

use http::{Method, Request, Response, StatusCode};
use hyper::body::Incoming;
use serde::Serialize;

use crate::builder::ClientBuilder;
use crate::config::{Marshaled, Marshaler, RequestRewriter, Unmarshaler};
use crate::request::GatewayRequest;
use crate::transport::{HyperTransport, TransportBody};
use crate::{BoxError, CallContext, GatewayError};

/// REST gateway client.
///
/// Cloning is cheap; clones share the connection pool and configuration, so
/// one client can serve any number of concurrent calls.
///
/// # Example
///
/// ```ignore
/// use gateway_client::{CallContext, GatewayClient};
///
/// let client = GatewayClient::builder("http://localhost:8080").build()?;
///
/// let mut request = client.new_request(http::Method::GET, "/v1/users/{id}");
/// request.set_path_param("id", "42");
/// let user: serde_json::Value = client.unary(&CallContext::new(), request).await?;
/// ```
#[derive(Clone)]
pub struct GatewayClient {
    transport: HyperTransport,
    base_url: Arc<str>,
    marshaler: Arc<dyn Marshaler>,
    unmarshaler: Arc<dyn Unmarshaler>,
    rewriter: Option<Arc<dyn RequestRewriter>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .field("rewriter", &self.rewriter.is_some())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a new [`ClientBuilder`] with the given base URL.
    pub fn builder<S: Into<String>>(base_url: S) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Called by [`ClientBuilder::build`].
    pub(crate) fn new(
        transport: HyperTransport,
        base_url: String,
        marshaler: Arc<dyn Marshaler>,
        unmarshaler: Arc<dyn Unmarshaler>,
        rewriter: Option<Arc<dyn RequestRewriter>>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            marshaler,
            unmarshaler,
            rewriter,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether server certificate verification is skipped.
    pub fn skip_tls_verify(&self) -> bool {
        !self.transport.verifies_certificates()
    }

    /// Start a request for `path` (a binding rule's path pattern).
    pub fn new_request(&self, method: Method, path: &str) -> GatewayRequest {
        GatewayRequest::new(method, self.base_url.as_ref(), path)
    }

    /// Marshal `value` with the configured marshaler.
    ///
    /// `path` is the request path after path-parameter substitution.
    pub fn marshal<T>(
        &self,
        ctx: &CallContext,
        method: &Method,
        path: &str,
        value: &T,
    ) -> Result<Marshaled, GatewayError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|e| GatewayError::Marshal(Box::new(e)))?;
        self.marshaler
            .marshal(ctx, method, path, &value)
            .map_err(GatewayError::Marshal)
    }

    pub(crate) fn unmarshal(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        body: &[u8],
    ) -> Result<serde_json::Value, BoxError> {
        self.unmarshaler.unmarshal(ctx, content_type, status, body)
    }

    /// Build the HTTP request, without sending it.
    pub(crate) fn prepare(
        &self,
        ctx: &CallContext,
        request: GatewayRequest,
    ) -> Result<Request<TransportBody>, GatewayError> {
        let request = request.into_http()?;
        match &self.rewriter {
            Some(rewriter) => rewriter
                .rewrite(ctx, request)
                .map_err(GatewayError::Rewrite),
            None => Ok(request),
        }
    }

    /// Send a prepared request, giving up when `ctx` is canceled.
    pub(crate) async fn send(
        &self,
        ctx: &CallContext,
        request: Request<TransportBody>,
    ) -> Result<Response<Incoming>, GatewayError> {
        if ctx.is_canceled() {
            return Err(GatewayError::Canceled);
        }
        tokio::select! {
            biased;
            _ = ctx.canceled() => Err(GatewayError::Canceled),
            response = self.transport.request(request) => response,
        }
    }
}

/// Read the `Content-Type` header of a response.
pub(crate) fn content_type<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}
