//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`GatewayClient`].

use std::sync::Arc;

use crate::client::GatewayClient;
use crate::config::{JsonMarshaler, JsonUnmarshaler, Marshaler, RequestRewriter, Unmarshaler};
use crate::transport::HyperTransportBuilder;
use crate::ClientBuildError;

/// Builder for creating a [`GatewayClient`].
///
/// Defaults:
/// - JSON marshaler and unmarshaler
/// - a [`HyperTransportBuilder`] with default pool settings
/// - TLS certificate verification **skipped** (`skip_tls_verify(true)`)
/// - no request-rewrite hook
///
/// The verification default suits internal gateways; production
/// configurations talking to public endpoints should call
/// `skip_tls_verify(false)` explicitly.
///
/// # Example
///
/// ```ignore
/// use gateway_client::GatewayClient;
///
/// let client = GatewayClient::builder("https://gateway.internal:8443")
///     .skip_tls_verify(false)
///     .rewrite_request(|_ctx: &CallContext, mut req: http::Request<TransportBody>| {
///         req.headers_mut().insert("authorization", "Bearer token".parse()?);
///         Ok(req)
///     })
///     .build()?;
/// ```
pub struct ClientBuilder {
    /// Base URL, concatenated verbatim with every request path.
    base_url: String,
    /// Transport configuration; the TLS policy below is applied on top.
    transport: Option<HyperTransportBuilder>,
    marshaler: Option<Arc<dyn Marshaler>>,
    unmarshaler: Option<Arc<dyn Unmarshaler>>,
    /// Skip server certificate verification.
    skip_tls_verify: bool,
    rewriter: Option<Arc<dyn RequestRewriter>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .field("custom_marshaler", &self.marshaler.is_some())
            .field("custom_unmarshaler", &self.unmarshaler.is_some())
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("rewriter", &self.rewriter.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder with the given base URL.
    ///
    /// The base URL is not normalized: `"http://host/api"` with a path of
    /// `"/v1/items"` targets `http://host/api/v1/items`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            marshaler: None,
            unmarshaler: None,
            skip_tls_verify: true,
            rewriter: None,
        }
    }

    /// Configure the HTTP transport.
    pub fn transport(mut self, transport: HyperTransportBuilder) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the request body marshaler.
    pub fn marshaler<M: Marshaler>(mut self, marshaler: M) -> Self {
        self.marshaler = Some(Arc::new(marshaler));
        self
    }

    /// Replace the response body unmarshaler.
    pub fn unmarshaler<U: Unmarshaler>(mut self, unmarshaler: U) -> Self {
        self.unmarshaler = Some(Arc::new(unmarshaler));
        self
    }

    /// Skip (default) or enforce server certificate verification.
    pub fn skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    /// Install a hook applied to every request right before it is sent.
    pub fn rewrite_request<R: RequestRewriter>(mut self, rewriter: R) -> Self {
        self.rewriter = Some(Arc::new(rewriter));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GatewayClient, ClientBuildError> {
        let transport = self
            .transport
            .unwrap_or_default()
            .danger_accept_invalid_certs(self.skip_tls_verify)
            .build()?;

        Ok(GatewayClient::new(
            transport,
            self.base_url,
            self.marshaler.unwrap_or_else(|| Arc::new(JsonMarshaler)),
            self.unmarshaler.unwrap_or_else(|| Arc::new(JsonUnmarshaler)),
            self.rewriter,
        ))
    }
}
