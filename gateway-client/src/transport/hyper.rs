//! Hyper-based HTTP transport.

use std::time::Duration;

use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;

use super::body::TransportBody;
use super::connector::{build_https_connector, default_tls_config, insecure_tls_config};
use crate::{ClientBuildError, GatewayError};

/// Type alias for the hyper client with HTTPS connector.
type HyperClient = Client<HttpsConnector<HttpConnector>, TransportBody>;

/// HTTP transport using hyper_util's legacy client.
///
/// Supports HTTP/1.1 and HTTP/2 (negotiated via ALPN on TLS), plain `http://`
/// URLs, and connection pooling. Cloning is cheap and shares the pool.
///
/// # Example
///
/// ```ignore
/// use gateway_client::transport::HyperTransport;
///
/// let transport = HyperTransport::builder()
///     .pool_max_idle_per_host(8)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    /// Whether server certificates are verified.
    verifies_certificates: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("verifies_certificates", &self.verifies_certificates)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Send an HTTP request and receive the response head.
    ///
    /// The response body is streamed; callers decide whether to buffer it.
    pub async fn request(
        &self,
        request: http::Request<TransportBody>,
    ) -> Result<http::Response<Incoming>, GatewayError> {
        self.client
            .request(request)
            .await
            .map_err(|e| GatewayError::Transport(Box::new(e)))
    }

    /// Whether this transport verifies server certificates.
    pub fn verifies_certificates(&self) -> bool {
        self.verifies_certificates
    }
}

/// Builder for [`HyperTransport`].
///
/// # Example
///
/// ```ignore
/// use gateway_client::transport::HyperTransportBuilder;
/// use std::time::Duration;
///
/// let transport = HyperTransportBuilder::new()
///     .pool_idle_timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub struct HyperTransportBuilder {
    /// Custom TLS configuration.
    tls_config: Option<ClientConfig>,
    /// Force HTTP/2 only (h2c or when HTTP/2 is required).
    http2_only: bool,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    /// HTTP/2 keep-alive interval.
    h2_keep_alive_interval: Option<Duration>,
    /// Skip server certificate verification.
    danger_accept_invalid_certs: bool,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            tls_config: None,
            http2_only: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            h2_keep_alive_interval: None,
            danger_accept_invalid_certs: false,
        }
    }

    /// Set a custom TLS configuration.
    ///
    /// Ignored when certificate verification is skipped.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Speak HTTP/2 without the HTTP/1.1 upgrade handshake.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Send HTTP/2 PING frames at this interval.
    pub fn h2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.h2_keep_alive_interval = Some(interval);
        self
    }

    /// Accept any server certificate.
    ///
    /// # Warning
    ///
    /// The connection is open to man-in-the-middle attacks. Only use this
    /// against trusted internal gateways.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, ClientBuildError> {
        let tls_config = match (self.danger_accept_invalid_certs, self.tls_config) {
            (true, _) => insecure_tls_config()?,
            (false, Some(config)) => config,
            (false, None) => default_tls_config()?,
        };

        let mut builder = Client::builder(TokioExecutor::new());

        // The pool timer is required for pool_idle_timeout to take effect.
        builder.pool_timer(TokioTimer::new());
        builder.pool_idle_timeout(self.pool_idle_timeout);
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        if self.http2_only {
            builder.http2_only(true);
        }
        if let Some(interval) = self.h2_keep_alive_interval {
            builder.timer(TokioTimer::new());
            builder.http2_keep_alive_interval(interval);
        }

        Ok(HyperTransport {
            client: builder.build(build_https_connector(tls_config)),
            verifies_certificates: !self.danger_accept_invalid_certs,
        })
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("tls_config", &self.tls_config.is_some())
            .field("http2_only", &self.http2_only)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("h2_keep_alive_interval", &self.h2_keep_alive_interval)
            .field("danger_accept_invalid_certs", &self.danger_accept_invalid_certs)
            .finish()
    }
}
