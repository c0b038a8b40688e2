//! HTTP transport layer.
//!
//! [`HyperTransport`] sends requests with hyper_util's legacy client over
//! rustls. TLS is feature-gated:
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots`
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates

mod body;
mod connector;
mod hyper;

pub use body::TransportBody;
pub use connector::{build_https_connector, default_tls_config, insecure_tls_config};
pub use hyper::{HyperTransport, HyperTransportBuilder};

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;
