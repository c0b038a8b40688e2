//! TLS connector setup for the hyper HTTP client.
//!
//! # Feature Flags
//!
//! TLS support requires a crypto provider and, unless certificate
//! verification is skipped, root certificates:
//!
//! - **Crypto providers** (choose one):
//!   - `tls-ring` - Use ring crypto (default with `tls` feature)
//!   - `tls-aws-lc` - Use AWS LC crypto
//!
//! - **Root certificates** (choose one):
//!   - `tls-native-roots` - Use system root certificates (default with `tls` feature)
//!   - `tls-webpki-roots` - Use bundled Mozilla root certificates
//!
//! Without a feature-gated provider, a process-wide default installed through
//! `rustls::crypto::CryptoProvider::install_default()` is used.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::ClientBuildError;

/// Resolve the crypto provider.
///
/// Priority:
/// 1. Feature-gated provider (`tls-ring`, then `tls-aws-lc`)
/// 2. User-installed global default provider
fn crypto_provider() -> Option<Arc<CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    return Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    CryptoProvider::get_default().cloned()
}

fn config_builder(
    provider: Arc<CryptoProvider>,
) -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>, ClientBuildError> {
    Ok(ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions()?)
}

/// Build the default verifying TLS configuration from the enabled features.
pub fn default_tls_config() -> Result<ClientConfig, ClientBuildError> {
    let provider = crypto_provider().ok_or(ClientBuildError::NoCryptoProvider)?;
    let roots = build_root_store()?;
    Ok(config_builder(provider)?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// Build the root certificate store from enabled features.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn build_root_store() -> Result<rustls::RootCertStore, ClientBuildError> {
    let mut roots = rustls::RootCertStore::empty();

    // Prefer native roots when both features are enabled.
    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    Ok(roots)
}

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
fn build_root_store() -> Result<rustls::RootCertStore, ClientBuildError> {
    Err(ClientBuildError::NoRootCertificates)
}

/// Build a TLS configuration that skips server certificate verification.
///
/// Handshake signatures are still checked against the provider's supported
/// algorithms; only the certificate chain and host name are not validated.
pub fn insecure_tls_config() -> Result<ClientConfig, ClientBuildError> {
    let provider = crypto_provider().ok_or(ClientBuildError::NoCryptoProvider)?;
    let verifier = Arc::new(SkipServerVerification {
        provider: provider.clone(),
    });
    Ok(config_builder(provider)?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

/// Build an HTTPS connector that also accepts plain `http://` URLs.
pub fn build_https_connector(config: ClientConfig) -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .build()
}

/// Certificate verifier that trusts any server certificate.
#[derive(Debug)]
struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
