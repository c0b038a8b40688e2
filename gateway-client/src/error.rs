//! Error types for gateway client operations.
//!
//! [`GatewayError`] is returned by every call. Variants are split by where the
//! call failed so that callers can tell "never left the process" apart from
//! "reached the server" and "reached the server but could not understand it".

use gateway_client_core::{Code, Status, http_status_to_code};
use http::StatusCode;

/// Boxed error used to carry underlying causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request could not be constructed (invalid URI, header value, ...).
    /// No network I/O happened.
    #[error("build request: {0}")]
    Request(#[source] BoxError),

    /// The request body could not be marshaled.
    #[error("marshal request: {0}")]
    Marshal(#[source] BoxError),

    /// The request-rewrite hook rejected the request.
    #[error("rewrite request: {0}")]
    Rewrite(#[source] BoxError),

    /// Connection, TLS, or body read failure.
    #[error("transport: {0}")]
    Transport(#[source] BoxError),

    /// The server answered with a status envelope.
    #[error(transparent)]
    Status(#[from] Status),

    /// The server answered with an error status whose body is not a status
    /// envelope. The raw body is kept verbatim.
    #[error("HTTP {status}: {body}")]
    Opaque { status: StatusCode, body: String },

    /// The server answered successfully but the body could not be decoded.
    #[error("unmarshal response: {0}")]
    Unmarshal(#[source] BoxError),

    /// An event stream frame could not be decoded.
    #[error("decode event stream: {0}")]
    Stream(#[source] BoxError),

    /// The call was canceled through its [`CallContext`](crate::CallContext).
    #[error("call canceled")]
    Canceled,
}

impl GatewayError {
    /// Create a status error with a code and message.
    pub fn status<S: Into<String>>(code: Code, message: S) -> Self {
        GatewayError::Status(Status::new(code, message))
    }

    /// Get the RPC code for this error.
    ///
    /// For variants other than `Status`:
    /// - Opaque: translated from the HTTP status
    /// - Transport: `Unavailable`
    /// - Request: `InvalidArgument`
    /// - Marshal/Unmarshal/Stream/Rewrite: `Internal`
    /// - Canceled: `Canceled`
    pub fn code(&self) -> Code {
        match self {
            GatewayError::Status(status) => status.code(),
            GatewayError::Opaque { status, .. } => http_status_to_code(*status),
            GatewayError::Transport(_) => Code::Unavailable,
            GatewayError::Request(_) => Code::InvalidArgument,
            GatewayError::Marshal(_)
            | GatewayError::Rewrite(_)
            | GatewayError::Unmarshal(_)
            | GatewayError::Stream(_) => Code::Internal,
            GatewayError::Canceled => Code::Canceled,
        }
    }

    /// Get the structured status, if the server sent one.
    pub fn as_status(&self) -> Option<&Status> {
        match self {
            GatewayError::Status(status) => Some(status),
            _ => None,
        }
    }

    /// Whether the failure happened after the server produced a response.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Status(_)
                | GatewayError::Opaque { .. }
                | GatewayError::Unmarshal(_)
                | GatewayError::Stream(_)
        )
    }
}

/// Errors returned when building a [`GatewayClient`](crate::GatewayClient)
/// or its transport.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// No rustls crypto provider is available.
    #[error(
        "HTTPS requires a crypto provider: enable `tls-ring` or `tls-aws-lc`, \
         or install one with `CryptoProvider::install_default()`"
    )]
    NoCryptoProvider,

    /// No root certificates are available and no TLS config was supplied.
    #[error(
        "HTTPS requires root certificates: enable `tls-native-roots` or `tls-webpki-roots`, \
         or supply a TLS config"
    )]
    NoRootCertificates,

    /// rustls rejected the configuration.
    #[error("TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}
