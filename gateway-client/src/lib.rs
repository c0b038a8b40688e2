//! Runtime for generated REST gateway clients.
//!
//! Generated clients (see `gateway-client-build`) turn RPC request messages
//! into HTTP requests following their `google.api.http` binding rules and hand
//! them to a [`GatewayClient`], which executes them:
//!
//! - [`GatewayClient::unary`] for request-response calls
//! - [`GatewayClient::server_stream`] for server-streaming calls delivered as
//!   server-sent events
//!
//! Error responses are translated into [`Status`] values using the HTTP to RPC
//! code table in [`http_status_to_code`].
//!
//! ## Example
//!
//! ```ignore
//! use gateway_client::{CallContext, GatewayClient};
//!
//! let client = GatewayClient::builder("http://localhost:8080")
//!     .skip_tls_verify(false)
//!     .build()?;
//!
//! // Generated per service
//! let users = user_service_gateway_client::UserServiceGatewayClient::new(client);
//! let user = users.get_user(&CallContext::new(), &GetUserRequest { id: 42, ..Default::default() }).await?;
//! ```
//!
//! ## Server Streaming Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut events = client.server_stream::<Tick>(&ctx, request).await?;
//! while let Some(item) = events.next().await {
//!     match item {
//!         Ok(tick) => println!("tick: {tick:?}"),
//!         Err(err) => eprintln!("stream failed: {err}"),
//!     }
//! }
//!
//! // Or as a single stream
//! let mut stream = client.server_stream::<Tick>(&ctx, request).await?.into_stream();
//! while let Some(item) = stream.next().await {
//!     let tick = item?;
//! }
//! ```
//!
//! ## Cancellation
//!
//! Every call takes a [`CallContext`]. Contexts created with
//! [`CallContext::with_cancel`] can be canceled through the returned
//! [`CancelHandle`]:
//!
//! - a unary call stops waiting and returns [`GatewayError::Canceled`]
//! - a stream worker stops before its next event read and publishes
//!   [`GatewayError::Canceled`] on the error channel
//!
//! A failed stream leaves its value channel open: [`EventStream::recv`]
//! returns `None` only after a clean end.
//!
//! Dropping an [`EventStream`] also stops its worker.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tls` (default) | `tls-ring` + `tls-native-roots` | |
//! | `tls-ring` / `tls-aws-lc` | rustls crypto provider | `rustls` |
//! | `tls-native-roots` / `tls-webpki-roots` | Root certificates | `rustls-native-certs` / `webpki-roots` |
//! | `tracing` (default) | Spans for gateway calls | `tracing` |
//!
//! When `tracing` is enabled, each call creates an `rpc.call` span with:
//! - `http.method`, `http.path`: the bound verb and path
//! - `rpc.type`: "unary" or "server_stream"
//! - `otel.kind`: "client"

mod builder;
mod client;
mod config;
mod context;
mod error;
mod request;
mod sse;
mod streaming;
pub mod transport;
mod unary;

// Re-exported for generated code
pub use http;
pub use serde_json;

pub use gateway_client_core::{Code, ErrorDetail, Status, StatusBody, http_status_to_code};

pub use builder::ClientBuilder;
pub use client::GatewayClient;
pub use config::{
    JSON_CONTENT_TYPE, JsonMarshaler, JsonUnmarshaler, Marshaled, Marshaler, RequestRewriter,
    Unmarshaler,
};
pub use context::{CallContext, CancelHandle};
pub use error::{BoxError, ClientBuildError, GatewayError};
pub use request::{GatewayRequest, QueryValues, bytes_param, escape_path_segment};
pub use streaming::{EventStream, EventStreamValues};
pub use transport::{HyperTransport, HyperTransportBuilder, TransportBody};
