//! Request-rewrite hook.
//!
//! The hook runs immediately before every send, after the request is fully
//! built. It is where authentication, tracing headers and similar
//! cross-cutting concerns belong.

use http::Request;

use crate::transport::TransportBody;
use crate::{BoxError, CallContext};

/// Rewrites an outgoing request.
///
/// Returning an error aborts the call with
/// [`GatewayError::Rewrite`](crate::GatewayError::Rewrite) before any network
/// I/O.
pub trait RequestRewriter: Send + Sync + 'static {
    fn rewrite(
        &self,
        ctx: &CallContext,
        request: Request<TransportBody>,
    ) -> Result<Request<TransportBody>, BoxError>;
}

impl<F> RequestRewriter for F
where
    F: Fn(&CallContext, Request<TransportBody>) -> Result<Request<TransportBody>, BoxError>
        + Send
        + Sync
        + 'static,
{
    fn rewrite(
        &self,
        ctx: &CallContext,
        request: Request<TransportBody>,
    ) -> Result<Request<TransportBody>, BoxError> {
        self(ctx, request)
    }
}
