//! Unary call execution.

use std::any::Any;

use bytes::Bytes;
use gateway_client_core::{StatusBody, http_status_to_code};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::client::{GatewayClient, content_type};
use crate::request::GatewayRequest;
use crate::{CallContext, GatewayError};

impl GatewayClient {
    /// Execute a unary call and decode the response into `T`.
    ///
    /// - a response status of 400 or above yields [`GatewayError::Status`]
    ///   when the body unmarshals into a status envelope (the code comes from
    ///   the HTTP status), otherwise [`GatewayError::Opaque`] with the raw body
    /// - when `T` is [`Bytes`] or `Vec<u8>`, the raw success body is returned
    ///   without going through the unmarshaler
    pub async fn unary<T>(&self, ctx: &CallContext, request: GatewayRequest) -> Result<T, GatewayError>
    where
        T: DeserializeOwned + 'static,
    {
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "rpc.call",
            http.method = %request.method(),
            http.path = %request.path(),
            rpc.type = "unary",
            otel.kind = "client",
        );

        let call = self.unary_inner(ctx, request);

        #[cfg(feature = "tracing")]
        let call = call.instrument(span);

        call.await
    }

    async fn unary_inner<T>(&self, ctx: &CallContext, request: GatewayRequest) -> Result<T, GatewayError>
    where
        T: DeserializeOwned + 'static,
    {
        let request = self.prepare(ctx, request)?;
        let response = self.send(ctx, request).await?;

        let status = response.status();
        let content_type = content_type(&response).map(str::to_owned);
        let body = collect(ctx, response.into_body()).await?;

        if status.as_u16() >= 400 {
            #[cfg(feature = "tracing")]
            tracing::debug!(http.status = status.as_u16(), "gateway returned error status");

            let envelope = self
                .unmarshal(ctx, content_type.as_deref(), status, &body)
                .ok()
                .and_then(|value| serde_json::from_value::<StatusBody>(value).ok());
            return Err(match envelope {
                Some(envelope) => {
                    GatewayError::Status(envelope.into_status_with_code(http_status_to_code(status)))
                }
                None => GatewayError::Opaque {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                },
            });
        }

        if let Some(raw) = raw_body::<T>(&body) {
            return Ok(raw);
        }

        let value = self
            .unmarshal(ctx, content_type.as_deref(), status, &body)
            .map_err(GatewayError::Unmarshal)?;
        serde_json::from_value(value).map_err(|e| GatewayError::Unmarshal(Box::new(e)))
    }
}

/// Read the whole response body, giving up when `ctx` is canceled.
async fn collect(ctx: &CallContext, body: Incoming) -> Result<Bytes, GatewayError> {
    tokio::select! {
        biased;
        _ = ctx.canceled() => Err(GatewayError::Canceled),
        collected = body.collect() => collected
            .map(|c| c.to_bytes())
            .map_err(|e| GatewayError::Transport(Box::new(e))),
    }
}

/// Hand back the body as-is when the caller asked for raw bytes.
fn raw_body<T: 'static>(body: &Bytes) -> Option<T> {
    let mut slot: Option<T> = None;
    let any = &mut slot as &mut dyn Any;
    if let Some(slot) = any.downcast_mut::<Option<Bytes>>() {
        *slot = Some(body.clone());
    } else if let Some(slot) = any.downcast_mut::<Option<Vec<u8>>>() {
        *slot = Some(body.to_vec());
    }
    slot
}
