//! Server-streaming call execution.
//!
//! A streaming call returns an [`EventStream`]: a value receiver and a
//! one-shot error receiver, both fed by a single worker task that owns the
//! response body. The worker decodes SSE events whose `data` is a JSON object
//! carrying either a `result` or an `error`; objects with neither are
//! keep-alives and are skipped.
//!
//! # Termination
//!
//! - clean end of the body: the value receiver yields `None` and
//!   [`EventStream::recv_error`] yields `None`
//! - any failure: the error is published and the value channel is left
//!   open, so [`EventStream::recv`] never mistakes a failed stream for a
//!   completed one
//! - cancellation through the [`CallContext`]: observed before each event
//!   read and published as [`GatewayError::Canceled`] rather than ending the
//!   stream silently
//! - dropping the [`EventStream`]: the worker stops at its next send

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use gateway_client_core::{Status, StatusBody, http_status_to_code};
use http::header::{ACCEPT, CACHE_CONTROL, CONNECTION};
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyDataStream, BodyExt};
use hyper::body::Incoming;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::client::{GatewayClient, content_type};
use crate::request::GatewayRequest;
use crate::sse::EventDecoder;
use crate::{CallContext, GatewayError};

const RESULT_KEY: &str = "result";
const ERROR_KEY: &str = "error";

/// Terminal error of a stream, sent together with the value sender so that a
/// failure never closes the value channel.
type Failure<T> = (GatewayError, mpsc::Sender<T>);

/// Values and terminal error of a server-streaming call.
///
/// The two queues are independent: [`recv`](Self::recv) yields values and
/// returns `None` only after a clean end, while
/// [`recv_error`](Self::recv_error) yields the error that ended the stream.
/// After a failure `recv` stays pending, so consumers either select over both
/// or use [`next`](Self::next) / [`into_stream`](Self::into_stream).
///
/// A canceled [`CallContext`] ends the stream with
/// [`GatewayError::Canceled`] instead of stopping silently.
#[derive(Debug)]
pub struct EventStream<T> {
    values: mpsc::Receiver<T>,
    error: Option<oneshot::Receiver<Failure<T>>>,
    /// Value sender of a failed stream, held so `values` stays open.
    parked: Option<mpsc::Sender<T>>,
}

enum Next<T> {
    Value(Option<T>),
    Failure(Option<Failure<T>>),
}

impl<T> EventStream<T> {
    fn new(values: mpsc::Receiver<T>, error: oneshot::Receiver<Failure<T>>) -> Self {
        Self {
            values,
            error: Some(error),
            parked: None,
        }
    }

    /// Receive the next value.
    ///
    /// `None` once the stream has ended cleanly. After a failure this never
    /// resolves; see [`recv_error`](Self::recv_error).
    pub async fn recv(&mut self) -> Option<T> {
        self.values.recv().await
    }

    /// Wait for the terminal error. `None` if the stream ended cleanly.
    ///
    /// Only the first call can yield the error.
    pub async fn recv_error(&mut self) -> Option<GatewayError> {
        let rx = self.error.take()?;
        let (err, values) = rx.await.ok()?;
        self.parked = Some(values);
        Some(err)
    }

    /// Receive the next value or the terminal error.
    ///
    /// Values published before a failure are delivered first. `None` after a
    /// clean end or once the error has been returned.
    pub async fn next(&mut self) -> Option<Result<T, GatewayError>> {
        let Some(error) = self.error.as_mut() else {
            if self.parked.is_some() {
                return None;
            }
            return self.values.recv().await.map(Ok);
        };
        let next = tokio::select! {
            biased;
            value = self.values.recv() => Next::Value(value),
            failure = error => Next::Failure(failure.ok()),
        };
        match next {
            Next::Value(Some(value)) => Some(Ok(value)),
            Next::Value(None) | Next::Failure(None) => {
                self.error = None;
                None
            }
            Next::Failure(Some((err, values))) => {
                self.error = None;
                self.parked = Some(values);
                Some(Err(err))
            }
        }
    }

    /// Merge values and the terminal error into one stream.
    pub fn into_stream(self) -> EventStreamValues<T>
    where
        T: Send + 'static,
    {
        let stream = futures::stream::unfold(self, |mut events| async move {
            events.next().await.map(|item| (item, events))
        });
        EventStreamValues {
            inner: Box::pin(stream),
        }
    }
}

/// Stream returned by [`EventStream::into_stream`].
pub struct EventStreamValues<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T, GatewayError>> + Send>>,
}

impl<T> std::fmt::Debug for EventStreamValues<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamValues").finish_non_exhaustive()
    }
}

impl<T> Stream for EventStreamValues<T> {
    type Item = Result<T, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl GatewayClient {
    /// Execute a server-streaming call.
    ///
    /// Returns once response headers arrive. An error status fails the call
    /// here: a JSON body with an `error` object becomes
    /// [`GatewayError::Status`] (code from the HTTP status), any other JSON
    /// object becomes [`GatewayError::Opaque`], and a body that is not a JSON
    /// object becomes [`GatewayError::Unmarshal`].
    pub async fn server_stream<T>(
        &self,
        ctx: &CallContext,
        mut request: GatewayRequest,
    ) -> Result<EventStream<T>, GatewayError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "rpc.call",
            http.method = %request.method(),
            http.path = %request.path(),
            rpc.type = "server_stream",
            otel.kind = "client",
        );

        let call = self.open_stream(ctx, request);

        #[cfg(feature = "tracing")]
        let call = call.instrument(span.clone());

        let (status, content_type, body) = call.await?;

        let (values_tx, values) = mpsc::channel(1);
        let (error_tx, error) = oneshot::channel();
        let worker = StreamWorker {
            client: self.clone(),
            ctx: ctx.clone(),
            status,
            content_type,
            values: values_tx,
            error: error_tx,
        };
        let task = worker.run(EventDecoder::new(BodyDataStream::new(body)));

        #[cfg(feature = "tracing")]
        let task = task.instrument(span);

        tokio::spawn(task);

        Ok(EventStream::new(values, error))
    }

    async fn open_stream(
        &self,
        ctx: &CallContext,
        request: GatewayRequest,
    ) -> Result<(StatusCode, Option<String>, Incoming), GatewayError> {
        let request = self.prepare(ctx, request)?;
        let response = self.send(ctx, request).await?;

        let status = response.status();
        let content_type = content_type(&response).map(str::to_owned);

        if status.as_u16() < 400 {
            return Ok((status, content_type, response.into_body()));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(http.status = status.as_u16(), "gateway returned error status");

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GatewayError::Transport(Box::new(e)))?
            .to_bytes();
        Err(self.stream_error_response(ctx, content_type.as_deref(), status, &body))
    }

    fn stream_error_response(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        body: &[u8],
    ) -> GatewayError {
        let object = match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(object) => object,
            Err(e) => return GatewayError::Unmarshal(Box::new(e)),
        };
        let Some(error) = object.get(ERROR_KEY) else {
            return GatewayError::Opaque {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            };
        };
        match self.decode_status(ctx, content_type, status, error) {
            Ok(envelope) => {
                GatewayError::Status(envelope.into_status_with_code(http_status_to_code(status)))
            }
            Err(err) => err,
        }
    }

    fn decode_status(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        raw: &Value,
    ) -> Result<StatusBody, GatewayError> {
        let value = self.decode_raw(ctx, content_type, status, raw)?;
        serde_json::from_value(value).map_err(|e| GatewayError::Unmarshal(Box::new(e)))
    }

    /// Run an embedded JSON value through the configured unmarshaler.
    fn decode_raw(
        &self,
        ctx: &CallContext,
        content_type: Option<&str>,
        status: StatusCode,
        raw: &Value,
    ) -> Result<Value, GatewayError> {
        let bytes = serde_json::to_vec(raw).map_err(|e| GatewayError::Unmarshal(Box::new(e)))?;
        self.unmarshal(ctx, content_type, status, &bytes)
            .map_err(GatewayError::Unmarshal)
    }
}

/// Owns the response body of one streaming call.
struct StreamWorker<T> {
    client: GatewayClient,
    ctx: CallContext,
    status: StatusCode,
    content_type: Option<String>,
    values: mpsc::Sender<T>,
    error: oneshot::Sender<Failure<T>>,
}

impl<T> StreamWorker<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run<S>(self, events: EventDecoder<S>)
    where
        EventDecoder<S>: Stream<Item = Result<crate::sse::Event, GatewayError>>,
    {
        let mut events = std::pin::pin!(events);
        let Self {
            client,
            ctx,
            status,
            content_type,
            values,
            error,
        } = self;

        let failure = loop {
            if ctx.is_canceled() {
                break GatewayError::Canceled;
            }

            let event = match events.next().await {
                Some(Ok(event)) => event,
                Some(Err(err)) => break err,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("event stream ended");
                    return;
                }
            };

            let mut frame = match serde_json::from_str::<Map<String, Value>>(&event.data) {
                Ok(frame) => frame,
                Err(e) => break GatewayError::Stream(Box::new(e)),
            };

            if let Some(raw) = frame.remove(ERROR_KEY) {
                break match client.decode_status(&ctx, content_type.as_deref(), status, &raw) {
                    Ok(envelope) => GatewayError::Status(Status::from(envelope)),
                    Err(err) => err,
                };
            }

            let Some(raw) = frame.remove(RESULT_KEY) else {
                #[cfg(feature = "tracing")]
                tracing::trace!(event.id = ?event.id, "skipping keep-alive event");
                continue;
            };

            let value = match client
                .decode_raw(&ctx, content_type.as_deref(), status, &raw)
                .and_then(|v| {
                    serde_json::from_value::<T>(v).map_err(|e| GatewayError::Unmarshal(Box::new(e)))
                }) {
                Ok(value) => value,
                Err(err) => break err,
            };

            if values.send(value).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::debug!("event stream receiver dropped");
                return;
            }
        };

        #[cfg(feature = "tracing")]
        tracing::warn!(error = %failure, "event stream failed");

        // The value sender travels with the error and outlives the worker.
        let _ = error.send((failure, values));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::convert::Infallible;
    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    use std::time::Duration;

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    fn client() -> GatewayClient {
        GatewayClient::builder("http://localhost:1").build().unwrap()
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    fn spawn_worker_with<T: DeserializeOwned + Send + 'static>(
        client: GatewayClient,
        ctx: CallContext,
        chunks: Vec<&'static str>,
    ) -> EventStream<T> {
        let (values_tx, values) = mpsc::channel(1);
        let (error_tx, error) = oneshot::channel();
        let worker = StreamWorker {
            client,
            ctx,
            status: StatusCode::OK,
            content_type: Some("text/event-stream".into()),
            values: values_tx,
            error: error_tx,
        };
        let chunks = chunks
            .into_iter()
            .map(|c| Ok::<_, Infallible>(Bytes::from_static(c.as_bytes())));
        tokio::spawn(worker.run(EventDecoder::new(stream::iter(chunks))));
        EventStream::new(values, error)
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    fn spawn_worker<T: DeserializeOwned + Send + 'static>(
        ctx: CallContext,
        chunks: Vec<&'static str>,
    ) -> EventStream<T> {
        spawn_worker_with(client(), ctx, chunks)
    }

    /// Whether `recv` stays pending, i.e. the value channel is still open.
    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    async fn values_open<T>(events: &mut EventStream<T>) -> bool {
        tokio::time::timeout(Duration::from_millis(50), events.recv())
            .await
            .is_err()
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_worker_values_in_order_then_clean_end() {
        let mut events = spawn_worker::<u32>(
            CallContext::new(),
            vec![
                "data: {\"result\":1}\n\n",
                "data: {}\n\n",
                "data: {\"result\":2}\n\n",
            ],
        );
        assert_eq!(events.recv().await, Some(1));
        assert_eq!(events.recv().await, Some(2));
        assert_eq!(events.recv().await, None);
        assert!(events.recv_error().await.is_none());
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_worker_in_stream_error_uses_payload_code() {
        let mut events = spawn_worker::<u32>(
            CallContext::new(),
            vec![
                "data: {\"result\":1}\n\n",
                "data: {\"error\":{\"code\":5,\"message\":\"gone\"}}\n\n",
                "data: {\"result\":2}\n\n",
            ],
        );
        assert_eq!(events.recv().await, Some(1));
        let err = events.recv_error().await.unwrap();
        let status = err.as_status().unwrap();
        assert_eq!(status.code(), gateway_client_core::Code::NotFound);
        assert_eq!(status.message(), "gone");
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_failure_leaves_value_channel_open() {
        let mut clean = spawn_worker::<u32>(CallContext::new(), vec!["data: {\"result\":1}\n\n"]);
        assert_eq!(clean.recv().await, Some(1));
        assert_eq!(clean.recv().await, None);

        let mut failed = spawn_worker::<u32>(
            CallContext::new(),
            vec![
                "data: {\"result\":1}\n\n",
                "data: {\"error\":{\"code\":13}}\n\n",
            ],
        );
        assert_eq!(failed.recv().await, Some(1));
        assert!(values_open(&mut failed).await);
        assert!(failed.recv_error().await.is_some());
        assert!(values_open(&mut failed).await);
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_next_delivers_values_before_error() {
        let mut events = spawn_worker::<u32>(
            CallContext::new(),
            vec![
                "data: {\"result\":1}\n\n",
                "data: {\"result\":2}\n\n",
                "data: {\"error\":{\"code\":10}}\n\n",
            ],
        );
        assert_eq!(events.next().await.unwrap().unwrap(), 1);
        assert_eq!(events.next().await.unwrap().unwrap(), 2);
        let err = events.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), gateway_client_core::Code::Aborted);
        assert!(events.next().await.is_none());
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_in_stream_error_goes_through_unmarshaler() {
        let client = GatewayClient::builder("http://localhost:1")
            .unmarshaler(
                |_: &CallContext, _: Option<&str>, _: StatusCode, body: &[u8]| {
                    let mut value: Value = serde_json::from_slice(body)?;
                    if let Some(object) = value.as_object_mut()
                        && let Some(msg) = object.remove("msg")
                    {
                        object.insert("message".into(), msg);
                    }
                    Ok::<_, crate::BoxError>(value)
                },
            )
            .build()
            .unwrap();
        let mut events = spawn_worker_with::<u32>(
            client,
            CallContext::new(),
            vec!["data: {\"error\":{\"code\":5,\"msg\":\"gone\"}}\n\n"],
        );
        let err = events.recv_error().await.unwrap();
        assert_eq!(err.as_status().unwrap().message(), "gone");
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_worker_bad_json_is_stream_error() {
        let mut events = spawn_worker::<u32>(CallContext::new(), vec!["data: not json\n\n"]);
        assert!(matches!(
            events.next().await,
            Some(Err(GatewayError::Stream(_)))
        ));
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_worker_result_type_mismatch_is_unmarshal_error() {
        let mut events =
            spawn_worker::<u32>(CallContext::new(), vec!["data: {\"result\":\"x\"}\n\n"]);
        assert!(matches!(
            events.next().await,
            Some(Err(GatewayError::Unmarshal(_)))
        ));
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_worker_canceled_before_first_read() {
        let (ctx, handle) = CallContext::with_cancel();
        handle.cancel();
        let mut events = spawn_worker::<u32>(ctx, vec!["data: {\"result\":1}\n\n"]);
        assert!(matches!(
            events.next().await,
            Some(Err(GatewayError::Canceled))
        ));
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[tokio::test]
    async fn test_into_stream_merges_error() {
        let events = spawn_worker::<u32>(
            CallContext::new(),
            vec!["data: {\"result\":7}\n\ndata: {\"error\":{\"code\":14}}\n\n"],
        );
        let items: Vec<_> = events.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(*items[0].as_ref().unwrap(), 7);
        assert_eq!(
            items[1].as_ref().unwrap_err().code(),
            gateway_client_core::Code::Unavailable
        );
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[test]
    fn test_error_response_shapes() {
        let client = client();
        let ctx = CallContext::new();
        let status = StatusCode::NOT_FOUND;

        let err = client.stream_error_response(
            &ctx,
            None,
            status,
            br#"{"error":{"code":3,"message":"missing"}}"#,
        );
        let s = err.as_status().unwrap();
        assert_eq!(s.code(), gateway_client_core::Code::NotFound);
        assert_eq!(s.message(), "missing");

        let err = client.stream_error_response(&ctx, None, status, br#"{"detail":"x"}"#);
        assert!(matches!(err, GatewayError::Opaque { .. }));

        let err = client.stream_error_response(&ctx, None, status, b"<html>");
        assert!(matches!(err, GatewayError::Unmarshal(_)));
    }
}
