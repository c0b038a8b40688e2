//! Request body type for the HTTP transport.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// A request body for gateway calls.
///
/// Gateway requests are always fully buffered before sending: either there is
/// no body (GET, or a rule without a body selector) or a marshaled payload.
#[derive(Default)]
pub enum TransportBody {
    /// Empty request body.
    #[default]
    Empty,
    /// Full request body with all data available.
    Full { data: Option<Bytes> },
}

impl TransportBody {
    /// Create an empty body.
    pub fn empty() -> Self {
        TransportBody::Empty
    }

    /// Create a body with the given data.
    pub fn full(data: Bytes) -> Self {
        TransportBody::Full { data: Some(data) }
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            TransportBody::Empty => Poll::Ready(None),
            TransportBody::Full { data } => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            TransportBody::Empty => true,
            TransportBody::Full { data } => data.is_none(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            TransportBody::Full { data: Some(d) } => SizeHint::with_exact(d.len() as u64),
            _ => SizeHint::with_exact(0),
        }
    }
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Empty => write!(f, "TransportBody::Empty"),
            TransportBody::Full { data } => f
                .debug_struct("TransportBody::Full")
                .field("data_len", &data.as_ref().map(|d| d.len()))
                .finish(),
        }
    }
}
