//! Server-sent events decoding.
//!
//! [`EventDecoder`] turns a body byte stream into dispatched [`Event`]s. Lines
//! may end in `\n`, `\r\n` or `\r`; a chunk boundary may fall anywhere,
//! including between `\r` and `\n`.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures::Stream;
use pin_project_lite::pin_project;

use crate::{BoxError, GatewayError};

/// A dispatched event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Event {
    /// `event:` field, if any.
    pub event: Option<String>,
    /// Joined `data:` lines, without the final newline.
    pub data: String,
    /// Last seen `id:`.
    pub id: Option<String>,
    pub retry: Option<Duration>,
}

/// Fields accumulated since the last dispatch.
#[derive(Debug, Default)]
struct Pending {
    event: Option<String>,
    data: String,
    has_data: bool,
    retry: Option<Duration>,
}

pin_project! {
    /// Stream adapter decoding `text/event-stream` frames.
    pub(crate) struct EventDecoder<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        pending: Pending,
        last_id: Option<String>,
        finished: bool,
    }
}

impl<S> EventDecoder<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            pending: Pending::default(),
            last_id: None,
            finished: false,
        }
    }
}

/// Split the next complete line off `buffer`, without its terminator.
///
/// A trailing lone `\r` is only treated as a terminator at end of input.
fn next_line(buffer: &mut BytesMut, eof: bool) -> Option<Bytes> {
    let pos = buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
    let terminator = if buffer[pos] == b'\r' {
        match buffer.get(pos + 1) {
            Some(b'\n') => 2,
            Some(_) => 1,
            None if eof => 1,
            None => return None,
        }
    } else {
        1
    };
    let line = buffer.split_to(pos).freeze();
    buffer.advance(terminator);
    Some(line)
}

/// Apply one line. Returns an event when the line dispatches one.
///
/// Fails on a line that is not valid UTF-8.
fn process_line(
    line: &[u8],
    pending: &mut Pending,
    last_id: &mut Option<String>,
) -> Result<Option<Event>, std::str::Utf8Error> {
    if line.is_empty() {
        let pending = std::mem::take(pending);
        if !pending.has_data {
            return Ok(None);
        }
        let mut data = pending.data;
        if data.ends_with('\n') {
            data.pop();
        }
        return Ok(Some(Event {
            event: pending.event,
            data,
            id: last_id.clone(),
            retry: pending.retry,
        }));
    }

    if line[0] == b':' {
        return Ok(None);
    }

    let line = std::str::from_utf8(line)?;
    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };

    match field {
        "data" => {
            pending.data.push_str(value);
            pending.data.push('\n');
            pending.has_data = true;
        }
        "event" => pending.event = Some(value.to_owned()),
        "id" if !value.contains('\0') => *last_id = Some(value.to_owned()),
        "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            pending.retry = value.parse().ok().map(Duration::from_millis);
        }
        _ => {}
    }
    Ok(None)
}

impl<S, E> Stream for EventDecoder<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    type Item = Result<Event, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            while let Some(line) = next_line(this.buffer, *this.finished) {
                match process_line(&line, this.pending, this.last_id) {
                    Ok(Some(event)) => return Poll::Ready(Some(Ok(event))),
                    Ok(None) => {}
                    Err(e) => {
                        *this.finished = true;
                        this.buffer.clear();
                        return Poll::Ready(Some(Err(GatewayError::Stream(Box::new(e)))));
                    }
                }
            }

            if *this.finished {
                // An event not terminated by a blank line is never dispatched.
                return Poll::Ready(None);
            }

            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.buffer.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(GatewayError::Transport(e.into()))));
                }
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
