//! Client configuration strategies.
//!
//! - [`Marshaler`] / [`Unmarshaler`]: body encoding, JSON by default
//! - [`RequestRewriter`]: hook applied to every outgoing request

mod codec;
mod rewrite;

pub use codec::{
    JSON_CONTENT_TYPE, JsonMarshaler, JsonUnmarshaler, Marshaled, Marshaler, Unmarshaler,
};
pub use rewrite::RequestRewriter;
