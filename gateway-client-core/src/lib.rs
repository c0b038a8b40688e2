//! Core RPC types for REST gateway clients.
//!
//! This crate provides the types shared by the runtime (`gateway-client`)
//! and anything that needs to reason about gateway errors without pulling in
//! the HTTP stack.
//!
//! ## Modules
//!
//! - [`error`]: RPC status codes and the [`Status`] error type
//! - [`status`]: The JSON status envelope and the HTTP status → [`Code`] table

mod error;
mod status;

pub use error::*;
pub use status::*;
