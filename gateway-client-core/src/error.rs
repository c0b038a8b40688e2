//! RPC status codes and error types.
//!
//! This module provides the core error types used at the HTTP/RPC boundary:
//! - [`Code`]: Canonical RPC status codes
//! - [`ErrorDetail`]: Self-describing error details carried in a status body
//! - [`Status`]: The structured `(code, message, details)` error triple

use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Canonical RPC status codes.
///
/// The numeric values are the ones carried in the `code` field of a status
/// envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Get the string representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// Map a numeric wire code to a [`Code`].
    ///
    /// Values outside the canonical range map to [`Code::Unknown`].
    pub fn from_i32(value: i32) -> Code {
        match value {
            0 => Code::Ok,
            1 => Code::Canceled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        code as i32
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown status code name: {0:?}")]
pub struct ParseCodeError(String);

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Code::Ok),
            "canceled" | "cancelled" => Ok(Code::Canceled),
            "unknown" => Ok(Code::Unknown),
            "invalid_argument" => Ok(Code::InvalidArgument),
            "deadline_exceeded" => Ok(Code::DeadlineExceeded),
            "not_found" => Ok(Code::NotFound),
            "already_exists" => Ok(Code::AlreadyExists),
            "permission_denied" => Ok(Code::PermissionDenied),
            "resource_exhausted" => Ok(Code::ResourceExhausted),
            "failed_precondition" => Ok(Code::FailedPrecondition),
            "aborted" => Ok(Code::Aborted),
            "out_of_range" => Ok(Code::OutOfRange),
            "unimplemented" => Ok(Code::Unimplemented),
            "internal" => Ok(Code::Internal),
            "unavailable" => Ok(Code::Unavailable),
            "data_loss" => Ok(Code::DataLoss),
            "unauthenticated" => Ok(Code::Unauthenticated),
            other => Err(ParseCodeError(other.to_string())),
        }
    }
}

/// A self-describing error detail.
///
/// Gateways render `google.protobuf.Any` details as JSON objects whose
/// `@type` member names the packed message and whose remaining members are
/// the message's JSON fields:
///
/// ```json
/// {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "1s"}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorDetail {
    /// Type URL from the `@type` member, if present.
    type_url: Option<String>,
    /// The detail exactly as received.
    value: serde_json::Value,
}

impl ErrorDetail {
    /// Wrap a JSON detail, extracting its `@type` member.
    pub fn from_json(value: serde_json::Value) -> Self {
        let type_url = value
            .get("@type")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        Self { type_url, value }
    }

    /// Get the type URL, if the detail carried one.
    pub fn type_url(&self) -> Option<&str> {
        self.type_url.as_deref()
    }

    /// Get the type name with any `type.googleapis.com/` style prefix removed.
    pub fn type_name(&self) -> Option<&str> {
        self.type_url
            .as_deref()
            .map(|url| url.rsplit_once('/').map_or(url, |(_, name)| name))
    }

    /// Get the raw JSON value.
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl Serialize for ErrorDetail {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value.serialize(serializer)
    }
}

/// RPC status: the canonical error triple at the HTTP/RPC boundary.
///
/// # Example
///
/// ```
/// use gateway_client_core::{Code, Status};
///
/// let status = Status::new(Code::NotFound, "user not found");
/// assert_eq!(status.code(), Code::NotFound);
/// assert_eq!(status.message(), "user not found");
/// assert_eq!(status.to_string(), "not_found: user not found");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    code: Code,
    message: String,
    details: Vec<ErrorDetail>,
}

impl Status {
    /// Create a new status with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            details: vec![],
        }
    }

    /// Create a new status with just a code.
    pub fn from_code(code: Code) -> Self {
        Self::new(code, String::new())
    }

    /// Get the status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Get the status message. Empty when the server sent none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error details.
    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    /// Attach an error detail.
    pub fn add_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// Replace the code, keeping message and details.
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = code;
        self
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_from_i32_roundtrips_canonical_range() {
        for value in 0..=16 {
            assert_eq!(i32::from(Code::from_i32(value)), value);
        }
    }

    #[test]
    fn test_code_from_i32_out_of_range_is_unknown() {
        assert_eq!(Code::from_i32(-1), Code::Unknown);
        assert_eq!(Code::from_i32(17), Code::Unknown);
    }

    #[test]
    fn test_code_from_str_accepts_both_spellings() {
        assert_eq!("canceled".parse::<Code>(), Ok(Code::Canceled));
        assert_eq!("cancelled".parse::<Code>(), Ok(Code::Canceled));
        assert!("bogus".parse::<Code>().is_err());
    }

    #[test]
    fn test_error_detail_type_name() {
        let detail = ErrorDetail::from_json(json!({
            "@type": "type.googleapis.com/google.rpc.RetryInfo",
            "retryDelay": "1s"
        }));
        assert_eq!(
            detail.type_url(),
            Some("type.googleapis.com/google.rpc.RetryInfo")
        );
        assert_eq!(detail.type_name(), Some("google.rpc.RetryInfo"));
        assert_eq!(detail.value()["retryDelay"], "1s");

        let untyped = ErrorDetail::from_json(json!({"reason": "x"}));
        assert_eq!(untyped.type_url(), None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::from_code(Code::Internal).to_string(), "internal");
        assert_eq!(
            Status::new(Code::InvalidArgument, "bad").to_string(),
            "invalid_argument: bad"
        );
    }
}
