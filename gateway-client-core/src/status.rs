//! Status envelope wire format and HTTP status translation.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{Code, ErrorDetail, Status};

/// JSON body of a gateway error response.
///
/// ```json
/// {"code": 5, "message": "user not found", "details": []}
/// ```
///
/// Every member is optional on the wire; missing members take their zero
/// value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<serde_json::Value>,
}

impl StatusBody {
    /// Convert into a [`Status`] carrying `code` instead of the envelope's own
    /// numeric code.
    pub fn into_status_with_code(self, code: Code) -> Status {
        self.details
            .into_iter()
            .map(ErrorDetail::from_json)
            .fold(Status::new(code, self.message), Status::add_detail)
    }
}

impl From<StatusBody> for Status {
    fn from(body: StatusBody) -> Self {
        let code = Code::from_i32(body.code);
        body.into_status_with_code(code)
    }
}

/// Map an HTTP response status to an RPC [`Code`].
///
/// Only the statuses a gateway emits for specific RPC codes are mapped;
/// everything else is [`Code::Unknown`].
pub fn http_status_to_code(status: StatusCode) -> Code {
    match status.as_u16() {
        400 => Code::InvalidArgument,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::NotFound,
        409 => Code::Aborted,
        429 => Code::ResourceExhausted,
        499 => Code::Canceled,
        500 => Code::Internal,
        501 => Code::Unimplemented,
        503 => Code::Unavailable,
        504 => Code::DeadlineExceeded,
        _ => Code::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_http_status_to_code_table() {
        let table = [
            (400, Code::InvalidArgument),
            (401, Code::Unauthenticated),
            (403, Code::PermissionDenied),
            (404, Code::NotFound),
            (409, Code::Aborted),
            (429, Code::ResourceExhausted),
            (499, Code::Canceled),
            (500, Code::Internal),
            (501, Code::Unimplemented),
            (503, Code::Unavailable),
            (504, Code::DeadlineExceeded),
        ];
        for (http, code) in table {
            assert_eq!(http_status_to_code(status(http)), code, "HTTP {http}");
        }
    }

    #[test]
    fn test_http_status_to_code_unmapped() {
        assert_eq!(http_status_to_code(status(418)), Code::Unknown);
        assert_eq!(http_status_to_code(status(502)), Code::Unknown);
        assert_eq!(http_status_to_code(status(200)), Code::Unknown);
    }

    #[test]
    fn test_status_body_missing_members() {
        let body: StatusBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body, StatusBody::default());
    }

    #[test]
    fn test_status_body_into_status() {
        let body: StatusBody = serde_json::from_str(
            r#"{"code":3,"message":"bad","details":[{"@type":"x.y/z.Detail","field":"name"}]}"#,
        )
        .unwrap();

        let status = Status::from(body.clone());
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "bad");
        assert_eq!(status.details().len(), 1);
        assert_eq!(status.details()[0].type_name(), Some("z.Detail"));

        let overridden = body.into_status_with_code(Code::NotFound);
        assert_eq!(overridden.code(), Code::NotFound);
        assert_eq!(overridden.message(), "bad");
    }
}
