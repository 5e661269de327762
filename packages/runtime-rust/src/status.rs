//! RPC status codes and the `grpc-status` / `grpc-message` header pair.

use std::fmt;

use http::{HeaderMap, HeaderValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Response header carrying the numeric status code.
pub const GRPC_STATUS: &str = "grpc-status";
/// Response header carrying the human-readable status message.
pub const GRPC_MESSAGE: &str = "grpc-message";
/// Request header carrying the caller's deadline.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";
/// Content type of framed RPC bodies.
pub const CONTENT_TYPE_GRPC: &str = "application/grpc";

/// Bytes escaped in `grpc-message`: controls, `%`, and everything outside ASCII.
const MESSAGE_ESCAPES: &AsciiSet = &CONTROLS.add(b'%');

/// Canonical RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

const CODES: [Code; 17] = [
    Code::Ok,
    Code::Cancelled,
    Code::Unknown,
    Code::InvalidArgument,
    Code::DeadlineExceeded,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unimplemented,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
    Code::Unauthenticated,
];

impl Code {
    /// Maps a wire value to a code. Values outside the canonical range become `Unknown`.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|index| CODES.get(index).copied())
            .unwrap_or(Self::Unknown)
    }

    /// The wire value of this code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        CODES
            .iter()
            .position(|code| *code == self)
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(2)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed call: a code plus a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    #[must_use]
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    #[must_use]
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    #[must_use]
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    #[must_use]
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    #[must_use]
    pub fn code(&self) -> Code {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reads the status from response headers.
    ///
    /// Returns `Ok(())` when the headers carry `grpc-status: 0` or no status
    /// at all (an HTTP-level success with no RPC status is treated as OK).
    ///
    /// # Errors
    ///
    /// Returns the decoded status for any non-zero code.
    pub fn check_headers(headers: &HeaderMap) -> Result<(), Status> {
        let Some(raw) = headers.get(GRPC_STATUS) else {
            return Ok(());
        };
        let code = raw
            .to_str()
            .ok()
            .and_then(|text| text.trim().parse::<i32>().ok())
            .map_or(Code::Unknown, Code::from_i32);
        if code == Code::Ok {
            return Ok(());
        }
        let message = headers
            .get(GRPC_MESSAGE)
            .and_then(|value| value.to_str().ok())
            .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
            .unwrap_or_default();
        Err(Status::new(code, message))
    }

    /// Writes `grpc-status` and `grpc-message` into `headers`.
    ///
    /// The message is percent-encoded so any UTF-8 text survives as a header value.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(GRPC_STATUS, HeaderValue::from(self.code.as_i32()));
        if self.message.is_empty() {
            return;
        }
        let encoded = utf8_percent_encode(&self.message, MESSAGE_ESCAPES).to_string();
        if let Ok(message) = HeaderValue::from_str(&encoded) {
            headers.insert(GRPC_MESSAGE, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_follow_canonical_order() {
        assert_eq!(Code::Ok.as_i32(), 0);
        assert_eq!(Code::DeadlineExceeded.as_i32(), 4);
        assert_eq!(Code::ResourceExhausted.as_i32(), 8);
        assert_eq!(Code::Unimplemented.as_i32(), 12);
        assert_eq!(Code::Unavailable.as_i32(), 14);
        assert_eq!(Code::Unauthenticated.as_i32(), 16);
    }

    #[test]
    fn out_of_range_values_are_unknown() {
        assert_eq!(Code::from_i32(-1), Code::Unknown);
        assert_eq!(Code::from_i32(17), Code::Unknown);
        assert_eq!(Code::from_i32(14), Code::Unavailable);
    }

    #[test]
    fn headers_carry_code_and_message() {
        let mut headers = HeaderMap::new();
        Status::unavailable("draining").write_headers(&mut headers);
        assert_eq!(headers[GRPC_STATUS], "14");

        let status = Status::check_headers(&headers).unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "draining");
    }

    #[test]
    fn messages_outside_visible_ascii_are_percent_encoded() {
        let mut headers = HeaderMap::new();
        Status::unavailable("drain\nfailed: 100% über").write_headers(&mut headers);
        assert_eq!(headers[GRPC_MESSAGE], "drain%0Afailed: 100%25 %C3%BCber");

        let status = Status::check_headers(&headers).unwrap_err();
        assert_eq!(status.message(), "drain\nfailed: 100% über");
    }

    #[test]
    fn missing_or_zero_status_is_ok() {
        let mut headers = HeaderMap::new();
        assert!(Status::check_headers(&headers).is_ok());
        headers.insert(GRPC_STATUS, HeaderValue::from_static("0"));
        assert!(Status::check_headers(&headers).is_ok());
    }

    #[test]
    fn display_uses_canonical_names() {
        let status = Status::resource_exhausted("too big");
        assert_eq!(status.to_string(), "RESOURCE_EXHAUSTED: too big");
    }
}
