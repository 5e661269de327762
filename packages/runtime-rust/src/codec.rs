//! Length-prefixed message framing and `grpc-timeout` encoding.
//!
//! Every message body is one frame: a compression flag byte, a big-endian
//! `u32` length, then the payload.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::status::Status;

/// Size of the flag + length prefix.
pub const FRAME_HEADER_LEN: usize = 5;

/// Largest value the `grpc-timeout` header can carry in one unit.
const MAX_TIMEOUT_VALUE: u128 = 99_999_999;

/// Wraps `message` in a single uncompressed frame.
///
/// # Errors
///
/// Returns `RESOURCE_EXHAUSTED` when the message is longer than a `u32` length prefix allows.
pub fn encode_frame(message: &[u8]) -> Result<Bytes, Status> {
    let length = u32::try_from(message.len())
        .map_err(|_| Status::resource_exhausted("message exceeds frame length limit"))?;
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + message.len());
    frame.put_u8(0);
    frame.put_u32(length);
    frame.put_slice(message);
    Ok(frame.freeze())
}

/// Extracts the payload of a single frame, enforcing `limit` on its length.
///
/// An empty body decodes to an empty message.
///
/// # Errors
///
/// - `RESOURCE_EXHAUSTED` when the declared length exceeds `limit`
/// - `UNIMPLEMENTED` for compressed frames
/// - `INTERNAL` for truncated frames
pub fn decode_frame(body: Bytes, limit: usize) -> Result<Bytes, Status> {
    if body.is_empty() {
        return Ok(body);
    }
    if body.len() < FRAME_HEADER_LEN {
        return Err(Status::internal("truncated frame header"));
    }
    let mut header = &body[..FRAME_HEADER_LEN];
    let compressed = header.get_u8();
    let declared = usize::try_from(header.get_u32())
        .map_err(|_| Status::internal("frame length does not fit in memory"))?;
    if compressed != 0 {
        return Err(Status::unimplemented("compressed messages are not supported"));
    }
    if declared > limit {
        return Err(Status::resource_exhausted(format!(
            "message of {declared} bytes exceeds the {limit} byte limit"
        )));
    }
    let end = FRAME_HEADER_LEN.saturating_add(declared);
    if body.len() < end {
        return Err(Status::internal("truncated frame payload"));
    }
    Ok(body.slice(FRAME_HEADER_LEN..end))
}

/// Renders a deadline as a `grpc-timeout` header value.
#[must_use]
pub fn encode_timeout(timeout: Duration) -> String {
    let millis = timeout.as_millis();
    if millis == 0 {
        format!("{}u", timeout.as_micros().max(1))
    } else if millis <= MAX_TIMEOUT_VALUE {
        format!("{millis}m")
    } else {
        format!("{}S", u128::from(timeout.as_secs()).min(MAX_TIMEOUT_VALUE))
    }
}

/// Parses a `grpc-timeout` header value. Malformed values yield `None`.
#[must_use]
pub fn parse_timeout(value: &str) -> Option<Duration> {
    let split = value.len().checked_sub(1)?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (digits, unit) = value.split_at(split);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount * 3_600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
