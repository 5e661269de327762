//! Property tests for frame limits and `grpc-timeout` header encoding.

use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use switchyard_runtime::codec::{decode_frame, encode_frame, encode_timeout, parse_timeout};
use switchyard_runtime::Code;

proptest! {
    #[test]
    fn timeout_header_never_overshoots_the_deadline(micros in 1u64..10_000_000_000_000) {
        let deadline = Duration::from_micros(micros);
        let header = encode_timeout(deadline);
        prop_assert!(header.len() <= 9, "header too long: {header}");

        let parsed = parse_timeout(&header).expect("encoded header should parse");
        prop_assert!(parsed <= deadline);
        prop_assert!(deadline - parsed < Duration::from_secs(1));
    }

    #[test]
    fn parse_timeout_tolerates_arbitrary_input(value in any::<String>()) {
        let _ = parse_timeout(&value);
    }

    #[test]
    fn frame_limit_is_inclusive(payload in proptest::collection::vec(any::<u8>(), 0..2048),
                                slack in 0usize..64) {
        let frame = encode_frame(&payload).expect("payload fits a frame");
        let len = payload.len();

        let decoded = decode_frame(frame.clone(), len + slack).expect("within limit");
        prop_assert_eq!(decoded, Bytes::from(payload));

        if len > 0 {
            let status = decode_frame(frame, len - 1).unwrap_err();
            prop_assert_eq!(status.code(), Code::ResourceExhausted);
        }
    }
}
