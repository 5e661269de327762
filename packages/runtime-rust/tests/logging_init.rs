//! Installs the global subscriber, so it runs in its own test process.

use switchyard_runtime::logging::{init_logging, LogFormat};

#[test]
fn second_init_fails() {
    assert!(init_logging(LogFormat::Json).is_ok());
    assert!(init_logging(LogFormat::Text).is_err());
}
