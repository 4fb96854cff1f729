//! Integration tests for the logging system

use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::sync::Arc;

#[test]
fn test_init_logging_only_once() {
    // The global subscriber can be installed once per process.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));

    assert!(init_logging(config.clone()).is_ok());
    tracing::info!(record_id = 1, file = %strip_path("/storage/DCIM/Camera/IMG_1.jpg"), "Synced");

    let second = init_logging(config);
    assert!(second
        .unwrap_err()
        .to_string()
        .contains("Failed to initialize logging"));
}

#[test]
fn test_session_values_are_redacted() {
    assert_eq!(
        redact_if_sensitive("session_cookie", "sid=s3cr3t"),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("Cookie", "sid=s3cr3t"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "r"), "[REDACTED]");
}

#[test]
fn test_upload_fields_pass_through() {
    assert_eq!(redact_if_sensitive("server_path", "/dcim/2023/11/a.jpg"), "/dcim/2023/11/a.jpg");
    assert_eq!(redact_if_sensitive("fraction", "0.5"), "0.5");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/storage/emulated/0/DCIM/Camera/VID_9.mp4"), "VID_9.mp4");
    assert_eq!(strip_path("D:\\Photos\\IMG_4.jpg"), "IMG_4.jpg");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}
