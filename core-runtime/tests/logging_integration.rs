//! Integration tests for logging configuration and redaction helpers

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_wire, LogFormat, LoggingConfig,
};

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(true)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default().with_format(LogFormat::Compact);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_credentials_never_logged_verbatim() {
    assert_eq!(redact_if_sensitive("password", "hunter2"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("session", "Xy12Z"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("queue", "general"), "general");

    let wire = redact_wire("FILE size=1024&ed2k=0123456789abcdef0123456789abcdef&s=Xy12Z");
    assert!(!wire.contains("Xy12Z"));
    assert!(wire.contains("ed2k=0123456789abcdef0123456789abcdef"));
}
