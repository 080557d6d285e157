//! Integration test: LayerConfig parsing and defaults.

use vkvl_core::config::LayerConfig;
use vkvl_core::CoreError;

#[test]
fn test_empty_config_uses_defaults() {
    let config = LayerConfig::parse("").expect("empty config parses");
    assert!(config.validation.image_layout);
    assert!(config.validation.queries);
    assert!(config.validation.viewport_inheritance);
    assert!(config.validation.disabled_messages.is_empty());
    assert_eq!(config.report.duplicate_message_limit, 10);
    assert!(config.report.log_filter.is_none());
}

#[test]
fn test_partial_config_overrides() {
    let config = LayerConfig::parse(
        r#"
        [validation]
        queries = false
        disabled_messages = ["VUID-vkCmdDraw-None-07831"]

        [report]
        duplicate_message_limit = 0
        log_filter = "debug"
        "#,
    )
    .expect("config parses");

    assert!(config.validation.image_layout);
    assert!(!config.validation.queries);
    assert!(config.validation.is_disabled("VUID-vkCmdDraw-None-07831"));
    assert!(!config.validation.is_disabled("VUID-vkCmdDraw-None-07832"));
    assert_eq!(config.report.duplicate_message_limit, 0);
    assert_eq!(config.report.log_filter.as_deref(), Some("debug"));
}

#[test]
fn test_blank_disabled_message_rejected() {
    match LayerConfig::parse("[validation]\ndisabled_messages = [\"  \"]\n") {
        Err(CoreError::ConfigError(msg)) => println!("rejected: {}", msg),
        other => panic!("expected ConfigError, got {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_an_error() {
    match LayerConfig::parse("[validation\nqueries = 1") {
        Err(CoreError::Toml(_)) => {}
        other => panic!("expected Toml error, got {:?}", other),
    }
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config = LayerConfig::load_or_default("/nonexistent/vkvl-test/vkvl.toml");
    assert_eq!(config.report.duplicate_message_limit, 10);
}
