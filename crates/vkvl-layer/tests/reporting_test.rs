//! Integration test: report filtering, duplicate limits and the default sinks.

mod common;

use std::sync::Arc;

use ash::vk::{self, Handle};

use common::Fixture;
use vkvl_core::config::{LayerConfig, CONFIG_ENV};
use vkvl_core::TypedHandle;
use vkvl_layer::{DeviceFeatures, DeviceState, Location, LogSink, Validator};

const END_NOT_RECORDING: &str = "VUID-vkEndCommandBuffer-commandBuffer-00059";

#[test]
fn test_duplicate_limit_suppresses_but_still_skips() {
    let mut config = LayerConfig::default();
    config.report.duplicate_message_limit = 1;
    let fx = Fixture::with_config(DeviceFeatures::default(), &config);

    let first = fx.primary();
    let second = fx.primary();
    assert!(fx.end(first));
    assert!(fx.end(second));
    assert_eq!(fx.sink.count(END_NOT_RECORDING), 1);
    assert_eq!(fx.sink.reports()[0].objects[0], TypedHandle::new(first));
}

#[test]
fn test_disabled_message_is_never_reported() {
    let mut config = LayerConfig::default();
    config
        .validation
        .disabled_messages
        .push(END_NOT_RECORDING.to_string());
    let fx = Fixture::with_config(DeviceFeatures::default(), &config);

    let cb = fx.primary();
    assert!(fx.end(cb));
    assert!(fx.sink.is_empty());
}

#[test]
fn test_unlimited_reports_keep_order() {
    let fx = Fixture::new();
    let buffers: Vec<_> = (0..3).map(|_| fx.primary()).collect();
    for &cb in &buffers {
        fx.end(cb);
    }
    let reports = fx.sink.reports();
    assert_eq!(reports.len(), 3);
    for (report, cb) in reports.iter().zip(&buffers) {
        assert_eq!(report.objects.as_slice(), &[TypedHandle::new(*cb)]);
        assert_eq!(report.location.to_string(), "vkEndCommandBuffer()");
    }

    fx.sink.clear();
    assert_eq!(fx.sink.len(), 0);
}

#[test]
fn test_location_paths() {
    let loc = Location::new("vkQueueSubmit")
        .index("pSubmits", 0)
        .index("pCommandBuffers", 2);
    assert_eq!(loc.function(), "vkQueueSubmit");
    assert_eq!(loc.path(), "pSubmits[0].pCommandBuffers[2]");
    assert_eq!(
        loc.to_string(),
        "vkQueueSubmit(): pSubmits[0].pCommandBuffers[2]"
    );
    assert_eq!(
        Location::new("vkBeginCommandBuffer")
            .dot("pBeginInfo")
            .dot("pInheritanceInfo")
            .to_string(),
        "vkBeginCommandBuffer(): pBeginInfo.pInheritanceInfo"
    );
}

#[test]
fn test_validator_from_config_file_with_log_sink() {
    vkvl_common::logging::init_logging();

    let path = std::env::temp_dir().join(format!("vkvl-reporting-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "[validation]\nqueries = false\n\n[report]\nduplicate_message_limit = 2\n",
    )
    .expect("write config");
    std::env::set_var(CONFIG_ENV, &path);

    let device = DeviceState::new(DeviceFeatures::default(), vec![vk::QueueFlags::GRAPHICS]);
    let validator = Validator::from_config_file(device, Arc::new(LogSink));
    std::env::remove_var(CONFIG_ENV);
    let _ = std::fs::remove_file(&path);

    assert!(!validator.config().queries);
    assert!(validator.config().image_layout);

    let cb = vk::CommandBuffer::from_raw(0x42);
    let loc = Location::new("vkEndCommandBuffer");
    for _ in 0..3 {
        assert!(validator.log_error(
            END_NOT_RECORDING,
            &[TypedHandle::new(cb)],
            &loc,
            "not recording".to_string(),
        ));
    }
}
