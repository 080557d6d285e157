//! The validation context every check runs against.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use vkvl_common::logging::init_logging_with_default;
use vkvl_core::config::{default_config_path, LayerConfig, ValidationConfig};
use vkvl_core::TypedHandle;

use crate::device::DeviceState;
use crate::error_sink::{ErrorSink, LogObjectList, Location, Report};

/// Device validation state plus the reporting policy.
///
/// All `pre_call_validate_*` and `post_call_record_*` entry points are
/// methods on this type.
pub struct Validator {
    device: DeviceState,
    sink: Arc<dyn ErrorSink>,
    config: ValidationConfig,
    /// 0 = unlimited
    duplicate_limit: u32,
    message_counts: DashMap<String, u32>,
}

impl Validator {
    pub fn new(device: DeviceState, sink: Arc<dyn ErrorSink>, config: &LayerConfig) -> Self {
        Self {
            device,
            sink,
            config: config.validation.clone(),
            duplicate_limit: config.report.duplicate_message_limit,
            message_counts: DashMap::new(),
        }
    }

    /// Load the layer configuration from its usual location and install
    /// the log subscriber it asks for.
    pub fn from_config_file(device: DeviceState, sink: Arc<dyn ErrorSink>) -> Self {
        let path = default_config_path();
        let config = LayerConfig::load_or_default(&path);
        init_logging_with_default(config.report.log_filter.as_deref().unwrap_or("info"));
        info!("layer configuration from {}", path);
        Self::new(device, sink, &config)
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Report one failure. Returns the skip signal, which is true even when
    /// the report itself is suppressed by configuration.
    pub fn log_error(&self, vuid: &str, objects: &[TypedHandle], loc: &Location, message: String) -> bool {
        if self.config.is_disabled(vuid) {
            return true;
        }
        if self.duplicate_limit != 0 {
            let mut count = self.message_counts.entry(vuid.to_string()).or_insert(0);
            if *count >= self.duplicate_limit {
                debug!("suppressing duplicate {}", vuid);
                return true;
            }
            *count += 1;
        }
        self.sink.log_error(Report {
            vuid: vuid.to_string(),
            objects: objects.iter().copied().collect::<LogObjectList>(),
            location: loc.clone(),
            message,
        })
    }
}
