//! Command buffer lifecycle and queue submission validation for the VKVL
//! Vulkan layer.
//!
//! The dispatch layer calls a `pre_call_validate_*` method on [`Validator`]
//! before forwarding each intercepted entry point and the matching
//! `post_call_record_*` method after the driver returns. Validation only
//! reports through the [`ErrorSink`]; recording updates [`DeviceState`].

pub mod admission;
pub mod cmd_buffer;
pub mod command;
pub mod commands;
pub mod deferred;
pub mod device;
pub mod error_sink;
pub mod image_layout;
pub mod inheritance;
pub mod objects;
pub mod query;
pub mod queue;
pub mod submission;
pub mod validator;

pub use cmd_buffer::{BeginInfo, CbState, CommandBuffer, InheritanceInfo, RenderingInfo};
pub use command::Func;
pub use commands::{ImageBarrier, ImageUse, RenderPassBegin};
pub use device::{DeviceFeatures, DeviceState};
pub use error_sink::{ErrorSink, Location, LogSink, MemorySink, Report};
pub use queue::{SemaphoreOp, SubmitInfo};
pub use validator::Validator;
