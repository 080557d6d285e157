//! Video coding scope.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::command::Func;
use crate::validator::Validator;

impl Validator {
    pub fn pre_call_validate_cmd_begin_video_coding(
        &self,
        command_buffer: vk::CommandBuffer,
        _session: vk::VideoSessionKHR,
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdBeginVideoCoding))
    }

    pub fn post_call_record_cmd_begin_video_coding(&self, command_buffer: vk::CommandBuffer, session: vk::VideoSessionKHR) {
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(session));
            cb.video_session = Some(session);
        });
    }

    pub fn pre_call_validate_cmd_control_video_coding(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdControlVideoCoding))
    }

    pub fn pre_call_validate_cmd_decode_video(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdDecodeVideo))
    }

    pub fn pre_call_validate_cmd_end_video_coding(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdEndVideoCoding))
    }

    pub fn post_call_record_cmd_end_video_coding(&self, command_buffer: vk::CommandBuffer) {
        self.record_with(command_buffer, |cb| cb.video_session = None);
    }
}
