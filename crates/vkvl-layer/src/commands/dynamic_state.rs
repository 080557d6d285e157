//! Pipeline and descriptor binding, dynamic viewport and scissor state.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::command::Func;
use crate::validator::Validator;

impl Validator {
    pub fn pre_call_validate_cmd_bind_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _pipeline: vk::Pipeline,
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdBindPipeline))
    }

    pub fn post_call_record_cmd_bind_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        let state = self.device().pipeline(pipeline);
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(pipeline));
            match bind_point {
                vk::PipelineBindPoint::GRAPHICS => {
                    cb.bound_graphics_pipeline = Some(pipeline);
                    if let Some(state) = &state {
                        cb.viewport_scissor.record_bind_pipeline(&state.info);
                    }
                }
                vk::PipelineBindPoint::COMPUTE => cb.bound_compute_pipeline = Some(pipeline),
                _ => {}
            }
        });
    }

    pub fn pre_call_validate_cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        _sets: &[vk::DescriptorSet],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdBindDescriptorSets))
    }

    pub fn post_call_record_cmd_bind_descriptor_sets(&self, command_buffer: vk::CommandBuffer, sets: &[vk::DescriptorSet]) {
        self.record_with(command_buffer, |cb| {
            for set in sets {
                cb.add_binding(TypedHandle::new(*set));
            }
        });
    }

    pub fn pre_call_validate_cmd_set_viewport(
        &self,
        command_buffer: vk::CommandBuffer,
        _first_viewport: u32,
        _viewports: &[vk::Viewport],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdSetViewport))
    }

    pub fn post_call_record_cmd_set_viewport(
        &self,
        command_buffer: vk::CommandBuffer,
        first_viewport: u32,
        viewports: &[vk::Viewport],
    ) {
        self.record_with(command_buffer, |cb| {
            cb.viewport_scissor.record_set_viewport(first_viewport, viewports)
        });
    }

    pub fn pre_call_validate_cmd_set_viewport_with_count(
        &self,
        command_buffer: vk::CommandBuffer,
        _viewports: &[vk::Viewport],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdSetViewportWithCount))
    }

    pub fn post_call_record_cmd_set_viewport_with_count(&self, command_buffer: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        self.record_with(command_buffer, |cb| {
            cb.viewport_scissor.record_set_viewport_with_count(viewports)
        });
    }

    pub fn pre_call_validate_cmd_set_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        _first_scissor: u32,
        _scissors: &[vk::Rect2D],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdSetScissor))
    }

    pub fn post_call_record_cmd_set_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        first_scissor: u32,
        scissors: &[vk::Rect2D],
    ) {
        self.record_with(command_buffer, |cb| {
            cb.viewport_scissor
                .record_set_scissor(first_scissor, scissors.len() as u32)
        });
    }

    pub fn pre_call_validate_cmd_set_scissor_with_count(
        &self,
        command_buffer: vk::CommandBuffer,
        _scissors: &[vk::Rect2D],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdSetScissorWithCount))
    }

    pub fn post_call_record_cmd_set_scissor_with_count(&self, command_buffer: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        self.record_with(command_buffer, |cb| {
            cb.viewport_scissor
                .record_set_scissor_with_count(scissors.len() as u32)
        });
    }
}
