//! Draws, dispatches, copies and clears.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::CommandBuffer;
use crate::command::Func;
use crate::error_sink::Location;
use crate::validator::Validator;

/// An image a transfer or clear command reads or writes, in the layout the
/// command declares.
#[derive(Debug, Clone, Copy)]
pub struct ImageUse {
    pub image: vk::Image,
    pub layout: vk::ImageLayout,
    pub range: vk::ImageSubresourceRange,
}

impl Validator {
    pub fn pre_call_validate_cmd_draw(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| {
            self.validate_cmd(cb, Func::CmdDraw) | self.validate_draw_state(cb, Func::CmdDraw)
        })
    }

    pub fn post_call_record_cmd_draw(&self, command_buffer: vk::CommandBuffer) {
        self.record_draw(command_buffer);
    }

    pub fn pre_call_validate_cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| {
            self.validate_cmd(cb, Func::CmdDrawIndexed) | self.validate_draw_state(cb, Func::CmdDrawIndexed)
        })
    }

    pub fn post_call_record_cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer) {
        self.record_draw(command_buffer);
    }

    pub fn pre_call_validate_cmd_dispatch(&self, command_buffer: vk::CommandBuffer) -> bool {
        let loc = Location::new(Func::CmdDispatch.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdDispatch);
            if cb.bound_compute_pipeline.is_none() {
                skip |= self.log_error(
                    "VUID-vkCmdDispatch-None-08606",
                    &[cb.typed()],
                    &loc,
                    "A valid VK_PIPELINE_BIND_POINT_COMPUTE pipeline must be bound.".to_string(),
                );
            }
            skip
        })
    }

    pub fn pre_call_validate_cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdCopyBuffer))
    }

    pub fn pre_call_validate_cmd_copy_image(&self, command_buffer: vk::CommandBuffer, src: &ImageUse, dst: &ImageUse) -> bool {
        let loc = Location::new(Func::CmdCopyImage.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdCopyImage);
            skip |= self.validate_recorded_layout(cb, src, &loc.dot("srcImageLayout"), "VUID-vkCmdCopyImage-srcImageLayout-00128");
            skip |= self.validate_recorded_layout(cb, dst, &loc.dot("dstImageLayout"), "VUID-vkCmdCopyImage-dstImageLayout-00133");
            skip
        })
    }

    pub fn post_call_record_cmd_copy_image(&self, command_buffer: vk::CommandBuffer, src: &ImageUse, dst: &ImageUse) {
        self.record_image_use(command_buffer, &[*src, *dst]);
    }

    pub fn pre_call_validate_cmd_clear_color_image(&self, command_buffer: vk::CommandBuffer, image: &ImageUse) -> bool {
        let loc = Location::new(Func::CmdClearColorImage.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdClearColorImage);
            skip |= self.validate_recorded_layout(cb, image, &loc.dot("imageLayout"), "VUID-vkCmdClearColorImage-imageLayout-00004");
            skip
        })
    }

    pub fn post_call_record_cmd_clear_color_image(&self, command_buffer: vk::CommandBuffer, image: &ImageUse) {
        self.record_image_use(command_buffer, &[*image]);
    }

    pub fn pre_call_validate_cmd_clear_attachments(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdClearAttachments))
    }

    fn validate_draw_state(&self, cb: &CommandBuffer, func: Func) -> bool {
        let name = func.name();
        let loc = Location::new(name);
        let Some(pipeline) = cb.bound_graphics_pipeline else {
            return self.log_error(
                &format!("VUID-{}-None-08606", name),
                &[cb.typed()],
                &loc,
                "A valid VK_PIPELINE_BIND_POINT_GRAPHICS pipeline must be bound.".to_string(),
            );
        };
        let Some(pipeline) = self.device().pipeline(pipeline) else {
            return false;
        };
        let vs = &cb.viewport_scissor;
        // Inherited state is checked when the secondary is executed.
        if vs.inherits() {
            return false;
        }

        let info = &pipeline.info;
        let objects = [cb.typed(), TypedHandle::new(pipeline.handle)];
        let mut skip = false;

        if info.has_dynamic(vk::DynamicState::VIEWPORT_WITH_COUNT) {
            if vs.viewport_with_count_mask == 0 || vs.viewport_trashed_count {
                skip |= self.log_error(
                    &format!("VUID-{}-viewportCount-03417", name),
                    &objects,
                    &loc,
                    "The bound pipeline uses VK_DYNAMIC_STATE_VIEWPORT_WITH_COUNT but the viewport count \
                     was not set by vkCmdSetViewportWithCount() or was invalidated by a pipeline bind."
                        .to_string(),
                );
            }
        } else if info.has_dynamic(vk::DynamicState::VIEWPORT) {
            let missing = vs.missing_viewports(info.viewport_count);
            if missing != 0 {
                skip |= self.log_error(
                    &format!("VUID-{}-None-07831", name),
                    &objects,
                    &loc,
                    format!(
                        "Dynamic viewport(s) (mask 0x{:x}) are used by the pipeline, but were not provided \
                         via calls to vkCmdSetViewport().",
                        missing
                    ),
                );
            }
        }

        if info.has_dynamic(vk::DynamicState::SCISSOR_WITH_COUNT) {
            if vs.scissor_with_count_mask == 0 || vs.scissor_trashed_count {
                skip |= self.log_error(
                    &format!("VUID-{}-scissorCount-03418", name),
                    &objects,
                    &loc,
                    "The bound pipeline uses VK_DYNAMIC_STATE_SCISSOR_WITH_COUNT but the scissor count \
                     was not set by vkCmdSetScissorWithCount() or was invalidated by a pipeline bind."
                        .to_string(),
                );
            }
        } else if info.has_dynamic(vk::DynamicState::SCISSOR) {
            let missing = vs.missing_scissors(info.scissor_count);
            if missing != 0 {
                skip |= self.log_error(
                    &format!("VUID-{}-None-07832", name),
                    &objects,
                    &loc,
                    format!(
                        "Dynamic scissor(s) (mask 0x{:x}) are used by the pipeline, but were not provided \
                         via calls to vkCmdSetScissor().",
                        missing
                    ),
                );
            }
        }
        skip
    }

    fn record_draw(&self, command_buffer: vk::CommandBuffer) {
        self.record_with(command_buffer, |cb| {
            let Some(pipeline) = cb.bound_graphics_pipeline.and_then(|p| self.device().pipeline(p)) else {
                return;
            };
            cb.viewport_scissor.record_draw(&pipeline.info);
        });
    }

    /// Report a declared layout that contradicts one this buffer already
    /// established for the same subresource.
    pub(crate) fn validate_recorded_layout(&self, cb: &CommandBuffer, image_use: &ImageUse, loc: &Location, vuid: &str) -> bool {
        if !self.config().image_layout {
            return false;
        }
        let Some(map) = cb.image_layouts.get(&image_use.image) else {
            return false;
        };
        for sub in map.expand(&image_use.range) {
            match map.current(&sub) {
                Some(actual) if actual != image_use.layout => {
                    return self.log_error(
                        vuid,
                        &[cb.typed(), TypedHandle::new(image_use.image)],
                        loc,
                        format!(
                            "Cannot use {} (aspect {:?}, mipLevel {}, arrayLayer {}) with specific layout {:?} \
                             that doesn't match the previous known layout {:?}.",
                            TypedHandle::new(image_use.image),
                            sub.aspect_flags(),
                            sub.mip_level,
                            sub.array_layer,
                            image_use.layout,
                            actual
                        ),
                    );
                }
                _ => {}
            }
        }
        false
    }

    fn record_image_use(&self, command_buffer: vk::CommandBuffer, uses: &[ImageUse]) {
        self.record_with(command_buffer, |cb| {
            for image_use in uses {
                cb.add_binding(TypedHandle::new(image_use.image));
                if let Some(map) = self.layout_map_mut(cb, image_use.image) {
                    let _ = map.expect(&image_use.range, image_use.layout);
                }
            }
        });
    }
}
