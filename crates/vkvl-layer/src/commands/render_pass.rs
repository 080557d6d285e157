//! Render pass and dynamic rendering instances.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{ActiveRenderPass, LegacyRenderPass, RenderingInfo, SuspendState};
use crate::command::Func;
use crate::commands::ImageUse;
use crate::error_sink::Location;
use crate::submission::INVALID_IMAGE_LAYOUT;
use crate::validator::Validator;

/// `VkRenderPassBeginInfo` plus the `contents` argument.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub contents: vk::SubpassContents,
}

impl Validator {
    pub fn pre_call_validate_cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin) -> bool {
        let loc = Location::new(Func::CmdBeginRenderPass.name()).dot("pRenderPassBegin");
        let render_pass = self.device().render_pass(begin.render_pass);
        let framebuffer = self.device().framebuffer(begin.framebuffer);
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdBeginRenderPass);
            let (Some(render_pass), Some(framebuffer)) = (&render_pass, &framebuffer) else {
                return skip;
            };
            let attachments = render_pass
                .info
                .attachments
                .iter()
                .zip(framebuffer.info.attachments.iter())
                .enumerate();
            for (i, (description, attachment)) in attachments {
                if description.initial_layout == vk::ImageLayout::UNDEFINED {
                    continue;
                }
                let image_use = ImageUse {
                    image: attachment.image,
                    layout: description.initial_layout,
                    range: attachment.range,
                };
                skip |= self.validate_recorded_layout(
                    cb,
                    &image_use,
                    &loc.dot("framebuffer").index("pAttachments", i),
                    INVALID_IMAGE_LAYOUT,
                );
            }
            skip
        })
    }

    pub fn post_call_record_cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        let render_pass = self.device().render_pass(begin.render_pass);
        let framebuffer = self.device().framebuffer(begin.framebuffer);
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(begin.render_pass));
            cb.add_binding(TypedHandle::new(begin.framebuffer));
            let (subpass_count, view_mask) = render_pass
                .as_ref()
                .map(|rp| (rp.info.subpass_count, rp.info.view_mask))
                .unwrap_or((1, 0));
            cb.render_pass = Some(ActiveRenderPass::Legacy(LegacyRenderPass {
                render_pass: begin.render_pass,
                subpass: 0,
                subpass_count,
                framebuffer: Some(begin.framebuffer),
                contents: begin.contents,
                view_mask,
            }));

            // Attachments must be in their initial layout when the pass
            // begins and are left in their final layout.
            let (Some(render_pass), Some(framebuffer)) = (&render_pass, &framebuffer) else {
                return;
            };
            for (description, attachment) in render_pass
                .info
                .attachments
                .iter()
                .zip(framebuffer.info.attachments.iter())
            {
                cb.add_binding(TypedHandle::new(attachment.image));
                if let Some(map) = self.layout_map_mut(cb, attachment.image) {
                    map.transition(&attachment.range, description.initial_layout, description.final_layout);
                }
            }
        });
    }

    pub fn pre_call_validate_cmd_next_subpass(&self, command_buffer: vk::CommandBuffer, _contents: vk::SubpassContents) -> bool {
        let loc = Location::new(Func::CmdNextSubpass.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdNextSubpass);
            if let Some(ActiveRenderPass::Legacy(rp)) = &cb.render_pass {
                if rp.subpass + 1 >= rp.subpass_count {
                    skip |= self.log_error(
                        "VUID-vkCmdNextSubpass-None-00909",
                        &[cb.typed(), TypedHandle::new(rp.render_pass)],
                        &loc,
                        format!(
                            "Attempted to advance beyond final subpass ({} of {}).",
                            rp.subpass, rp.subpass_count
                        ),
                    );
                }
            }
            skip
        })
    }

    pub fn post_call_record_cmd_next_subpass(&self, command_buffer: vk::CommandBuffer, contents: vk::SubpassContents) {
        self.record_with(command_buffer, |cb| {
            if let Some(ActiveRenderPass::Legacy(rp)) = cb.render_pass.as_mut() {
                rp.subpass += 1;
                rp.contents = contents;
            }
        });
    }

    pub fn pre_call_validate_cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) -> bool {
        let loc = Location::new(Func::CmdEndRenderPass.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdEndRenderPass);
            match &cb.render_pass {
                Some(ActiveRenderPass::Rendering(_)) => {
                    skip |= self.log_error(
                        "VUID-vkCmdEndRenderPass-None-06170",
                        &[cb.typed()],
                        &loc,
                        "The current render pass instance was begun with vkCmdBeginRendering().".to_string(),
                    );
                }
                Some(ActiveRenderPass::Legacy(rp)) if rp.subpass + 1 != rp.subpass_count => {
                    skip |= self.log_error(
                        "VUID-vkCmdEndRenderPass-None-00910",
                        &[cb.typed(), TypedHandle::new(rp.render_pass)],
                        &loc,
                        format!(
                            "Called before reaching final subpass (current subpass {}, subpass count {}).",
                            rp.subpass, rp.subpass_count
                        ),
                    );
                }
                _ => {}
            }
            skip
        })
    }

    pub fn post_call_record_cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.record_with(command_buffer, |cb| cb.render_pass = None);
    }

    pub fn pre_call_validate_cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, info: &RenderingInfo) -> bool {
        let loc = Location::new(Func::CmdBeginRendering.name()).dot("pRenderingInfo");
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdBeginRendering);
            let attachments = info
                .color_attachments
                .iter()
                .enumerate()
                .map(|(i, a)| (loc.index("pColorAttachments", i), a))
                .chain(info.depth_attachment.iter().map(|a| (loc.dot("pDepthAttachment"), a)))
                .chain(info.stencil_attachment.iter().map(|a| (loc.dot("pStencilAttachment"), a)));
            for (attachment_loc, attachment) in attachments {
                let Some(image) = attachment.image else {
                    continue;
                };
                let image_use = ImageUse {
                    image,
                    layout: attachment.layout,
                    range: attachment.range,
                };
                skip |= self.validate_recorded_layout(cb, &image_use, &attachment_loc.dot("imageLayout"), INVALID_IMAGE_LAYOUT);
            }
            skip
        })
    }

    pub fn post_call_record_cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, info: &RenderingInfo) {
        self.record_with(command_buffer, |cb| {
            if info.flags.contains(vk::RenderingFlags::RESUMING) {
                cb.last_suspend_state = SuspendState::Resumed;
            }
            let attachments = info
                .color_attachments
                .iter()
                .chain(info.depth_attachment.iter())
                .chain(info.stencil_attachment.iter());
            for attachment in attachments {
                let Some(image) = attachment.image else {
                    continue;
                };
                cb.add_binding(TypedHandle::new(image));
                if let Some(map) = self.layout_map_mut(cb, image) {
                    // Reported by the pre-call check; the tracked layout stays.
                    let _ = map.expect(&attachment.range, attachment.layout);
                }
            }
            cb.render_pass = Some(ActiveRenderPass::Rendering(info.clone()));
        });
    }

    pub fn pre_call_validate_cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) -> bool {
        let loc = Location::new(Func::CmdEndRendering.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdEndRendering);
            if let Some(ActiveRenderPass::Legacy(rp)) = &cb.render_pass {
                skip |= self.log_error(
                    "VUID-vkCmdEndRendering-None-06161",
                    &[cb.typed(), TypedHandle::new(rp.render_pass)],
                    &loc,
                    "The current render pass instance was begun with vkCmdBeginRenderPass().".to_string(),
                );
            }
            skip
        })
    }

    pub fn post_call_record_cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        self.record_with(command_buffer, |cb| {
            if let Some(ActiveRenderPass::Rendering(info)) = &cb.render_pass {
                cb.last_suspend_state = if info.flags.contains(vk::RenderingFlags::SUSPENDING) {
                    SuspendState::Suspended
                } else {
                    SuspendState::Empty
                };
            }
            cb.render_pass = None;
        });
    }
}
