//! vkCmdExecuteCommands: secondary compatibility checks and composition.

use std::collections::HashMap;

use ash::vk;
use tracing::debug;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{ActiveRenderPass, CbState, CommandBuffer, InheritanceInfo, LegacyRenderPass, RenderingInfo};
use crate::command::Func;
use crate::deferred::QueryUpdate;
use crate::error_sink::Location;
use crate::image_layout::ImageLayoutMap;
use crate::inheritance::ViewportScissorInheritanceTracker;
use crate::validator::Validator;

pub const SECONDARY_IMAGE_LAYOUT: &str = "UNASSIGNED-vkCmdExecuteCommands-commandBuffer-00001";

impl Validator {
    pub fn pre_call_validate_cmd_execute_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        secondaries: &[vk::CommandBuffer],
    ) -> bool {
        let loc = Location::new(Func::CmdExecuteCommands.name());
        let Some(mut skip) = self.device().with_read(command_buffer, |primary| {
            self.validate_cmd(primary, Func::CmdExecuteCommands) | self.validate_execute_contents(primary, &loc)
        }) else {
            return false;
        };

        let mut tracker = ViewportScissorInheritanceTracker::new(self, &loc);
        let track_inheritance =
            self.config().viewport_inheritance && self.device().features().inherited_viewport_scissor;
        if track_inheritance {
            skip |= self.validate_with(command_buffer, |primary| tracker.visit_primary(primary));
        }

        let mut first_seen: HashMap<vk::CommandBuffer, usize> = HashMap::new();
        for (index, handle) in secondaries.iter().enumerate() {
            let secondary_loc = loc.index("pCommandBuffers", index);
            let earlier = first_seen.get(handle).copied();
            first_seen.entry(*handle).or_insert(index);

            if *handle == command_buffer {
                skip |= self.log_error(
                    "VUID-vkCmdExecuteCommands-pCommandBuffers-00088",
                    &[TypedHandle::new(command_buffer)],
                    &secondary_loc,
                    format!("{} cannot execute itself.", TypedHandle::new(command_buffer)),
                );
                continue;
            }

            let checked = self
                .device()
                .with_primary_and_secondary(command_buffer, *handle, |primary, secondary| {
                    let mut skip = self.validate_secondary(primary, secondary, index, earlier, &secondary_loc);
                    if track_inheritance {
                        skip |= tracker.visit_secondary(index as u32, secondary);
                    }
                    skip
                });
            skip |= checked.unwrap_or(false);
        }
        skip
    }

    pub fn post_call_record_cmd_execute_commands(&self, command_buffer: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        for handle in secondaries {
            self.device()
                .with_primary_and_secondary_mut(command_buffer, *handle, |primary, secondary| {
                    primary.nesting_level = primary.nesting_level.max(secondary.nesting_level + 1);
                    primary
                        .event_updates
                        .extend(secondary.event_updates.iter().cloned());
                    primary
                        .submit_checks
                        .extend(secondary.submit_checks.iter().cloned());
                    primary.query_updates.push(QueryUpdate::ExecuteSecondary { secondary: *handle });

                    primary.link_secondary(*handle);
                    primary.add_binding(TypedHandle::new(*handle));
                    secondary.linked_primaries.insert(command_buffer);

                    for (image, map) in &secondary.image_layouts {
                        primary
                            .image_layouts
                            .entry(*image)
                            .or_insert_with(|| ImageLayoutMap::new(map.mip_levels(), map.array_layers()))
                            .merge(map);
                    }
                });
        }
        self.record_with(command_buffer, |primary| primary.viewport_scissor.trash_all());
        debug!("executed {} secondary command buffer(s)", secondaries.len());
    }

    /// Contents of the active instance must admit secondary command buffers.
    fn validate_execute_contents(&self, primary: &CommandBuffer, loc: &Location) -> bool {
        match &primary.render_pass {
            Some(ActiveRenderPass::Legacy(rp)) if rp.contents != vk::SubpassContents::SECONDARY_COMMAND_BUFFERS => self
                .log_error(
                    "VUID-vkCmdExecuteCommands-contents-06018",
                    &[primary.typed(), TypedHandle::new(rp.render_pass)],
                    loc,
                    format!(
                        "the current subpass {} was begun with contents {:?}, not \
                         VK_SUBPASS_CONTENTS_SECONDARY_COMMAND_BUFFERS.",
                        rp.subpass, rp.contents
                    ),
                ),
            Some(ActiveRenderPass::Rendering(info))
                if !info
                    .flags
                    .contains(vk::RenderingFlags::CONTENTS_SECONDARY_COMMAND_BUFFERS) =>
            {
                self.log_error(
                    "VUID-vkCmdExecuteCommands-flags-06024",
                    &[primary.typed()],
                    loc,
                    format!(
                        "the dynamic rendering instance was begun with flags {:?}, which do not include \
                         VK_RENDERING_CONTENTS_SECONDARY_COMMAND_BUFFERS_BIT.",
                        info.flags
                    ),
                )
            }
            _ => false,
        }
    }

    fn validate_secondary(
        &self,
        primary: &CommandBuffer,
        secondary: &CommandBuffer,
        index: usize,
        earlier: Option<usize>,
        loc: &Location,
    ) -> bool {
        let mut skip = false;
        let objects = [primary.typed(), secondary.typed()];

        if !secondary.is_secondary() {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00088",
                &objects,
                loc,
                format!("{} is not VK_COMMAND_BUFFER_LEVEL_SECONDARY.", secondary.typed()),
            );
        }

        if secondary.state.is_invalid() {
            skip |= self.report_invalid_command_buffer(secondary, loc, "VUID-vkCmdExecuteCommands-pCommandBuffers-00089");
        } else if secondary.state != CbState::Recorded {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00089",
                &objects,
                loc,
                format!(
                    "{} is in state {:?} and must be in the executable state.",
                    secondary.typed(),
                    secondary.state
                ),
            );
        }

        skip |= self.validate_secondary_simultaneous_use(primary, secondary, index, earlier, loc);

        if primary.queue_family_index != secondary.queue_family_index {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00094",
                &[primary.typed(), secondary.typed(), TypedHandle::new(secondary.command_pool)],
                loc,
                format!(
                    "{} was allocated from a pool for queue family index {}, but is executed in {} whose \
                     pool is for queue family index {}.",
                    secondary.typed(),
                    secondary.queue_family_index,
                    primary.typed(),
                    primary.queue_family_index
                ),
            );
        }

        match (primary.is_protected(), secondary.is_protected()) {
            (true, false) => {
                skip |= self.log_error(
                    "VUID-vkCmdExecuteCommands-commandBuffer-01820",
                    &objects,
                    loc,
                    format!(
                        "{} is a protected command buffer but {} is unprotected.",
                        primary.typed(),
                        secondary.typed()
                    ),
                );
            }
            (false, true) => {
                skip |= self.log_error(
                    "VUID-vkCmdExecuteCommands-commandBuffer-01821",
                    &objects,
                    loc,
                    format!(
                        "{} is an unprotected command buffer but {} is protected.",
                        primary.typed(),
                        secondary.typed()
                    ),
                );
            }
            _ => {}
        }

        let features = self.device().features();
        if primary.is_secondary()
            && features.nested_command_buffer
            && features.max_command_buffer_nesting_level != u32::MAX
            && secondary.nesting_level >= features.max_command_buffer_nesting_level
        {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-nestedCommandBuffer-09376",
                &objects,
                loc,
                format!(
                    "{} has a nesting level of {}, which is not less than maxCommandBufferNestingLevel ({}).",
                    secondary.typed(),
                    secondary.nesting_level,
                    features.max_command_buffer_nesting_level
                ),
            );
        }

        skip |= self.validate_secondary_render_pass(primary, secondary, loc);
        if let Some(inheritance) = &secondary.inheritance {
            skip |= self.validate_secondary_queries(primary, secondary, inheritance, loc);
        }
        skip |= self.validate_secondary_layouts(primary, secondary, loc);
        skip
    }

    fn validate_secondary_simultaneous_use(
        &self,
        primary: &CommandBuffer,
        secondary: &CommandBuffer,
        index: usize,
        earlier: Option<usize>,
        loc: &Location,
    ) -> bool {
        if secondary.has_usage(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE) {
            return false;
        }
        let mut skip = false;
        let objects = [primary.typed(), secondary.typed()];

        if secondary.is_in_use() {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00091",
                &objects,
                loc,
                format!(
                    "Cannot execute pending {} without VK_COMMAND_BUFFER_USAGE_SIMULTANEOUS_USE_BIT set.",
                    secondary.typed()
                ),
            );
        }
        if primary.linked_command_buffers.contains(&secondary.handle) {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00092",
                &objects,
                loc,
                format!(
                    "Cannot execute {} without VK_COMMAND_BUFFER_USAGE_SIMULTANEOUS_USE_BIT set if previously \
                     executed in {}.",
                    secondary.typed(),
                    primary.typed()
                ),
            );
        }
        if let Some(first) = earlier {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-00093",
                &objects,
                loc,
                format!(
                    "{} appears in pCommandBuffers[{}] and pCommandBuffers[{}] without \
                     VK_COMMAND_BUFFER_USAGE_SIMULTANEOUS_USE_BIT set.",
                    secondary.typed(),
                    first,
                    index
                ),
            );
        }
        skip
    }

    fn validate_secondary_render_pass(&self, primary: &CommandBuffer, secondary: &CommandBuffer, loc: &Location) -> bool {
        let continues = secondary.has_usage(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE);
        let objects = [primary.typed(), secondary.typed()];

        let Some(active) = &primary.render_pass else {
            if continues {
                return self.log_error(
                    "VUID-vkCmdExecuteCommands-pCommandBuffers-00100",
                    &objects,
                    loc,
                    format!(
                        "{} is executed outside a render pass instance scope, but has \
                         VK_COMMAND_BUFFER_USAGE_RENDER_PASS_CONTINUE_BIT set.",
                        secondary.typed()
                    ),
                );
            }
            return false;
        };

        if !continues {
            let vuid = match active {
                ActiveRenderPass::Legacy(_) => "VUID-vkCmdExecuteCommands-pCommandBuffers-00096",
                ActiveRenderPass::Rendering(_) => "VUID-vkCmdExecuteCommands-pBeginInfo-06025",
            };
            return self.log_error(
                vuid,
                &objects,
                loc,
                format!(
                    "{} is executed within a {} instance scope, but does not have \
                     VK_COMMAND_BUFFER_USAGE_RENDER_PASS_CONTINUE_BIT set.",
                    secondary.typed(),
                    active.describe()
                ),
            );
        }

        let Some(inheritance) = &secondary.inheritance else {
            return false;
        };
        match active {
            ActiveRenderPass::Legacy(rp) => self.validate_inherited_render_pass(primary, secondary, rp, inheritance, loc),
            ActiveRenderPass::Rendering(info) => match &inheritance.rendering {
                Some(_) => self.validate_inherited_rendering(primary, secondary, info, inheritance, loc),
                None => self.log_error(
                    "VUID-vkCmdExecuteCommands-pBeginInfo-06025",
                    &objects,
                    loc,
                    format!(
                        "{} is executed within a dynamic rendering instance but was not begun with \
                         VkCommandBufferInheritanceRenderingInfo.",
                        secondary.typed()
                    ),
                ),
            },
        }
    }

    fn validate_inherited_render_pass(
        &self,
        primary: &CommandBuffer,
        secondary: &CommandBuffer,
        rp: &LegacyRenderPass,
        inheritance: &InheritanceInfo,
        loc: &Location,
    ) -> bool {
        let mut skip = false;
        let objects = [primary.typed(), secondary.typed()];

        if inheritance.subpass != rp.subpass {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-pCommandBuffers-06019",
                &objects,
                loc,
                format!(
                    "{} was begun with pInheritanceInfo->subpass {}, but the current subpass is {}.",
                    secondary.typed(),
                    inheritance.subpass,
                    rp.subpass
                ),
            );
        }

        if let Some(inherited) = inheritance.render_pass {
            let current = self.device().render_pass(rp.render_pass);
            let declared = self.device().render_pass(inherited);
            if let (Some(current), Some(declared)) = (current, declared) {
                if !current.is_compatible_with(&declared) {
                    skip |= self.log_error(
                        "VUID-vkCmdExecuteCommands-pBeginInfo-06020",
                        &[primary.typed(), secondary.typed(), TypedHandle::new(rp.render_pass), TypedHandle::new(inherited)],
                        loc,
                        format!(
                            "{} was begun with {} which is not compatible with the current {}.",
                            secondary.typed(),
                            TypedHandle::new(inherited),
                            TypedHandle::new(rp.render_pass)
                        ),
                    );
                }
            }
        }

        if let (Some(inherited), Some(current)) = (inheritance.framebuffer, rp.framebuffer) {
            if inherited != current {
                skip |= self.log_error(
                    "VUID-vkCmdExecuteCommands-pCommandBuffers-00099",
                    &[primary.typed(), secondary.typed(), TypedHandle::new(inherited), TypedHandle::new(current)],
                    loc,
                    format!(
                        "{} references {}, but the current render pass instance uses {}.",
                        secondary.typed(),
                        TypedHandle::new(inherited),
                        TypedHandle::new(current)
                    ),
                );
            }
        }
        skip
    }

    fn validate_inherited_rendering(
        &self,
        primary: &CommandBuffer,
        secondary: &CommandBuffer,
        info: &RenderingInfo,
        inheritance: &InheritanceInfo,
        loc: &Location,
    ) -> bool {
        let Some(inherited) = &inheritance.rendering else {
            return false;
        };
        let mut skip = false;
        let objects = [primary.typed(), secondary.typed()];
        let inheritance_loc = loc.dot("pInheritanceInfo").dot("pNext<VkCommandBufferInheritanceRenderingInfo>");

        let ignored = vk::RenderingFlags::CONTENTS_SECONDARY_COMMAND_BUFFERS;
        if (info.flags & !ignored) != (inherited.flags & !ignored) {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-flags-06026",
                &objects,
                &inheritance_loc.dot("flags"),
                format!(
                    "is {:?}, but VkRenderingInfo::flags of the current instance is {:?}.",
                    inherited.flags, info.flags
                ),
            );
        }

        if info.color_attachments.len() != inherited.color_formats.len() {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-colorAttachmentCount-06027",
                &objects,
                &inheritance_loc.dot("colorAttachmentCount"),
                format!(
                    "is {}, but VkRenderingInfo::colorAttachmentCount of the current instance is {}.",
                    inherited.color_formats.len(),
                    info.color_attachments.len()
                ),
            );
        } else {
            for (i, (attachment, format)) in info
                .color_attachments
                .iter()
                .zip(inherited.color_formats.iter())
                .enumerate()
            {
                let format_loc = inheritance_loc.index("pColorAttachmentFormats", i);
                match attachment.image {
                    Some(_) if attachment.format != *format => {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-imageView-06028",
                            &objects,
                            &format_loc,
                            format!(
                                "is {:?}, but pColorAttachments[{}] of the current instance uses format {:?}.",
                                format, i, attachment.format
                            ),
                        );
                    }
                    None if *format != vk::Format::UNDEFINED => {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-imageView-07606",
                            &objects,
                            &format_loc,
                            format!(
                                "is {:?}, but pColorAttachments[{}].imageView of the current instance is \
                                 VK_NULL_HANDLE.",
                                format, i
                            ),
                        );
                    }
                    _ => {}
                }

                if let (Some(_), Some(samples)) = (attachment.image, inherited.color_attachment_samples.get(i)) {
                    if *samples != attachment.samples {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-pNext-06035",
                            &objects,
                            &loc.dot("pInheritanceInfo")
                                .dot("pNext<VkAttachmentSampleCountInfoAMD>")
                                .index("pColorAttachmentSamples", i),
                            format!(
                                "is {:?}, but pColorAttachments[{}] of the current instance has {:?} samples.",
                                samples, i, attachment.samples
                            ),
                        );
                    }
                }
            }
        }

        let depth_stencil = [
            (
                &info.depth_attachment,
                inherited.depth_format,
                "VUID-vkCmdExecuteCommands-pDepthAttachment-06029",
                "depthAttachmentFormat",
                "pDepthAttachment",
            ),
            (
                &info.stencil_attachment,
                inherited.stencil_format,
                "VUID-vkCmdExecuteCommands-pStencilAttachment-06030",
                "stencilAttachmentFormat",
                "pStencilAttachment",
            ),
        ];
        for (attachment, format, vuid, field, name) in depth_stencil {
            let Some(attachment) = attachment.as_ref().filter(|a| a.image.is_some()) else {
                continue;
            };
            if attachment.format != format {
                skip |= self.log_error(
                    vuid,
                    &objects,
                    &inheritance_loc.dot(field),
                    format!(
                        "is {:?}, but {} of the current instance uses format {:?}.",
                        format, name, attachment.format
                    ),
                );
            }
            if let Some(samples) = inherited.depth_stencil_attachment_samples {
                if samples != attachment.samples {
                    skip |= self.log_error(
                        "VUID-vkCmdExecuteCommands-pNext-06036",
                        &objects,
                        &loc.dot("pInheritanceInfo")
                            .dot("pNext<VkAttachmentSampleCountInfoAMD>")
                            .dot("depthStencilAttachmentSamples"),
                        format!(
                            "is {:?}, but {} of the current instance has {:?} samples.",
                            samples, name, attachment.samples
                        ),
                    );
                }
            }
        }

        if info.view_mask != inherited.view_mask {
            skip |= self.log_error(
                "VUID-vkCmdExecuteCommands-viewMask-06031",
                &objects,
                &inheritance_loc.dot("viewMask"),
                format!(
                    "is 0x{:x}, but VkRenderingInfo::viewMask of the current instance is 0x{:x}.",
                    inherited.view_mask, info.view_mask
                ),
            );
        }
        skip
    }

    fn validate_secondary_queries(
        &self,
        primary: &CommandBuffer,
        secondary: &CommandBuffer,
        inheritance: &InheritanceInfo,
        loc: &Location,
    ) -> bool {
        let mut skip = false;
        for (query, flags) in &primary.active_queries {
            let Some(pool) = self.device().query_pool(query.pool) else {
                continue;
            };
            let objects = [primary.typed(), secondary.typed(), TypedHandle::new(query.pool)];
            match pool.info.query_type {
                vk::QueryType::OCCLUSION => {
                    if !inheritance.occlusion_query_enable {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-commandBuffer-00101",
                            &objects,
                            loc,
                            format!(
                                "{} is active, but {} was begun with occlusionQueryEnable VK_FALSE.",
                                query,
                                secondary.typed()
                            ),
                        );
                    } else if flags.contains(vk::QueryControlFlags::PRECISE)
                        && !inheritance.query_flags.contains(vk::QueryControlFlags::PRECISE)
                    {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-commandBuffer-00102",
                            &objects,
                            loc,
                            format!(
                                "{} is active with VK_QUERY_CONTROL_PRECISE_BIT, but {} was begun with \
                                 queryFlags {:?}.",
                                query,
                                secondary.typed(),
                                inheritance.query_flags
                            ),
                        );
                    }
                }
                vk::QueryType::PIPELINE_STATISTICS => {
                    if !inheritance
                        .pipeline_statistics
                        .contains(pool.info.pipeline_statistics)
                    {
                        skip |= self.log_error(
                            "VUID-vkCmdExecuteCommands-commandBuffer-00104",
                            &objects,
                            loc,
                            format!(
                                "{} is active with pipeline statistics {:?}, but {} was begun with \
                                 pipelineStatistics {:?}.",
                                query,
                                pool.info.pipeline_statistics,
                                secondary.typed(),
                                inheritance.pipeline_statistics
                            ),
                        );
                    }
                }
                _ => {}
            }
        }
        skip
    }

    /// The layout a secondary expects on first use of each subresource must
    /// be the one the primary has established so far.
    fn validate_secondary_layouts(&self, primary: &CommandBuffer, secondary: &CommandBuffer, loc: &Location) -> bool {
        // Custom resolve attachments change layouts in ways this model does
        // not represent, so the check is off while that feature is enabled.
        if !self.config().image_layout || self.device().features().custom_resolve {
            return false;
        }
        let mut skip = false;
        for (image, map) in &secondary.image_layouts {
            let Some(established) = primary.image_layouts.get(image) else {
                continue;
            };
            for (sub, entry) in map.iter() {
                let Some(expected) = entry.initial.filter(|l| *l != vk::ImageLayout::UNDEFINED) else {
                    continue;
                };
                let Some(actual) = established.current(sub) else {
                    continue;
                };
                if actual != expected {
                    skip |= self.log_error(
                        SECONDARY_IMAGE_LAYOUT,
                        &[primary.typed(), secondary.typed(), TypedHandle::new(*image)],
                        loc,
                        format!(
                            "{} executed within {} expects {} (aspect {:?}, mipLevel {}, arrayLayer {}) to be \
                             in layout {:?}--instead, image current layout is {:?}.",
                            secondary.typed(),
                            primary.typed(),
                            TypedHandle::new(*image),
                            sub.aspect_flags(),
                            sub.mip_level,
                            sub.array_layer,
                            expected,
                            actual
                        ),
                    );
                    break;
                }
            }
        }
        skip
    }
}
