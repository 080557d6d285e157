//! vkBegin/End/ResetCommandBuffer, vkFreeCommandBuffers, vkResetCommandPool.

use ash::vk;
use tracing::debug;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{ActiveRenderPass, BeginInfo, CbState};
use crate::error_sink::Location;
use crate::validator::Validator;

impl Validator {
    pub fn pre_call_validate_begin_command_buffer(&self, command_buffer: vk::CommandBuffer, info: &BeginInfo) -> bool {
        let loc = Location::new("vkBeginCommandBuffer");
        self.validate_with(command_buffer, |cb| {
            let mut skip = false;
            let objects = [cb.typed()];

            if cb.is_in_use() {
                skip |= self.log_error(
                    "VUID-vkBeginCommandBuffer-commandBuffer-00049",
                    &objects,
                    &loc,
                    format!("Calling vkBeginCommandBuffer() on active {} before it has completed.", cb.typed()),
                );
            } else if cb.state == CbState::Recording {
                skip |= self.log_error(
                    "VUID-vkBeginCommandBuffer-commandBuffer-00049",
                    &objects,
                    &loc,
                    format!("Cannot call Begin on {} in the RECORDING state.", cb.typed()),
                );
            }

            if cb.state != CbState::New && !cb.pool_allows_reset() {
                skip |= self.log_error(
                    "VUID-vkBeginCommandBuffer-commandBuffer-00050",
                    &[cb.typed(), TypedHandle::new(cb.command_pool)],
                    &loc,
                    format!(
                        "Call to vkBeginCommandBuffer() on {} attempts to implicitly reset cmdBuffer created from \
                         {} that does NOT have the VK_COMMAND_POOL_CREATE_RESET_COMMAND_BUFFER_BIT bit set.",
                        cb.typed(),
                        TypedHandle::new(cb.command_pool)
                    ),
                );
            }

            if cb.is_secondary() && info.inheritance.is_none() {
                skip |= self.log_error(
                    "VUID-vkBeginCommandBuffer-commandBuffer-00051",
                    &objects,
                    &loc.dot("pBeginInfo").dot("pInheritanceInfo"),
                    format!("{} is a secondary command buffer and pInheritanceInfo is NULL.", cb.typed()),
                );
            }
            skip
        })
    }

    pub fn post_call_record_begin_command_buffer(&self, command_buffer: vk::CommandBuffer, info: &BeginInfo) {
        let primaries = self.device().with_write(command_buffer, |cb| {
            let primaries = cb.begin(info);
            // Fill in what the inheritance info only names by handle.
            if let Some(ActiveRenderPass::Legacy(rp)) = cb.render_pass.as_mut() {
                if let Some(state) = self.device().render_pass(rp.render_pass) {
                    rp.subpass_count = state.info.subpass_count;
                    rp.view_mask = state.info.view_mask;
                }
            }
            primaries
        });
        if let Some(primaries) = primaries {
            self.device().invalidate_linked_primaries(command_buffer, primaries);
        }
    }

    pub fn pre_call_validate_end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> bool {
        let loc = Location::new("vkEndCommandBuffer");
        self.validate_with(command_buffer, |cb| {
            let mut skip = false;
            let objects = [cb.typed()];

            if cb.is_primary() || !cb.has_usage(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE) {
                if let Some(active) = &cb.render_pass {
                    skip |= self.log_error(
                        "VUID-vkEndCommandBuffer-commandBuffer-00060",
                        &objects,
                        &loc,
                        format!("It is invalid to issue this call inside an active {} instance.", active.describe()),
                    );
                }
            }

            if cb.state.is_invalid() {
                skip |= self.report_invalid_command_buffer(cb, &loc, "VUID-vkEndCommandBuffer-commandBuffer-00059");
            } else if cb.state != CbState::Recording {
                skip |= self.log_error(
                    "VUID-vkEndCommandBuffer-commandBuffer-00059",
                    &objects,
                    &loc,
                    format!(
                        "Cannot call End on {} when not in the RECORDING state. Must first call \
                         vkBeginCommandBuffer().",
                        cb.typed()
                    ),
                );
            }

            for query in cb.active_queries.keys() {
                skip |= self.log_error(
                    "VUID-vkEndCommandBuffer-commandBuffer-00061",
                    &[cb.typed(), TypedHandle::new(query.pool)],
                    &loc,
                    format!("Ending command buffer with in progress query: {}.", query),
                );
            }

            if let Some(session) = cb.video_session {
                skip |= self.log_error(
                    "VUID-vkEndCommandBuffer-None-06991",
                    &[cb.typed(), TypedHandle::new(session)],
                    &loc,
                    "Ending command buffer with an active video coding scope.".to_string(),
                );
            }
            skip
        })
    }

    pub fn post_call_record_end_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        self.record_with(command_buffer, |cb| cb.end());
    }

    pub fn pre_call_validate_reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> bool {
        let loc = Location::new("vkResetCommandBuffer");
        self.validate_with(command_buffer, |cb| {
            let mut skip = false;
            if !cb.pool_allows_reset() {
                skip |= self.log_error(
                    "VUID-vkResetCommandBuffer-commandBuffer-00046",
                    &[cb.typed(), TypedHandle::new(cb.command_pool)],
                    &loc,
                    format!(
                        "{} was created from {} which was not created with \
                         VK_COMMAND_POOL_CREATE_RESET_COMMAND_BUFFER_BIT.",
                        cb.typed(),
                        TypedHandle::new(cb.command_pool)
                    ),
                );
            }
            if cb.is_in_use() {
                skip |= self.log_error(
                    "VUID-vkResetCommandBuffer-commandBuffer-00045",
                    &[cb.typed()],
                    &loc,
                    format!("Attempt to reset {} which is in use.", cb.typed()),
                );
            }
            skip
        })
    }

    pub fn post_call_record_reset_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        if let Some(primaries) = self.device().with_write(command_buffer, |cb| cb.reset()) {
            self.device().invalidate_linked_primaries(command_buffer, primaries);
        }
    }

    pub fn pre_call_validate_free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) -> bool {
        let mut skip = false;
        for (index, handle) in command_buffers.iter().enumerate() {
            let loc = Location::new("vkFreeCommandBuffers").index("pCommandBuffers", index);
            skip |= self.validate_with(*handle, |cb| {
                if !cb.is_in_use() {
                    return false;
                }
                self.log_error(
                    "VUID-vkFreeCommandBuffers-pCommandBuffers-00047",
                    &[cb.typed()],
                    &loc,
                    format!("Attempt to free {} which is in use.", cb.typed()),
                )
            });
        }
        skip
    }

    pub fn post_call_record_free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        for handle in command_buffers {
            self.device().record_free_command_buffer(*handle);
        }
        debug!("freed {} command buffer(s)", command_buffers.len());
    }

    pub fn pre_call_validate_reset_command_pool(&self, pool: vk::CommandPool) -> bool {
        let loc = Location::new("vkResetCommandPool");
        let mut skip = false;
        for handle in self.pool_command_buffers(pool) {
            skip |= self.validate_with(handle, |cb| {
                if !cb.is_in_use() {
                    return false;
                }
                self.log_error(
                    "VUID-vkResetCommandPool-commandPool-00040",
                    &[TypedHandle::new(pool), cb.typed()],
                    &loc,
                    format!("Attempt to reset {} while {} is in use.", TypedHandle::new(pool), cb.typed()),
                )
            });
        }
        skip
    }

    pub fn post_call_record_reset_command_pool(&self, pool: vk::CommandPool) {
        for handle in self.pool_command_buffers(pool) {
            self.post_call_record_reset_command_buffer(handle);
        }
    }

    fn pool_command_buffers(&self, pool: vk::CommandPool) -> Vec<vk::CommandBuffer> {
        self.device()
            .command_buffers_snapshot()
            .into_iter()
            .filter(|(_, cb)| cb.read().command_pool == pool)
            .map(|(handle, _)| handle)
            .collect()
    }
}
