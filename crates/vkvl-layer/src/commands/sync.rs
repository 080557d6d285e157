//! Barriers and events.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{ActiveRenderPass, CommandBuffer};
use crate::command::Func;
use crate::deferred::{EventUpdate, SubmitCheck};
use crate::objects::EventSignal;
use crate::validator::Validator;

/// `VkImageMemoryBarrier2`, as far as layout and ownership tracking need it.
#[derive(Debug, Clone, Copy)]
pub struct ImageBarrier {
    pub image: vk::Image,
    pub range: vk::ImageSubresourceRange,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
}

impl ImageBarrier {
    pub fn layout_transition(
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Self {
        Self {
            image,
            range,
            old_layout,
            new_layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        }
    }

    pub fn is_ownership_transfer(&self) -> bool {
        self.src_queue_family_index != self.dst_queue_family_index
            && self.src_queue_family_index != vk::QUEUE_FAMILY_IGNORED
            && self.dst_queue_family_index != vk::QUEUE_FAMILY_IGNORED
    }
}

impl Validator {
    pub fn pre_call_validate_cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        _image_barriers: &[ImageBarrier],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdPipelineBarrier))
    }

    pub fn post_call_record_cmd_pipeline_barrier(&self, command_buffer: vk::CommandBuffer, image_barriers: &[ImageBarrier]) {
        self.record_with(command_buffer, |cb| self.record_image_barriers(cb, image_barriers));
    }

    pub fn pre_call_validate_cmd_set_event(
        &self,
        command_buffer: vk::CommandBuffer,
        _event: vk::Event,
        _stage_mask: vk::PipelineStageFlags2,
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdSetEvent))
    }

    pub fn post_call_record_cmd_set_event(
        &self,
        command_buffer: vk::CommandBuffer,
        event: vk::Event,
        stage_mask: vk::PipelineStageFlags2,
    ) {
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(event));
            cb.event_updates.push(EventUpdate::Set { event, stage_mask });
        });
    }

    pub fn pre_call_validate_cmd_reset_event(
        &self,
        command_buffer: vk::CommandBuffer,
        _event: vk::Event,
        _stage_mask: vk::PipelineStageFlags2,
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdResetEvent))
    }

    pub fn post_call_record_cmd_reset_event(
        &self,
        command_buffer: vk::CommandBuffer,
        event: vk::Event,
        _stage_mask: vk::PipelineStageFlags2,
    ) {
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(event));
            cb.event_updates.push(EventUpdate::Reset { event });
        });
    }

    pub fn pre_call_validate_cmd_wait_events(
        &self,
        command_buffer: vk::CommandBuffer,
        _events: &[vk::Event],
        _src_stage_mask: vk::PipelineStageFlags2,
        _image_barriers: &[ImageBarrier],
    ) -> bool {
        self.validate_with(command_buffer, |cb| self.validate_cmd(cb, Func::CmdWaitEvents))
    }

    pub fn post_call_record_cmd_wait_events(
        &self,
        command_buffer: vk::CommandBuffer,
        events: &[vk::Event],
        src_stage_mask: vk::PipelineStageFlags2,
        image_barriers: &[ImageBarrier],
    ) {
        self.record_with(command_buffer, |cb| {
            for event in events {
                cb.add_binding(TypedHandle::new(*event));
            }
            cb.event_updates.push(EventUpdate::Wait {
                events: events.to_vec(),
                src_stage_mask,
            });
            self.record_image_barriers(cb, image_barriers);
        });
    }

    /// vkSetEvent from the host.
    pub fn record_set_event_host(&self, event: vk::Event) {
        if let Some(state) = self.device().event(event) {
            state.set_signal(EventSignal {
                signaled: true,
                stage_mask: vk::PipelineStageFlags2::HOST,
            });
        }
    }

    /// vkResetEvent from the host.
    pub fn record_reset_event_host(&self, event: vk::Event) {
        if let Some(state) = self.device().event(event) {
            state.set_signal(EventSignal::default());
        }
    }

    fn record_image_barriers(&self, cb: &mut CommandBuffer, image_barriers: &[ImageBarrier]) {
        for barrier in image_barriers {
            cb.add_binding(TypedHandle::new(barrier.image));

            if let Some(ActiveRenderPass::Rendering(info)) = &cb.render_pass {
                let is_attachment = info
                    .color_attachments
                    .iter()
                    .chain(info.depth_attachment.iter())
                    .chain(info.stencil_attachment.iter())
                    .any(|a| a.image == Some(barrier.image));
                if is_attachment {
                    let recorded = cb.image_layouts.get(&barrier.image).and_then(|map| {
                        map.expand(&barrier.range)
                            .first()
                            .and_then(|sub| map.current(sub))
                    });
                    cb.submit_checks.push(SubmitCheck::AttachmentLayout {
                        image: barrier.image,
                        range: barrier.range,
                        recorded,
                    });
                }
            }

            if barrier.is_ownership_transfer() {
                cb.submit_checks.push(SubmitCheck::QueueFamilyOwnership {
                    object: TypedHandle::new(barrier.image),
                    src_queue_family: barrier.src_queue_family_index,
                    dst_queue_family: barrier.dst_queue_family_index,
                });
            }

            if barrier.old_layout != barrier.new_layout {
                if let Some(map) = self.layout_map_mut(cb, barrier.image) {
                    map.transition(&barrier.range, barrier.old_layout, barrier.new_layout);
                }
            }
        }
    }
}
