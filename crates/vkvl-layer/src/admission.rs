//! The gate every `vkCmd*` call passes before its own checks.
//!
//! [`Validator::validate_cmd`] reads the static row for the command and the
//! buffer's record state and nothing else. Every gate is evaluated; the
//! results are OR-ed, so one call may produce several reports.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{ActiveRenderPass, CbState, CommandBuffer, SuspendState};
use crate::command::{describe_queue_flags, Func, Scope};
use crate::error_sink::Location;
use crate::validator::Validator;

/// Reported for commands recorded into an invalidated command buffer.
pub const INVALID_COMMAND_BUFFER: &str = "UNASSIGNED-CoreValidation-DrawState-InvalidCommandBuffer";
/// Inline commands inside a subpass that expects secondary command buffers.
pub const INVALID_SUBPASS_CONTENTS: &str = "UNASSIGNED-CoreValidation-DrawState-InvalidSubpassContents";

impl Validator {
    pub fn validate_cmd(&self, cb: &CommandBuffer, func: Func) -> bool {
        let info = func.info();
        let loc = Location::new(info.name);
        let objects = [cb.typed()];
        let mut skip = false;

        match cb.state {
            CbState::Recording => skip |= self.validate_cmd_subpass_state(cb, func, &loc),
            CbState::InvalidIncomplete | CbState::InvalidComplete => {
                skip |= self.report_invalid_command_buffer(cb, &loc, INVALID_COMMAND_BUFFER)
            }
            CbState::New => {
                skip |= self.log_error(
                    info.vuids.recording,
                    &objects,
                    &loc,
                    format!("was called in {} before vkBeginCommandBuffer().", cb.typed()),
                )
            }
            CbState::Recorded => {}
        }
        if matches!(cb.state, CbState::Recorded | CbState::InvalidComplete) {
            skip |= self.log_error(
                info.vuids.recording,
                &objects,
                &loc,
                format!(
                    "was called in {} which is not in the recording state (vkEndCommandBuffer() has been called).",
                    cb.typed()
                ),
            );
        }

        if let Some(available) = self.device().queue_family_flags(cb.queue_family_index) {
            if !available.intersects(info.queue_flags) {
                skip |= self.log_error(
                    info.vuids.queue_flags,
                    &[cb.typed(), TypedHandle::new(cb.command_pool)],
                    &loc,
                    format!(
                        "{} was allocated from {} on queue family index {} which supports {}, \
                         but the command requires one of {}.",
                        cb.typed(),
                        TypedHandle::new(cb.command_pool),
                        cb.queue_family_index,
                        describe_queue_flags(available),
                        describe_queue_flags(info.queue_flags)
                    ),
                );
            }
        }

        let nested_allowed = func == Func::CmdExecuteCommands && self.device().features().nested_command_buffer;
        if info.primary_only && cb.is_secondary() && !nested_allowed {
            skip |= self.log_error(
                info.vuids.buffer_level,
                &objects,
                &loc,
                format!("{} is a secondary command buffer; this command is only allowed in primaries.", cb.typed()),
            );
        }

        match (info.render_pass, &cb.render_pass) {
            (Scope::Inside, None) => {
                skip |= self.log_error(
                    info.vuids.render_pass,
                    &objects,
                    &loc,
                    "can only be called inside of a render pass.".to_string(),
                );
            }
            (Scope::Outside, Some(active)) => {
                skip |= self.log_error(
                    info.vuids.render_pass,
                    &objects,
                    &loc,
                    format!("can only be called outside of a render pass, but a {} instance is active.", active.describe()),
                );
            }
            _ => {}
        }

        if cb.last_suspend_state == SuspendState::Suspended
            && cb.render_pass.is_none()
            && (info.is_action() || info.is_synchronization())
        {
            skip |= self.log_error(
                info.vuids.suspended,
                &objects,
                &loc,
                "was recorded between a suspended render pass instance and the instance that resumes it.".to_string(),
            );
        }

        match (info.video_coding, cb.video_session) {
            (Scope::Inside, None) => {
                skip |= self.log_error(
                    info.vuids.video_coding,
                    &objects,
                    &loc,
                    "can only be called inside of a video coding scope.".to_string(),
                );
            }
            (Scope::Outside, Some(session)) => {
                skip |= self.log_error(
                    info.vuids.video_coding,
                    &[cb.typed(), TypedHandle::new(session)],
                    &loc,
                    format!(
                        "can only be called outside of a video coding scope, but {} is bound.",
                        TypedHandle::new(session)
                    ),
                );
            }
            _ => {}
        }

        skip
    }

    fn validate_cmd_subpass_state(&self, cb: &CommandBuffer, func: Func, loc: &Location) -> bool {
        let Some(ActiveRenderPass::Legacy(rp)) = &cb.render_pass else {
            return false;
        };
        let allowed = matches!(
            func,
            Func::CmdExecuteCommands | Func::CmdNextSubpass | Func::CmdEndRenderPass
        );
        if rp.contents != vk::SubpassContents::SECONDARY_COMMAND_BUFFERS || allowed {
            return false;
        }
        self.log_error(
            INVALID_SUBPASS_CONTENTS,
            &[cb.typed(), TypedHandle::new(rp.render_pass)],
            loc,
            format!(
                "cannot be called in subpass {} which uses VK_SUBPASS_CONTENTS_SECONDARY_COMMAND_BUFFERS.",
                rp.subpass
            ),
        )
    }

    /// One report enumerating every broken binding of an invalid buffer.
    pub fn report_invalid_command_buffer(&self, cb: &CommandBuffer, loc: &Location, vuid: &str) -> bool {
        let mut objects = vec![cb.typed()];
        let mut causes = Vec::with_capacity(cb.broken_bindings.len());
        for binding in &cb.broken_bindings {
            objects.push(binding.object);
            for referrer in &binding.referenced_by {
                if !objects.contains(referrer) {
                    objects.push(*referrer);
                }
            }
            let reason = match binding.object.object_type {
                vk::ObjectType::DESCRIPTOR_SET => {
                    "destroyed or updated without VK_DESCRIPTOR_BINDING_UPDATE_AFTER_BIND_BIT"
                }
                vk::ObjectType::COMMAND_BUFFER => "destroyed or rerecorded",
                _ => "destroyed",
            };
            causes.push(format!("bound {} was {}", binding.object, reason));
        }

        let message = if causes.is_empty() {
            format!("{} is invalid.", cb.typed())
        } else {
            format!("{} is invalid because {}.", cb.typed(), causes.join(", and "))
        };
        self.log_error(vuid, &objects, loc, message)
    }
}
