//! vkQueueSubmit, vkQueuePresentKHR, completion and host semaphore signals.

use std::collections::HashSet;

use ash::vk::{self, Handle};
use tracing::debug;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{CbState, CommandBuffer};
use crate::error_sink::Location;
use crate::queue::{PresentedImage, QueueSubmission, SubmitInfo};
use crate::submission::{retire, QueueSubmissionValidator, TIMELINE_SIGNAL_VALUE};
use crate::validator::Validator;

pub const SINGLE_SUBMIT_VIOLATION: &str = "UNASSIGNED-CoreValidation-DrawState-CommandBufferSingleSubmitViolation";

impl Validator {
    fn queue_family(&self, queue: vk::Queue) -> u32 {
        self.device()
            .queue(queue)
            .map(|q| q.family_index)
            .unwrap_or(vk::QUEUE_FAMILY_IGNORED)
    }

    pub fn pre_call_validate_queue_submit(&self, queue: vk::Queue, submits: &[SubmitInfo]) -> bool {
        let family = self.queue_family(queue);
        let mut skip = false;

        let mut seen = HashSet::new();
        for (batch, submit) in submits.iter().enumerate() {
            for (index, handle) in submit.command_buffers.iter().enumerate() {
                let loc = Location::new("vkQueueSubmit")
                    .index("pSubmits", batch)
                    .index("pCommandBuffers", index);
                let repeated = !seen.insert(*handle);
                skip |= self.validate_with(*handle, |cb| {
                    self.validate_submitted_command_buffer(cb, queue, family, repeated, &loc)
                });
            }

            for (index, signal) in submit.signal_semaphores.iter().enumerate() {
                let Some(semaphore) = self.device().semaphore(signal.semaphore) else {
                    continue;
                };
                if semaphore.is_timeline() && signal.value == semaphore.completed_payload() {
                    skip |= self.log_error(
                        TIMELINE_SIGNAL_VALUE,
                        &[TypedHandle::new(queue), TypedHandle::new(signal.semaphore)],
                        &Location::new("vkQueueSubmit")
                            .index("pSubmits", batch)
                            .index("pSignalSemaphores", index),
                        format!(
                            "signal value ({}) in {} must be greater than current timeline semaphore value ({}).",
                            signal.value,
                            TypedHandle::new(signal.semaphore),
                            semaphore.completed_payload()
                        ),
                    );
                }
            }
        }

        let submission = QueueSubmission {
            queue,
            seq: 0,
            batches: submits.to_vec(),
            present: None,
        };
        skip |= QueueSubmissionValidator::new(self, family).pre_submit(&submission);
        skip
    }

    fn validate_submitted_command_buffer(
        &self,
        cb: &CommandBuffer,
        queue: vk::Queue,
        family: u32,
        repeated: bool,
        loc: &Location,
    ) -> bool {
        let mut skip = false;
        let objects = [cb.typed()];

        if !cb.is_primary() {
            skip |= self.log_error(
                "VUID-VkSubmitInfo-pCommandBuffers-00075",
                &objects,
                loc,
                format!("{} is not VK_COMMAND_BUFFER_LEVEL_PRIMARY.", cb.typed()),
            );
        }

        if cb.state.is_invalid() {
            skip |= self.report_invalid_command_buffer(cb, loc, "VUID-vkQueueSubmit-pCommandBuffers-00070");
        } else if cb.state != CbState::Recorded {
            skip |= self.log_error(
                "VUID-vkQueueSubmit-pCommandBuffers-00070",
                &objects,
                loc,
                format!(
                    "{} is in state {:?}; it must be ended with vkEndCommandBuffer() before submission.",
                    cb.typed(),
                    cb.state
                ),
            );
        }

        if !cb.has_usage(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE) && (cb.is_in_use() || repeated) {
            skip |= self.log_error(
                "VUID-vkQueueSubmit-pCommandBuffers-00071",
                &objects,
                loc,
                format!(
                    "{} is already in use and is not marked for simultaneous use.",
                    cb.typed()
                ),
            );
        }

        if cb.has_usage(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT) && (cb.submit_count > 0 || repeated) {
            skip |= self.log_error(
                SINGLE_SUBMIT_VIOLATION,
                &objects,
                loc,
                format!(
                    "{} was begun with VK_COMMAND_BUFFER_USAGE_ONE_TIME_SUBMIT_BIT set, but has been submitted {} \
                     time(s).",
                    cb.typed(),
                    cb.submit_count + u32::from(repeated)
                ),
            );
        }

        if family != vk::QUEUE_FAMILY_IGNORED && cb.queue_family_index != family {
            skip |= self.log_error(
                "VUID-vkQueueSubmit-pCommandBuffers-00074",
                &[cb.typed(), TypedHandle::new(cb.command_pool), TypedHandle::new(queue)],
                loc,
                format!(
                    "Primary {} created in queue family {} is being submitted on {} from queue family {}.",
                    cb.typed(),
                    cb.queue_family_index,
                    TypedHandle::new(queue),
                    family
                ),
            );
        }

        for secondary in &cb.linked_command_buffers {
            skip |= self.validate_with(*secondary, |secondary| {
                if secondary.state != CbState::Recorded {
                    return self.log_error(
                        "VUID-vkQueueSubmit-pCommandBuffers-00072",
                        &[cb.typed(), secondary.typed()],
                        loc,
                        format!(
                            "{} executes secondary {} which is in state {:?}, not the executable state.",
                            cb.typed(),
                            secondary.typed(),
                            secondary.state
                        ),
                    );
                }
                if secondary.is_in_use() && !secondary.has_usage(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE) {
                    return self.log_error(
                        "VUID-vkQueueSubmit-pCommandBuffers-00072",
                        &[cb.typed(), secondary.typed()],
                        loc,
                        format!(
                            "{} executes secondary {} which is pending elsewhere and was not begun with \
                             VK_COMMAND_BUFFER_USAGE_SIMULTANEOUS_USE_BIT.",
                            cb.typed(),
                            secondary.typed()
                        ),
                    );
                }
                false
            });
        }
        skip
    }

    /// Replay and commit the submission, then leave it pending on `queue`.
    /// Returns the sequence number that identifies it at retirement.
    pub fn post_call_record_queue_submit(&self, queue: vk::Queue, submits: &[SubmitInfo]) -> u64 {
        let family = self.queue_family(queue);
        let submission = QueueSubmission {
            queue,
            seq: self.device().next_submission_seq(),
            batches: submits.to_vec(),
            present: None,
        };

        let mut replay = QueueSubmissionValidator::new(self, family);
        // The call already happened; Validate's reports are with the sink.
        let _ = replay.validate(&submission);
        replay.update(&submission);

        for (_, _, handle) in submission.command_buffers() {
            let secondaries = self
                .device()
                .with_write(handle, |cb| {
                    cb.in_use += 1;
                    cb.submit_count += 1;
                    cb.linked_command_buffers.clone()
                })
                .unwrap_or_default();
            for secondary in secondaries {
                self.device().with_write(secondary, |cb| cb.in_use += 1);
            }
        }

        let seq = submission.seq;
        debug!(
            "submission {} on queue 0x{:x}: {} batch(es)",
            seq,
            queue.as_raw(),
            submission.batches.len()
        );
        match self.device().queue(queue) {
            Some(state) => state.push(submission),
            // Nothing will ever retire work on an untracked queue.
            None => retire(self, &submission),
        }
        seq
    }

    pub fn pre_call_validate_queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image: vk::Image,
    ) -> bool {
        let submission = QueueSubmission {
            queue,
            seq: 0,
            batches: Vec::new(),
            present: Some(PresentedImage { swapchain, image }),
        };
        QueueSubmissionValidator::new(self, self.queue_family(queue)).validate(&submission)
    }

    /// A single submission completed, possibly ahead of older ones.
    pub fn retire_submission(&self, queue: vk::Queue, seq: u64) {
        let Some(state) = self.device().queue(queue) else {
            return;
        };
        if let Some(submission) = state.take(seq) {
            retire(self, &submission);
        }
    }

    /// Every submission on `queue` up to and including `seq` completed, in order.
    pub fn retire_through(&self, queue: vk::Queue, seq: u64) {
        let Some(state) = self.device().queue(queue) else {
            return;
        };
        // One at a time, so the younger ones still count as pending.
        for pending in state.pending_snapshot() {
            if pending.seq > seq {
                break;
            }
            if let Some(submission) = state.take(pending.seq) {
                retire(self, &submission);
            }
        }
    }

    pub fn queue_wait_idle(&self, queue: vk::Queue) {
        self.retire_through(queue, u64::MAX);
    }

    pub fn device_wait_idle(&self) {
        for queue in self.device().queues() {
            self.retire_through(queue.handle, u64::MAX);
        }
    }

    pub fn pre_call_validate_signal_semaphore(&self, semaphore: vk::Semaphore, value: u64) -> bool {
        let Some(state) = self.device().semaphore(semaphore) else {
            return false;
        };
        if !state.is_timeline() || value > state.completed_payload() {
            return false;
        }
        self.log_error(
            "VUID-VkSemaphoreSignalInfo-value-03258",
            &[TypedHandle::new(semaphore)],
            &Location::new("vkSignalSemaphore").dot("pSignalInfo").dot("value"),
            format!(
                "({}) must be greater than current semaphore {} value ({}).",
                value,
                TypedHandle::new(semaphore),
                state.completed_payload()
            ),
        )
    }

    pub fn record_signal_semaphore(&self, semaphore: vk::Semaphore, value: u64) {
        if let Some(state) = self.device().semaphore(semaphore) {
            state.advance(value);
        }
    }
}
