//! Submit-time replay of recorded effects.
//!
//! A submission walks three phases. PreSubmit runs the checks recordings
//! queued for submit time. Validate replays every command buffer in batch
//! order against state accumulated from the buffers before it in the same
//! call. Update commits that state device-wide. Retirement happens later,
//! once the submission is known complete, and finalizes query state in
//! completion order.

use ash::vk::{self, Handle};
use tracing::{debug, trace};

use vkvl_core::TypedHandle;

use crate::deferred::{EventMap, ReplayContext};
use crate::error_sink::Location;
use crate::image_layout::LayoutRegistry;
use crate::query::{QueryMap, QueryState};
use crate::queue::QueueSubmission;
use crate::validator::Validator;

pub const INVALID_IMAGE_LAYOUT: &str = "UNASSIGNED-CoreValidation-DrawState-InvalidImageLayout";
pub const TIMELINE_SIGNAL_VALUE: &str = "VUID-VkSubmitInfo-pSignalSemaphores-03242";
pub const PRESENT_IMAGE_LAYOUT: &str = "VUID-VkPresentInfoKHR-pImageIndices-01430";

pub struct QueueSubmissionValidator<'a> {
    validator: &'a Validator,
    queue_family: u32,
    /// Layouts left by the buffers replayed so far
    layouts: LayoutRegistry,
    events: EventMap,
    queries: QueryMap,
}

impl<'a> QueueSubmissionValidator<'a> {
    pub fn new(validator: &'a Validator, queue_family: u32) -> Self {
        Self {
            validator,
            queue_family,
            layouts: LayoutRegistry::new(),
            events: EventMap::new(),
            queries: QueryMap::new(),
        }
    }

    fn context<'c>(&'c self, command_buffer: vk::CommandBuffer, loc: &'c Location, perf_pass: u32) -> ReplayContext<'c> {
        ReplayContext {
            validator: self.validator,
            command_buffer: TypedHandle::new(command_buffer),
            loc,
            do_validate: true,
            perf_pass,
            queue_family: self.queue_family,
        }
    }

    /// Run every check the submitted buffers queued for submit time.
    pub fn pre_submit(&mut self, submission: &QueueSubmission) -> bool {
        let mut skip = false;
        for (batch, index, handle) in submission.command_buffers() {
            let loc = command_buffer_location(batch, index);
            let perf_pass = submission.batches[batch].perf_pass_index;
            let ctx = self.context(handle, &loc, perf_pass);
            let checked = self.validator.device().with_read(handle, |cb| {
                let mut skip = false;
                for check in cb.submit_checks.iter() {
                    skip |= check.run(&ctx, &self.layouts);
                }
                (skip, cb.image_layouts.clone())
            });
            if let Some((checked, layouts)) = checked {
                skip |= checked;
                self.accumulate_layouts(&layouts);
            }
        }
        skip
    }

    pub fn validate(&mut self, submission: &QueueSubmission) -> bool {
        let mut skip = self.validate_timeline_signals(submission);

        for (batch, index, handle) in submission.command_buffers() {
            let loc = command_buffer_location(batch, index);
            let perf_pass = submission.batches[batch].perf_pass_index;
            let mut events = std::mem::take(&mut self.events);
            let mut queries = std::mem::take(&mut self.queries);
            let recorded = self.validator.device().with_read(handle, |cb| {
                let ctx = self.context(handle, &loc, perf_pass);
                let mut skip = self.validate_image_layouts(handle, &cb.image_layouts, &loc);
                for update in cb.event_updates.iter() {
                    skip |= update.apply(&ctx, &mut events);
                }
                for update in cb.query_updates.iter() {
                    skip |= update.apply(&ctx, &mut queries);
                }
                (skip, cb.image_layouts.clone())
            });
            self.events = events;
            self.queries = queries;
            if let Some((checked, layouts)) = recorded {
                skip |= checked;
                self.accumulate_layouts(&layouts);
            }
        }

        if let Some(present) = submission.present {
            skip |= self.validate_present(present.image, present.swapchain);
        }
        skip
    }

    fn validate_timeline_signals(&self, submission: &QueueSubmission) -> bool {
        let mut skip = false;
        for (batch, submit) in submission.batches.iter().enumerate() {
            for (index, signal) in submit.signal_semaphores.iter().enumerate() {
                let Some(semaphore) = self.validator.device().semaphore(signal.semaphore) else {
                    continue;
                };
                if !semaphore.is_timeline() {
                    continue;
                }
                let completed = semaphore.completed_payload();
                if signal.value < completed {
                    let loc = Location::new("vkQueueSubmit")
                        .index("pSubmits", batch)
                        .index("pSignalSemaphores", index);
                    skip |= self.validator.log_error(
                        TIMELINE_SIGNAL_VALUE,
                        &[TypedHandle::new(signal.semaphore)],
                        &loc,
                        format!(
                            "signal value ({}) in {} must be greater than current timeline semaphore value ({}); \
                             the signaled value is smaller.",
                            signal.value,
                            TypedHandle::new(signal.semaphore),
                            completed
                        ),
                    );
                }
            }
        }
        skip
    }

    /// Each buffer's expected initial layouts against what the buffers
    /// before it in this submission (or device-wide state) left behind.
    fn validate_image_layouts(&self, handle: vk::CommandBuffer, recorded: &LayoutRegistry, loc: &Location) -> bool {
        if !self.validator.config().image_layout {
            return false;
        }
        let mut skip = false;
        for (image, map) in recorded.iter() {
            let Some(state) = self.validator.device().image(*image) else {
                continue;
            };
            let local = self.layouts.get(image);
            for (sub, entry) in map.iter() {
                let Some(expected) = entry.initial else {
                    continue;
                };
                if expected == vk::ImageLayout::UNDEFINED {
                    continue;
                }
                let actual = local
                    .and_then(|m| m.current(sub))
                    .unwrap_or_else(|| state.current_layout(sub));
                if actual != expected {
                    skip |= self.validator.log_error(
                        INVALID_IMAGE_LAYOUT,
                        &[TypedHandle::new(handle), TypedHandle::new(*image)],
                        loc,
                        format!(
                            "{} expects {} (aspect {:?}, mipLevel {}, arrayLayer {}) to be in layout {:?} \
                             but its current layout is {:?}.",
                            TypedHandle::new(handle),
                            TypedHandle::new(*image),
                            sub.aspect_flags(),
                            sub.mip_level,
                            sub.array_layer,
                            expected,
                            actual
                        ),
                    );
                    // One report per image.
                    break;
                }
            }
        }
        skip
    }

    fn validate_present(&self, image: vk::Image, swapchain: vk::SwapchainKHR) -> bool {
        if !self.validator.config().image_layout {
            return false;
        }
        let Some(state) = self.validator.device().image(image) else {
            return false;
        };
        let local = self.layouts.get(&image);
        let range = state.full_range();
        for sub in crate::image_layout::subresources(&range, state.info.mip_levels, state.info.array_layers) {
            let layout = local
                .and_then(|m| m.current(&sub))
                .unwrap_or_else(|| state.current_layout(&sub));
            if layout != vk::ImageLayout::PRESENT_SRC_KHR && layout != vk::ImageLayout::SHARED_PRESENT_KHR {
                return self.validator.log_error(
                    PRESENT_IMAGE_LAYOUT,
                    &[TypedHandle::new(swapchain), TypedHandle::new(image)],
                    &Location::new("vkQueuePresentKHR").dot("pImageIndices"),
                    format!(
                        "{} of {} is in layout {:?} but must be in VK_IMAGE_LAYOUT_PRESENT_SRC_KHR or \
                         VK_IMAGE_LAYOUT_SHARED_PRESENT_KHR when presented.",
                        TypedHandle::new(image),
                        TypedHandle::new(swapchain),
                        layout
                    ),
                );
            }
        }
        false
    }

    fn accumulate_layouts(&mut self, recorded: &LayoutRegistry) {
        for (image, map) in recorded {
            let Some(state) = self.validator.device().image(*image) else {
                continue;
            };
            self.layouts
                .entry(*image)
                .or_insert_with(|| state.new_layout_map())
                .merge(map);
        }
    }

    /// Commit the replayed state device-wide.
    pub fn update(&self, submission: &QueueSubmission) {
        let device = self.validator.device();
        for (_, _, handle) in submission.command_buffers() {
            device.with_read(handle, |cb| {
                for secondary in &cb.linked_command_buffers {
                    device.with_read(*secondary, |secondary| commit_layouts(self.validator, &secondary.image_layouts));
                }
                commit_layouts(self.validator, &cb.image_layouts);
            });
        }
        for (event, signal) in &self.events {
            if let Some(state) = device.event(*event) {
                state.set_signal(*signal);
            }
        }
        device.commit_query_states(&self.queries);
        debug!(
            "submission {} updated {} event(s), {} quer(ies)",
            submission.seq,
            self.events.len(),
            self.queries.len()
        );
    }
}

fn commit_layouts(validator: &Validator, layouts: &LayoutRegistry) {
    for (image, map) in layouts {
        if let Some(state) = validator.device().image(*image) {
            state.commit_layouts(map);
        }
    }
}

fn command_buffer_location(batch: usize, index: usize) -> Location {
    Location::new("vkQueueSubmit")
        .index("pSubmits", batch)
        .index("pCommandBuffers", index)
}

/// Final query states of a submission, replayed without validation.
pub fn replay_submission_queries(validator: &Validator, submission: &QueueSubmission) -> QueryMap {
    let family = validator
        .device()
        .queue(submission.queue)
        .map(|q| q.family_index)
        .unwrap_or(vk::QUEUE_FAMILY_IGNORED);
    let mut queries = QueryMap::new();
    for (batch, index, handle) in submission.command_buffers() {
        let loc = command_buffer_location(batch, index);
        let ctx = ReplayContext {
            validator,
            command_buffer: TypedHandle::new(handle),
            loc: &loc,
            do_validate: false,
            perf_pass: submission.batches[batch].perf_pass_index,
            queue_family: family,
        };
        validator.device().with_read(handle, |cb| {
            for update in cb.query_updates.iter() {
                update.apply(&ctx, &mut queries);
            }
        });
    }
    queries
}

/// Finalize a completed submission. It must already be off its queue's
/// pending list; everything still pending counts as retiring later.
pub fn retire(validator: &Validator, submission: &QueueSubmission) {
    let device = validator.device();
    let queries = replay_submission_queries(validator, submission);

    let later: Vec<QueryMap> = device
        .queues()
        .iter()
        .flat_map(|queue| queue.pending_snapshot())
        .filter(|pending| pending.seq != submission.seq)
        .map(|pending| replay_submission_queries(validator, &pending))
        .collect();

    for (query, state) in queries {
        if state != QueryState::Ended {
            continue;
        }
        if later.iter().any(|pending| pending.contains_key(&query)) {
            trace!("{} superseded by a later submission", query);
            continue;
        }
        device.set_query_state(query, QueryState::Available);
    }

    for submit in &submission.batches {
        for signal in &submit.signal_semaphores {
            if let Some(semaphore) = device.semaphore(signal.semaphore) {
                if semaphore.is_timeline() {
                    semaphore.advance(signal.value);
                }
            }
        }
    }

    for (_, _, handle) in submission.command_buffers() {
        let secondaries = device
            .with_write(handle, |cb| {
                cb.in_use = cb.in_use.saturating_sub(1);
                cb.linked_command_buffers.clone()
            })
            .unwrap_or_default();
        for secondary in secondaries {
            device.with_write(secondary, |cb| cb.in_use = cb.in_use.saturating_sub(1));
        }
    }
    debug!(
        "retired submission {} on queue 0x{:x}",
        submission.seq,
        submission.queue.as_raw()
    );
}
