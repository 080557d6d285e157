//! Submit-time effects recorded as data.
//!
//! Recording pushes these in command order; submission and retirement replay
//! them in the same order through the interpreters below. Payloads are plain
//! handles and masks, so a replay never touches state captured by reference
//! at record time. The one composite variant, [`QueryUpdate::ExecuteSecondary`],
//! looks its secondary up again when it runs.

use std::collections::HashMap;

use ash::vk;
use tracing::trace;

use vkvl_core::TypedHandle;

use crate::error_sink::Location;
use crate::image_layout::{LayoutRegistry, RENDERING_LOCAL_READ};
use crate::objects::EventSignal;
use crate::query::{QueryMap, QueryObject, QueryState};
use crate::validator::Validator;

pub type EventMap = HashMap<vk::Event, EventSignal>;

/// Everything a replayed effect may consult.
pub struct ReplayContext<'a> {
    pub validator: &'a Validator,
    /// Submitted (primary) command buffer the effects belong to
    pub command_buffer: TypedHandle,
    pub loc: &'a Location,
    /// Report violations; false during retirement
    pub do_validate: bool,
    /// Performance counter pass of the submission
    pub perf_pass: u32,
    pub queue_family: u32,
}

impl ReplayContext<'_> {
    fn log_error(&self, vuid: &str, objects: &[TypedHandle], message: String) -> bool {
        self.validator.log_error(vuid, objects, self.loc, message)
    }
}

// ── Events ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventUpdate {
    Set {
        event: vk::Event,
        stage_mask: vk::PipelineStageFlags2,
    },
    Reset {
        event: vk::Event,
    },
    Wait {
        events: Vec<vk::Event>,
        src_stage_mask: vk::PipelineStageFlags2,
    },
}

impl EventUpdate {
    pub fn apply(&self, ctx: &ReplayContext<'_>, events: &mut EventMap) -> bool {
        match self {
            EventUpdate::Set { event, stage_mask } => {
                trace!("replay set event {:?}", event);
                events.insert(
                    *event,
                    EventSignal {
                        signaled: true,
                        stage_mask: *stage_mask,
                    },
                );
                false
            }
            EventUpdate::Reset { event } => {
                trace!("replay reset event {:?}", event);
                events.insert(*event, EventSignal::default());
                false
            }
            EventUpdate::Wait {
                events: waited,
                src_stage_mask,
            } => {
                if !ctx.do_validate {
                    return false;
                }
                validate_wait_events(ctx, waited, *src_stage_mask, events)
            }
        }
    }
}

fn validate_wait_events(
    ctx: &ReplayContext<'_>,
    waited: &[vk::Event],
    src_stage_mask: vk::PipelineStageFlags2,
    events: &EventMap,
) -> bool {
    let mut skip = false;
    let mut stage_mask = vk::PipelineStageFlags2::empty();
    for event in waited {
        if let Some(local) = events.get(event) {
            stage_mask |= local.stage_mask;
            continue;
        }
        match ctx.validator.device().event(*event) {
            Some(state) => stage_mask |= state.signal().stage_mask,
            None => {
                skip |= ctx.log_error(
                    "UNASSIGNED-CoreValidation-DrawState-InvalidEvent",
                    &[ctx.command_buffer, TypedHandle::new(*event)],
                    format!("{} cannot be waited on if it has never been set.", TypedHandle::new(*event)),
                );
            }
        }
    }

    if src_stage_mask != stage_mask && src_stage_mask != (stage_mask | vk::PipelineStageFlags2::HOST) {
        let mut objects = vec![ctx.command_buffer];
        objects.extend(waited.iter().map(|e| TypedHandle::new(*e)));
        skip |= ctx.log_error(
            "VUID-vkCmdWaitEvents-srcStageMask-01158",
            &objects,
            format!(
                "srcStageMask {:?} must be the bitwise OR of the stageMask parameters used in calls to \
                 vkCmdSetEvent and VK_PIPELINE_STAGE_HOST_BIT if used with vkSetEvent but instead is {:?}.",
                src_stage_mask, stage_mask
            ),
        );
    }
    skip
}

// ── Queries ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryUpdate {
    Begin { query: QueryObject },
    End { query: QueryObject },
    /// Multiview render passes end one query per view
    EndQueries {
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    },
    Reset {
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    },
    WriteTimestamp { query: QueryObject },
    /// Replays the secondary's own query updates, resolved at replay time
    ExecuteSecondary { secondary: vk::CommandBuffer },
}

impl QueryUpdate {
    pub fn apply(&self, ctx: &ReplayContext<'_>, queries: &mut QueryMap) -> bool {
        let mut skip = false;
        match self {
            QueryUpdate::Begin { query } => {
                let query = query.with_perf_pass(ctx.perf_pass);
                trace!("replay begin query {}", query);
                if ctx.do_validate {
                    skip |= verify_query_is_reset(ctx, queries, &query, "VUID-vkCmdBeginQuery-None-00807");
                }
                queries.insert(query, QueryState::Running);
            }
            QueryUpdate::End { query } => {
                let query = query.with_perf_pass(ctx.perf_pass);
                trace!("replay end query {}", query);
                queries.insert(query, QueryState::Ended);
            }
            QueryUpdate::EndQueries { pool, first, count } => {
                for slot in *first..first.saturating_add(*count) {
                    let query = QueryObject::new(*pool, slot).with_perf_pass(ctx.perf_pass);
                    queries.insert(query, QueryState::Ended);
                }
            }
            QueryUpdate::Reset { pool, first, count } => {
                trace!("replay reset of {} queries in {:?}", count, pool);
                for slot in *first..first.saturating_add(*count) {
                    let query = QueryObject::new(*pool, slot).with_perf_pass(ctx.perf_pass);
                    queries.insert(query, QueryState::Reset);
                }
            }
            QueryUpdate::WriteTimestamp { query } => {
                let query = query.with_perf_pass(ctx.perf_pass);
                if ctx.do_validate {
                    skip |= verify_query_is_reset(ctx, queries, &query, "VUID-vkCmdWriteTimestamp-None-00830");
                }
                queries.insert(query, QueryState::Ended);
            }
            QueryUpdate::ExecuteSecondary { secondary } => {
                trace!("replay query updates of secondary {:?}", secondary);
                // The caller holds the primary's lock; the secondary is
                // locked second, only for the duration of its replay.
                let replayed = ctx.validator.device().with_read(*secondary, |cb| {
                    let mut skip = false;
                    for update in cb.query_updates.iter() {
                        skip |= update.apply(ctx, queries);
                    }
                    skip
                });
                skip |= replayed.unwrap_or(false);
            }
        }
        skip
    }
}

fn verify_query_is_reset(
    ctx: &ReplayContext<'_>,
    queries: &QueryMap,
    query: &QueryObject,
    vuid: &str,
) -> bool {
    if !ctx.validator.config().queries {
        return false;
    }
    let state = queries
        .get(query)
        .copied()
        .unwrap_or_else(|| ctx.validator.device().query_state(query));
    if state == QueryState::Reset {
        return false;
    }
    ctx.log_error(
        vuid,
        &[ctx.command_buffer, TypedHandle::new(query.pool)],
        format!("{} is in state {:?} and must be reset before being used.", query, state),
    )
}

// ── Submit-time checks ──────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SubmitCheck {
    /// Barrier on a dynamic rendering attachment; `recorded` is the layout
    /// the buffer itself had established when the barrier was recorded.
    AttachmentLayout {
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        recorded: Option<vk::ImageLayout>,
    },
    /// Queue family ownership transfer
    QueueFamilyOwnership {
        object: TypedHandle,
        src_queue_family: u32,
        dst_queue_family: u32,
    },
}

impl SubmitCheck {
    pub fn run(&self, ctx: &ReplayContext<'_>, layouts: &LayoutRegistry) -> bool {
        match self {
            SubmitCheck::AttachmentLayout {
                image,
                range,
                recorded,
            } => {
                if !ctx.validator.config().image_layout {
                    return false;
                }
                let layout = match recorded {
                    Some(layout) => Some(*layout),
                    None => submitted_layout(ctx.validator, *image, range, layouts),
                };
                match layout {
                    Some(layout) if layout != vk::ImageLayout::GENERAL && layout != RENDERING_LOCAL_READ => ctx
                        .log_error(
                            "VUID-vkCmdPipelineBarrier-image-09555",
                            &[ctx.command_buffer, TypedHandle::new(*image)],
                            format!(
                                "image barrier inside dynamic rendering uses {} in layout {:?}, \
                                 but attachments must be in VK_IMAGE_LAYOUT_GENERAL or \
                                 VK_IMAGE_LAYOUT_RENDERING_LOCAL_READ_KHR.",
                                TypedHandle::new(*image),
                                layout
                            ),
                        ),
                    _ => false,
                }
            }
            SubmitCheck::QueueFamilyOwnership {
                object,
                src_queue_family,
                dst_queue_family,
            } => {
                if ctx.queue_family == *src_queue_family || ctx.queue_family == *dst_queue_family {
                    return false;
                }
                ctx.log_error(
                    "VUID-vkQueueSubmit-pSubmits-04626",
                    &[ctx.command_buffer, *object],
                    format!(
                        "barrier submitted to queue with family index {}, using srcQueueFamilyIndex {} \
                         and dstQueueFamilyIndex {}. Source or destination queue family must match \
                         submit queue family.",
                        ctx.queue_family, src_queue_family, dst_queue_family
                    ),
                )
            }
        }
    }
}

/// First known layout of `range` as of this point in a submission: the
/// submission's own accumulated layouts, else the device-wide layout.
fn submitted_layout(
    validator: &Validator,
    image: vk::Image,
    range: &vk::ImageSubresourceRange,
    layouts: &LayoutRegistry,
) -> Option<vk::ImageLayout> {
    let state = validator.device().image(image)?;
    let local = layouts.get(&image);
    let subresources = crate::image_layout::subresources(range, state.info.mip_levels, state.info.array_layers);
    let first = subresources.first()?;
    Some(
        local
            .and_then(|map| map.current(first))
            .unwrap_or_else(|| state.current_layout(first)),
    )
}
