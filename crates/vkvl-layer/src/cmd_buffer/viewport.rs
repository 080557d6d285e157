//! Dynamic viewport and scissor bookkeeping for one recording.
//!
//! Every mask is a bitset over viewport/scissor slots. A slot is "set" once
//! a `vkCmdSet*` call defines it and "trashed" once a pipeline with static
//! state for that slot is bound afterwards; a later set un-trashes it.

use ash::vk;

use crate::objects::PipelineInfo;

/// Number of viewport/scissor slots tracked per command buffer.
pub const MAX_VIEWPORTS: usize = 32;

const _: () = assert!(
    MAX_VIEWPORTS == u32::BITS as usize,
    "MAX_VIEWPORTS must match the viewport mask bit width"
);

/// Mask with bits `[first, first + count)` set, clamped to the tracked slots.
pub fn slot_range_mask(first: u32, count: u32) -> u32 {
    let end = first.saturating_add(count).min(MAX_VIEWPORTS as u32);
    if first >= end {
        return 0;
    }
    let upper = if end == u32::BITS { u32::MAX } else { (1u32 << end) - 1 };
    let lower = (1u32 << first) - 1;
    upper & !lower
}

fn empty_viewport() -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
        min_depth: 0.0,
        max_depth: 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct ViewportScissorState {
    pub viewport_mask: u32,
    pub viewport_with_count_mask: u32,
    pub viewport_trashed_mask: u32,
    pub viewport_trashed_count: bool,
    /// Last count passed to vkCmdSetViewportWithCount (0 = never)
    pub viewport_with_count_count: u32,

    pub scissor_mask: u32,
    pub scissor_with_count_mask: u32,
    pub scissor_trashed_mask: u32,
    pub scissor_trashed_count: bool,
    pub scissor_with_count_count: u32,

    pub viewports: [vk::Viewport; MAX_VIEWPORTS],

    /// Largest static viewport/scissor count of any pipeline drawn with
    pub used_viewport_scissor_count: u32,
    /// Some draw used a pipeline with dynamic viewport count
    pub used_dynamic_viewport_count: bool,
    pub used_dynamic_scissor_count: bool,

    /// Depth ranges a secondary declared it inherits; empty = no inheritance
    pub inherited_viewport_depths: Vec<vk::Viewport>,
}

impl Default for ViewportScissorState {
    fn default() -> Self {
        Self {
            viewport_mask: 0,
            viewport_with_count_mask: 0,
            viewport_trashed_mask: 0,
            viewport_trashed_count: false,
            viewport_with_count_count: 0,
            scissor_mask: 0,
            scissor_with_count_mask: 0,
            scissor_trashed_mask: 0,
            scissor_trashed_count: false,
            scissor_with_count_count: 0,
            viewports: [empty_viewport(); MAX_VIEWPORTS],
            used_viewport_scissor_count: 0,
            used_dynamic_viewport_count: false,
            used_dynamic_scissor_count: false,
            inherited_viewport_depths: Vec::new(),
        }
    }
}

impl ViewportScissorState {
    pub fn inherits(&self) -> bool {
        !self.inherited_viewport_depths.is_empty()
    }

    fn store_viewports(&mut self, first: u32, viewports: &[vk::Viewport]) {
        for (i, viewport) in viewports.iter().enumerate() {
            let slot = first as usize + i;
            if slot >= MAX_VIEWPORTS {
                break;
            }
            self.viewports[slot] = *viewport;
        }
    }

    pub fn record_set_viewport(&mut self, first: u32, viewports: &[vk::Viewport]) {
        let bits = slot_range_mask(first, viewports.len() as u32);
        self.viewport_mask |= bits;
        self.viewport_trashed_mask &= !bits;
        self.store_viewports(first, viewports);
    }

    pub fn record_set_viewport_with_count(&mut self, viewports: &[vk::Viewport]) {
        let count = viewports.len() as u32;
        let bits = slot_range_mask(0, count);
        self.viewport_with_count_mask |= bits;
        self.viewport_with_count_count = count;
        self.viewport_trashed_mask &= !bits;
        self.viewport_trashed_count = false;
        self.store_viewports(0, viewports);
    }

    pub fn record_set_scissor(&mut self, first: u32, count: u32) {
        let bits = slot_range_mask(first, count);
        self.scissor_mask |= bits;
        self.scissor_trashed_mask &= !bits;
    }

    pub fn record_set_scissor_with_count(&mut self, count: u32) {
        let bits = slot_range_mask(0, count);
        self.scissor_with_count_mask |= bits;
        self.scissor_with_count_count = count;
        self.scissor_trashed_mask &= !bits;
        self.scissor_trashed_count = false;
    }

    /// Binding a graphics pipeline with static viewport or scissor state
    /// leaves the dynamic values of the slots it uses undefined. Only slots
    /// below the pipeline's own count are trashed, not all 32.
    pub fn record_bind_pipeline(&mut self, pipeline: &PipelineInfo) {
        if !pipeline.has_dynamic(vk::DynamicState::VIEWPORT_WITH_COUNT) {
            self.viewport_trashed_count = true;
            if !pipeline.has_dynamic(vk::DynamicState::VIEWPORT) {
                self.viewport_trashed_mask |= slot_range_mask(0, pipeline.viewport_count);
            }
        }
        if !pipeline.has_dynamic(vk::DynamicState::SCISSOR_WITH_COUNT) {
            self.scissor_trashed_count = true;
            if !pipeline.has_dynamic(vk::DynamicState::SCISSOR) {
                self.scissor_trashed_mask |= slot_range_mask(0, pipeline.scissor_count);
            }
        }
    }

    /// Track how much viewport/scissor state draws consume.
    pub fn record_draw(&mut self, pipeline: &PipelineInfo) {
        let dynamic_viewport_count = pipeline.has_dynamic(vk::DynamicState::VIEWPORT_WITH_COUNT);
        let dynamic_scissor_count = pipeline.has_dynamic(vk::DynamicState::SCISSOR_WITH_COUNT);
        let viewport_count = if dynamic_viewport_count { 0 } else { pipeline.viewport_count };
        let scissor_count = if dynamic_scissor_count { 0 } else { pipeline.scissor_count };

        self.used_viewport_scissor_count = self
            .used_viewport_scissor_count
            .max(viewport_count)
            .max(scissor_count);
        self.used_dynamic_viewport_count |= dynamic_viewport_count;
        self.used_dynamic_scissor_count |= dynamic_scissor_count;
    }

    /// Executing secondaries leaves every dynamic viewport/scissor value
    /// unknown to later inheritance tracking.
    pub fn trash_all(&mut self) {
        self.viewport_trashed_mask = u32::MAX;
        self.scissor_trashed_mask = u32::MAX;
        self.viewport_trashed_count = true;
        self.scissor_trashed_count = true;
    }

    /// Viewport slots below `count` that are unset or trashed.
    pub fn missing_viewports(&self, count: u32) -> u32 {
        let required = slot_range_mask(0, count);
        required & (!self.viewport_mask | self.viewport_trashed_mask)
    }

    pub fn missing_scissors(&self, count: u32) -> u32 {
        let required = slot_range_mask(0, count);
        required & (!self.scissor_mask | self.scissor_trashed_mask)
    }
}

