//! Tracked state for the non-command-buffer objects the core consults.

use ash::vk;
use parking_lot::{Mutex, RwLock};

use crate::image_layout::{full_range, ImageLayoutMap, Subresource};

// ── Command Pool ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CommandPool {
    pub handle: vk::CommandPool,
    pub queue_family_index: u32,
    pub flags: vk::CommandPoolCreateFlags,
}

impl CommandPool {
    /// Whether buffers from this pool may be reset individually, explicitly
    /// or implicitly by vkBeginCommandBuffer.
    pub fn allows_reset(&self) -> bool {
        self.flags.contains(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    }

    pub fn is_protected(&self) -> bool {
        self.flags.contains(vk::CommandPoolCreateFlags::PROTECTED)
    }
}

// ── Image ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ImageCreateInfo {
    pub format: vk::Format,
    pub aspect_mask: vk::ImageAspectFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub initial_layout: vk::ImageLayout,
}

impl Default for ImageCreateInfo {
    fn default() -> Self {
        Self {
            format: vk::Format::R8G8B8A8_UNORM,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
            initial_layout: vk::ImageLayout::UNDEFINED,
        }
    }
}

#[derive(Debug)]
pub struct ImageState {
    pub handle: vk::Image,
    pub info: ImageCreateInfo,
    /// Set for swapchain images
    pub swapchain: Option<vk::SwapchainKHR>,
    /// Device-wide layout, as of the last submission committed
    layouts: RwLock<ImageLayoutMap>,
}

impl ImageState {
    pub fn new(handle: vk::Image, info: ImageCreateInfo, swapchain: Option<vk::SwapchainKHR>) -> Self {
        Self {
            handle,
            info,
            swapchain,
            layouts: RwLock::new(ImageLayoutMap::new(info.mip_levels, info.array_layers)),
        }
    }

    pub fn full_range(&self) -> vk::ImageSubresourceRange {
        full_range(self.info.aspect_mask)
    }

    /// An empty layout map with this image's extents.
    pub fn new_layout_map(&self) -> ImageLayoutMap {
        ImageLayoutMap::new(self.info.mip_levels, self.info.array_layers)
    }

    /// Device-wide layout of one subresource. Untouched subresources are
    /// still in the creation layout.
    pub fn current_layout(&self, subresource: &Subresource) -> vk::ImageLayout {
        self.layouts
            .read()
            .current(subresource)
            .unwrap_or(self.info.initial_layout)
    }

    /// Commit the layouts a submission left this image in.
    pub fn commit_layouts(&self, map: &ImageLayoutMap) {
        self.layouts.write().merge(map);
    }
}

// ── Pipeline ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineInfo {
    pub bind_point: vk::PipelineBindPoint,
    pub dynamic_states: Vec<vk::DynamicState>,
    /// Static viewport count from the viewport state (0 when it is dynamic)
    pub viewport_count: u32,
    pub scissor_count: u32,
}

impl PipelineInfo {
    pub fn graphics(viewport_count: u32, dynamic_states: &[vk::DynamicState]) -> Self {
        Self {
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            dynamic_states: dynamic_states.to_vec(),
            viewport_count,
            scissor_count: viewport_count,
        }
    }

    pub fn compute() -> Self {
        Self {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            dynamic_states: Vec::new(),
            viewport_count: 0,
            scissor_count: 0,
        }
    }

    pub fn has_dynamic(&self, state: vk::DynamicState) -> bool {
        self.dynamic_states.contains(&state)
    }
}

#[derive(Debug)]
pub struct PipelineState {
    pub handle: vk::Pipeline,
    pub info: PipelineInfo,
}

// ── Render Pass / Framebuffer ───────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct AttachmentDescription {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

#[derive(Debug, Clone)]
pub struct RenderPassInfo {
    pub attachments: Vec<AttachmentDescription>,
    pub subpass_count: u32,
    /// Multiview mask shared by every subpass (0 = multiview off)
    pub view_mask: u32,
}

#[derive(Debug)]
pub struct RenderPassState {
    pub handle: vk::RenderPass,
    pub info: RenderPassInfo,
}

impl RenderPassState {
    /// Simplified render pass compatibility: identical handles, or the same
    /// subpass count, view mask and attachment formats and sample counts.
    pub fn is_compatible_with(&self, other: &RenderPassState) -> bool {
        if self.handle == other.handle {
            return true;
        }
        self.info.subpass_count == other.info.subpass_count
            && self.info.view_mask == other.info.view_mask
            && self.info.attachments.len() == other.info.attachments.len()
            && self
                .info
                .attachments
                .iter()
                .zip(other.info.attachments.iter())
                .all(|(a, b)| a.format == b.format && a.samples == b.samples)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferAttachment {
    pub image: vk::Image,
    pub range: vk::ImageSubresourceRange,
}

#[derive(Debug, Clone)]
pub struct FramebufferInfo {
    pub render_pass: vk::RenderPass,
    pub attachments: Vec<FramebufferAttachment>,
}

#[derive(Debug)]
pub struct FramebufferState {
    pub handle: vk::Framebuffer,
    pub info: FramebufferInfo,
}

// ── Query Pool ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct QueryPoolInfo {
    pub query_type: vk::QueryType,
    pub query_count: u32,
    pub pipeline_statistics: vk::QueryPipelineStatisticFlags,
}

#[derive(Debug)]
pub struct QueryPoolState {
    pub handle: vk::QueryPool,
    pub info: QueryPoolInfo,
}

// ── Event ───────────────────────────────────────────────────

/// Signal state of an event, as last committed by a submission or the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSignal {
    pub signaled: bool,
    pub stage_mask: vk::PipelineStageFlags2,
}

#[derive(Debug)]
pub struct EventState {
    pub handle: vk::Event,
    signal: Mutex<EventSignal>,
}

impl EventState {
    pub fn new(handle: vk::Event) -> Self {
        Self {
            handle,
            signal: Mutex::new(EventSignal::default()),
        }
    }

    pub fn signal(&self) -> EventSignal {
        *self.signal.lock()
    }

    pub fn set_signal(&self, signal: EventSignal) {
        *self.signal.lock() = signal;
    }
}

// ── Semaphore ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreKind {
    Binary,
    Timeline,
}

#[derive(Debug)]
pub struct SemaphoreState {
    pub handle: vk::Semaphore,
    pub kind: SemaphoreKind,
    /// Highest payload known to have completed
    completed: Mutex<u64>,
}

impl SemaphoreState {
    pub fn new(handle: vk::Semaphore, kind: SemaphoreKind, initial_value: u64) -> Self {
        Self {
            handle,
            kind,
            completed: Mutex::new(initial_value),
        }
    }

    pub fn is_timeline(&self) -> bool {
        self.kind == SemaphoreKind::Timeline
    }

    pub fn completed_payload(&self) -> u64 {
        *self.completed.lock()
    }

    /// Advance the completed payload; payloads never move backwards.
    pub fn advance(&self, value: u64) {
        let mut completed = self.completed.lock();
        if value > *completed {
            *completed = value;
        }
    }
}
