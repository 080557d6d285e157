//! Per-command-buffer record state.

mod viewport;

pub use viewport::{slot_range_mask, ViewportScissorState, MAX_VIEWPORTS};

use std::collections::{HashMap, HashSet};

use ash::vk::{self, Handle};
use tracing::debug;

use vkvl_core::TypedHandle;

use crate::deferred::{EventUpdate, QueryUpdate, SubmitCheck};
use crate::image_layout::LayoutRegistry;
use crate::objects::CommandPool;
use crate::query::QueryObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbState {
    /// Allocated or reset, never begun
    New,
    Recording,
    /// Ended and executable
    Recorded,
    /// A dependency was invalidated while recording
    InvalidIncomplete,
    /// A dependency was invalidated after recording ended
    InvalidComplete,
}

impl CbState {
    pub fn is_invalid(self) -> bool {
        matches!(self, CbState::InvalidIncomplete | CbState::InvalidComplete)
    }
}

/// How the most recent dynamic rendering instance in the buffer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspendState {
    #[default]
    Empty,
    Suspended,
    Resumed,
}

/// An invalidated dependency and the objects that referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenBinding {
    pub object: TypedHandle,
    pub referenced_by: Vec<TypedHandle>,
}

// ── Begin Info ──────────────────────────────────────────────

/// `VkCommandBufferInheritanceRenderingInfo`, plus the attachment sample
/// counts from `VkAttachmentSampleCountInfoAMD` when chained.
#[derive(Debug, Clone, Default)]
pub struct InheritedRendering {
    pub flags: vk::RenderingFlags,
    pub view_mask: u32,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: vk::Format,
    pub stencil_format: vk::Format,
    pub rasterization_samples: vk::SampleCountFlags,
    /// Empty when no sample count info is chained
    pub color_attachment_samples: Vec<vk::SampleCountFlags>,
    pub depth_stencil_attachment_samples: Option<vk::SampleCountFlags>,
}

#[derive(Debug, Clone, Default)]
pub struct InheritanceInfo {
    pub render_pass: Option<vk::RenderPass>,
    pub subpass: u32,
    pub framebuffer: Option<vk::Framebuffer>,
    pub rendering: Option<InheritedRendering>,
    pub occlusion_query_enable: bool,
    pub query_flags: vk::QueryControlFlags,
    pub pipeline_statistics: vk::QueryPipelineStatisticFlags,
    /// `VkCommandBufferInheritanceViewportScissorInfoNV::pViewportDepths`
    /// when `viewportScissor2D` is enabled
    pub viewport_depths: Vec<vk::Viewport>,
}

#[derive(Debug, Clone, Default)]
pub struct BeginInfo {
    pub flags: vk::CommandBufferUsageFlags,
    pub inheritance: Option<InheritanceInfo>,
}

// ── Render Pass Instance ────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RenderingAttachment {
    /// `None` for a null image view
    pub image: Option<vk::Image>,
    pub range: vk::ImageSubresourceRange,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub layout: vk::ImageLayout,
}

impl RenderingAttachment {
    pub fn null() -> Self {
        Self {
            image: None,
            range: crate::image_layout::full_range(vk::ImageAspectFlags::COLOR),
            format: vk::Format::UNDEFINED,
            samples: vk::SampleCountFlags::TYPE_1,
            layout: vk::ImageLayout::UNDEFINED,
        }
    }
}

/// `VkRenderingInfo` as captured by vkCmdBeginRendering.
#[derive(Debug, Clone, Default)]
pub struct RenderingInfo {
    pub flags: vk::RenderingFlags,
    pub view_mask: u32,
    pub color_attachments: Vec<RenderingAttachment>,
    pub depth_attachment: Option<RenderingAttachment>,
    pub stencil_attachment: Option<RenderingAttachment>,
}

impl RenderingInfo {
    /// Rendering state a secondary assumes from its inheritance info.
    pub fn from_inherited(inherited: &InheritedRendering) -> Self {
        let attachment = |format: vk::Format| RenderingAttachment {
            format,
            samples: inherited.rasterization_samples,
            ..RenderingAttachment::null()
        };
        Self {
            flags: inherited.flags,
            view_mask: inherited.view_mask,
            color_attachments: inherited.color_formats.iter().map(|f| attachment(*f)).collect(),
            depth_attachment: Some(attachment(inherited.depth_format)),
            stencil_attachment: Some(attachment(inherited.stencil_format)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LegacyRenderPass {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub subpass_count: u32,
    pub framebuffer: Option<vk::Framebuffer>,
    pub contents: vk::SubpassContents,
    pub view_mask: u32,
}

#[derive(Debug, Clone)]
pub enum ActiveRenderPass {
    Legacy(LegacyRenderPass),
    Rendering(RenderingInfo),
}

impl ActiveRenderPass {
    pub fn is_dynamic_rendering(&self) -> bool {
        matches!(self, ActiveRenderPass::Rendering(_))
    }

    pub fn view_mask(&self) -> u32 {
        match self {
            ActiveRenderPass::Legacy(rp) => rp.view_mask,
            ActiveRenderPass::Rendering(info) => info.view_mask,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ActiveRenderPass::Legacy(_) => "render pass",
            ActiveRenderPass::Rendering(_) => "dynamic rendering",
        }
    }
}

// ── Command Buffer ──────────────────────────────────────────

#[derive(Debug)]
pub struct CommandBuffer {
    pub handle: vk::CommandBuffer,
    pub level: vk::CommandBufferLevel,
    pub command_pool: vk::CommandPool,
    pub queue_family_index: u32,
    pub pool_flags: vk::CommandPoolCreateFlags,

    pub state: CbState,
    pub begin_flags: vk::CommandBufferUsageFlags,
    pub inheritance: Option<InheritanceInfo>,
    pub render_pass: Option<ActiveRenderPass>,
    pub last_suspend_state: SuspendState,
    pub video_session: Option<vk::VideoSessionKHR>,
    /// Opened and not yet ended in this recording, with their control flags
    pub active_queries: HashMap<QueryObject, vk::QueryControlFlags>,
    pub broken_bindings: Vec<BrokenBinding>,

    pub viewport_scissor: ViewportScissorState,
    pub bound_graphics_pipeline: Option<vk::Pipeline>,
    pub bound_compute_pipeline: Option<vk::Pipeline>,

    pub event_updates: Vec<EventUpdate>,
    pub query_updates: Vec<QueryUpdate>,
    pub submit_checks: Vec<SubmitCheck>,

    /// Secondaries executed by this primary, in first-execution order
    pub linked_command_buffers: Vec<vk::CommandBuffer>,
    /// Primaries that executed this secondary
    pub linked_primaries: HashSet<vk::CommandBuffer>,
    pub image_layouts: LayoutRegistry,
    /// Every object this recording references
    pub bound_objects: HashSet<TypedHandle>,

    pub nesting_level: u32,
    pub submit_count: u32,
    /// Pending submissions (or executing primaries) holding this buffer
    pub in_use: u32,
}

impl CommandBuffer {
    pub fn new(handle: vk::CommandBuffer, pool: &CommandPool, level: vk::CommandBufferLevel) -> Self {
        Self {
            handle,
            level,
            command_pool: pool.handle,
            queue_family_index: pool.queue_family_index,
            pool_flags: pool.flags,
            state: CbState::New,
            begin_flags: vk::CommandBufferUsageFlags::empty(),
            inheritance: None,
            render_pass: None,
            last_suspend_state: SuspendState::Empty,
            video_session: None,
            active_queries: HashMap::new(),
            broken_bindings: Vec::new(),
            viewport_scissor: ViewportScissorState::default(),
            bound_graphics_pipeline: None,
            bound_compute_pipeline: None,
            event_updates: Vec::new(),
            query_updates: Vec::new(),
            submit_checks: Vec::new(),
            linked_command_buffers: Vec::new(),
            linked_primaries: HashSet::new(),
            image_layouts: LayoutRegistry::new(),
            bound_objects: HashSet::new(),
            nesting_level: 0,
            submit_count: 0,
            in_use: 0,
        }
    }

    pub fn typed(&self) -> TypedHandle {
        TypedHandle::new(self.handle)
    }

    pub fn is_primary(&self) -> bool {
        self.level == vk::CommandBufferLevel::PRIMARY
    }

    pub fn is_secondary(&self) -> bool {
        self.level == vk::CommandBufferLevel::SECONDARY
    }

    pub fn is_protected(&self) -> bool {
        self.pool_flags.contains(vk::CommandPoolCreateFlags::PROTECTED)
    }

    pub fn pool_allows_reset(&self) -> bool {
        self.pool_flags
            .contains(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    }

    pub fn has_usage(&self, flag: vk::CommandBufferUsageFlags) -> bool {
        self.begin_flags.contains(flag)
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use > 0
    }

    /// Note an object this recording depends on.
    pub fn add_binding(&mut self, object: TypedHandle) {
        if !object.is_null() {
            self.bound_objects.insert(object);
        }
    }

    /// Return to the freshly allocated state.
    ///
    /// Returns the primaries that had executed this buffer; the caller
    /// invalidates them once this buffer's lock is released.
    pub fn reset(&mut self) -> HashSet<vk::CommandBuffer> {
        debug!("reset command buffer 0x{:x}", self.handle.as_raw());
        self.state = CbState::New;
        self.begin_flags = vk::CommandBufferUsageFlags::empty();
        self.inheritance = None;
        self.render_pass = None;
        self.last_suspend_state = SuspendState::Empty;
        self.video_session = None;
        self.active_queries.clear();
        self.broken_bindings.clear();
        self.viewport_scissor = ViewportScissorState::default();
        self.bound_graphics_pipeline = None;
        self.bound_compute_pipeline = None;
        self.event_updates.clear();
        self.query_updates.clear();
        self.submit_checks.clear();
        self.linked_command_buffers.clear();
        self.image_layouts.clear();
        self.bound_objects.clear();
        self.nesting_level = 0;
        self.submit_count = 0;
        std::mem::take(&mut self.linked_primaries)
    }

    /// Enter the recording state with freshly reset record state.
    pub fn begin(&mut self, info: &BeginInfo) -> HashSet<vk::CommandBuffer> {
        let primaries = self.reset();
        self.state = CbState::Recording;
        self.begin_flags = info.flags;

        if self.is_secondary() {
            if let Some(inheritance) = &info.inheritance {
                self.viewport_scissor.inherited_viewport_depths = inheritance.viewport_depths.clone();
                if info.flags.contains(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE) {
                    self.render_pass = inherited_render_pass(inheritance);
                }
                if let Some(render_pass) = inheritance.render_pass {
                    self.add_binding(TypedHandle::new(render_pass));
                }
                if let Some(framebuffer) = inheritance.framebuffer {
                    self.add_binding(TypedHandle::new(framebuffer));
                }
                self.inheritance = Some(inheritance.clone());
            }
        }
        debug!(
            "begin command buffer 0x{:x} (flags {:?})",
            self.handle.as_raw(),
            info.flags
        );
        primaries
    }

    pub fn end(&mut self) {
        if self.state == CbState::Recording {
            self.state = CbState::Recorded;
        }
        debug!("end command buffer 0x{:x} ({:?})", self.handle.as_raw(), self.state);
    }

    /// Record that `object` became unusable for this buffer.
    pub fn invalidate(&mut self, binding: BrokenBinding) {
        self.state = match self.state {
            CbState::Recording | CbState::InvalidIncomplete => CbState::InvalidIncomplete,
            _ => CbState::InvalidComplete,
        };
        debug!(
            "command buffer 0x{:x} invalidated by {}",
            self.handle.as_raw(),
            binding.object
        );
        if !self.broken_bindings.contains(&binding) {
            self.broken_bindings.push(binding);
        }
    }

    pub fn link_secondary(&mut self, secondary: vk::CommandBuffer) {
        if !self.linked_command_buffers.contains(&secondary) {
            self.linked_command_buffers.push(secondary);
        }
    }
}

fn inherited_render_pass(inheritance: &InheritanceInfo) -> Option<ActiveRenderPass> {
    if let Some(render_pass) = inheritance.render_pass.filter(|rp| !rp.is_null()) {
        return Some(ActiveRenderPass::Legacy(LegacyRenderPass {
            render_pass,
            subpass: inheritance.subpass,
            subpass_count: inheritance.subpass + 1,
            framebuffer: inheritance.framebuffer.filter(|fb| !fb.is_null()),
            contents: vk::SubpassContents::INLINE,
            view_mask: 0,
        }));
    }
    inheritance
        .rendering
        .as_ref()
        .map(|rendering| ActiveRenderPass::Rendering(RenderingInfo::from_inherited(rendering)))
}
