//! Device-wide tracked state: every object table the core consults.
//!
//! One [`DeviceState`] exists per logical device. Objects are shared through
//! `Arc`s handed out by [`ObjectMap`]; command buffers additionally sit behind
//! their own `RwLock`, reached only through the closure-scoped accessors here
//! so that no guard outlives the call that took it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use vkvl_core::{CoreError, ObjectMap, TypedHandle};

use crate::cmd_buffer::{BrokenBinding, CommandBuffer};
use crate::image_layout::Subresource;
use crate::objects::{
    CommandPool, EventState, FramebufferInfo, FramebufferState, ImageCreateInfo, ImageState, PipelineInfo,
    PipelineState, QueryPoolInfo, QueryPoolState, RenderPassInfo, RenderPassState, SemaphoreKind, SemaphoreState,
};
use crate::query::{QueryMap, QueryObject, QueryState};
use crate::queue::QueueState;

/// Enabled features and limits the core's checks depend on.
#[derive(Debug, Clone)]
pub struct DeviceFeatures {
    /// `VK_EXT_nested_command_buffer`: secondaries may execute secondaries
    pub nested_command_buffer: bool,
    /// `maxCommandBufferNestingLevel`; `u32::MAX` means unbounded
    pub max_command_buffer_nesting_level: u32,
    /// Custom resolve attachments, which make secondary layout checks unreliable
    pub custom_resolve: bool,
    /// `VK_NV_inherited_viewport_scissor`
    pub inherited_viewport_scissor: bool,
    pub multiview: bool,
}

impl Default for DeviceFeatures {
    fn default() -> Self {
        Self {
            nested_command_buffer: false,
            max_command_buffer_nesting_level: 1,
            custom_resolve: false,
            inherited_viewport_scissor: true,
            multiview: true,
        }
    }
}

pub type SharedCommandBuffer = Arc<RwLock<CommandBuffer>>;

pub struct DeviceState {
    features: DeviceFeatures,
    /// Capabilities of each queue family, by index
    queue_family_flags: Vec<vk::QueueFlags>,

    command_pools: ObjectMap<vk::CommandPool, CommandPool>,
    command_buffers: ObjectMap<vk::CommandBuffer, RwLock<CommandBuffer>>,
    images: ObjectMap<vk::Image, ImageState>,
    pipelines: ObjectMap<vk::Pipeline, PipelineState>,
    render_passes: ObjectMap<vk::RenderPass, RenderPassState>,
    framebuffers: ObjectMap<vk::Framebuffer, FramebufferState>,
    query_pools: ObjectMap<vk::QueryPool, QueryPoolState>,
    events: ObjectMap<vk::Event, EventState>,
    semaphores: ObjectMap<vk::Semaphore, SemaphoreState>,
    queues: ObjectMap<vk::Queue, QueueState>,

    /// Device-wide query states, as of the last committed submission
    query_states: Mutex<QueryMap>,
    next_submission: AtomicU64,
}

impl DeviceState {
    pub fn new(features: DeviceFeatures, queue_family_flags: Vec<vk::QueueFlags>) -> Self {
        Self {
            features,
            queue_family_flags,
            command_pools: ObjectMap::new(),
            command_buffers: ObjectMap::new(),
            images: ObjectMap::new(),
            pipelines: ObjectMap::new(),
            render_passes: ObjectMap::new(),
            framebuffers: ObjectMap::new(),
            query_pools: ObjectMap::new(),
            events: ObjectMap::new(),
            semaphores: ObjectMap::new(),
            queues: ObjectMap::new(),
            query_states: Mutex::new(QueryMap::new()),
            next_submission: AtomicU64::new(1),
        }
    }

    pub fn features(&self) -> &DeviceFeatures {
        &self.features
    }

    pub fn queue_family_flags(&self, index: u32) -> Option<vk::QueueFlags> {
        self.queue_family_flags.get(index as usize).copied()
    }

    // ── Lookups ─────────────────────────────────────────────

    pub fn command_pool(&self, handle: vk::CommandPool) -> Option<Arc<CommandPool>> {
        self.command_pools.get(&handle)
    }

    pub fn command_buffer(&self, handle: vk::CommandBuffer) -> Option<SharedCommandBuffer> {
        self.command_buffers.get(&handle)
    }

    /// Like [`Self::command_buffer`], for embedders that treat an unknown
    /// handle as a hard error.
    pub fn require_command_buffer(&self, handle: vk::CommandBuffer) -> Result<SharedCommandBuffer, CoreError> {
        self.command_buffer(handle)
            .ok_or_else(|| CoreError::HandleNotFound(TypedHandle::new(handle).to_string()))
    }

    pub fn image(&self, handle: vk::Image) -> Option<Arc<ImageState>> {
        self.images.get(&handle)
    }

    pub fn pipeline(&self, handle: vk::Pipeline) -> Option<Arc<PipelineState>> {
        self.pipelines.get(&handle)
    }

    pub fn render_pass(&self, handle: vk::RenderPass) -> Option<Arc<RenderPassState>> {
        self.render_passes.get(&handle)
    }

    pub fn framebuffer(&self, handle: vk::Framebuffer) -> Option<Arc<FramebufferState>> {
        self.framebuffers.get(&handle)
    }

    pub fn query_pool(&self, handle: vk::QueryPool) -> Option<Arc<QueryPoolState>> {
        self.query_pools.get(&handle)
    }

    pub fn event(&self, handle: vk::Event) -> Option<Arc<EventState>> {
        self.events.get(&handle)
    }

    pub fn semaphore(&self, handle: vk::Semaphore) -> Option<Arc<SemaphoreState>> {
        self.semaphores.get(&handle)
    }

    pub fn queue(&self, handle: vk::Queue) -> Option<Arc<QueueState>> {
        self.queues.get(&handle)
    }

    pub fn command_buffers_snapshot(&self) -> Vec<(vk::CommandBuffer, SharedCommandBuffer)> {
        self.command_buffers.snapshot()
    }

    pub fn queues(&self) -> Vec<Arc<QueueState>> {
        self.queues.snapshot().into_iter().map(|(_, q)| q).collect()
    }

    /// Device-wide layout of one image subresource.
    pub fn image_layout(&self, image: vk::Image, subresource: &Subresource) -> Option<vk::ImageLayout> {
        self.image(image).map(|state| state.current_layout(subresource))
    }

    // ── Command buffer access ───────────────────────────────

    /// Run `f` under a shared lock on the command buffer. `None` if the
    /// handle is unknown.
    pub fn with_read<R>(&self, handle: vk::CommandBuffer, f: impl FnOnce(&CommandBuffer) -> R) -> Option<R> {
        let cb = self.command_buffer(handle)?;
        let guard = cb.read();
        Some(f(&guard))
    }

    pub fn with_write<R>(&self, handle: vk::CommandBuffer, f: impl FnOnce(&mut CommandBuffer) -> R) -> Option<R> {
        let cb = self.command_buffer(handle)?;
        let mut guard = cb.write();
        Some(f(&mut guard))
    }

    /// Lock a primary and one of its secondaries, always primary first.
    ///
    /// `None` if either handle is unknown or both name the same buffer.
    pub fn with_primary_and_secondary<R>(
        &self,
        primary: vk::CommandBuffer,
        secondary: vk::CommandBuffer,
        f: impl FnOnce(&CommandBuffer, &CommandBuffer) -> R,
    ) -> Option<R> {
        if primary == secondary {
            return None;
        }
        let primary = self.command_buffer(primary)?;
        let secondary = self.command_buffer(secondary)?;
        let primary = primary.read();
        let secondary = secondary.read();
        Some(f(&primary, &secondary))
    }

    pub fn with_primary_and_secondary_mut<R>(
        &self,
        primary: vk::CommandBuffer,
        secondary: vk::CommandBuffer,
        f: impl FnOnce(&mut CommandBuffer, &mut CommandBuffer) -> R,
    ) -> Option<R> {
        if primary == secondary {
            return None;
        }
        let primary = self.command_buffer(primary)?;
        let secondary = self.command_buffer(secondary)?;
        let mut primary = primary.write();
        let mut secondary = secondary.write();
        Some(f(&mut primary, &mut secondary))
    }

    // ── Queries ─────────────────────────────────────────────

    pub fn query_state(&self, query: &QueryObject) -> QueryState {
        self.query_states.lock().get(query).copied().unwrap_or_default()
    }

    pub fn set_query_state(&self, query: QueryObject, state: QueryState) {
        self.query_states.lock().insert(query, state);
    }

    /// Commit a submission's locally replayed query states.
    pub fn commit_query_states(&self, queries: &QueryMap) {
        let mut states = self.query_states.lock();
        for (query, state) in queries {
            states.insert(*query, *state);
        }
    }

    pub fn next_submission_seq(&self) -> u64 {
        self.next_submission.fetch_add(1, Ordering::Relaxed)
    }

    // ── Object lifecycle ────────────────────────────────────

    pub fn record_create_command_pool(
        &self,
        handle: vk::CommandPool,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) {
        self.command_pools.insert(
            handle,
            CommandPool {
                handle,
                queue_family_index,
                flags,
            },
        );
    }

    /// Track freshly allocated buffers. Unknown pools allocate nothing.
    pub fn record_allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        handles: &[vk::CommandBuffer],
    ) {
        let Some(pool) = self.command_pool(pool) else {
            return;
        };
        for handle in handles {
            self.command_buffers
                .insert(*handle, RwLock::new(CommandBuffer::new(*handle, &pool, level)));
        }
        debug!("allocated {} {:?} command buffer(s)", handles.len(), level);
    }

    pub fn record_create_image(&self, handle: vk::Image, info: ImageCreateInfo) {
        self.images.insert(handle, ImageState::new(handle, info, None));
    }

    pub fn record_create_swapchain(&self, swapchain: vk::SwapchainKHR, images: &[vk::Image], info: ImageCreateInfo) {
        for image in images {
            self.images
                .insert(*image, ImageState::new(*image, info, Some(swapchain)));
        }
    }

    pub fn record_create_pipeline(&self, handle: vk::Pipeline, info: PipelineInfo) {
        self.pipelines.insert(handle, PipelineState { handle, info });
    }

    pub fn record_create_render_pass(&self, handle: vk::RenderPass, info: RenderPassInfo) {
        self.render_passes.insert(handle, RenderPassState { handle, info });
    }

    pub fn record_create_framebuffer(&self, handle: vk::Framebuffer, info: FramebufferInfo) {
        self.framebuffers.insert(handle, FramebufferState { handle, info });
    }

    pub fn record_create_query_pool(&self, handle: vk::QueryPool, info: QueryPoolInfo) {
        self.query_pools.insert(handle, QueryPoolState { handle, info });
    }

    pub fn record_create_event(&self, handle: vk::Event) {
        self.events.insert(handle, EventState::new(handle));
    }

    pub fn record_create_semaphore(&self, handle: vk::Semaphore, kind: SemaphoreKind, initial_value: u64) {
        self.semaphores
            .insert(handle, SemaphoreState::new(handle, kind, initial_value));
    }

    pub fn record_get_device_queue(&self, handle: vk::Queue, family_index: u32) {
        if !self.queues.contains(&handle) {
            self.queues.insert(handle, QueueState::new(handle, family_index));
        }
    }

    /// Stop tracking an object and invalidate every command buffer that
    /// references it.
    pub fn record_destroy_object(&self, object: TypedHandle) {
        match object.object_type {
            vk::ObjectType::COMMAND_POOL => {
                if let Some(pool) = object.cast::<vk::CommandPool>() {
                    self.command_pools.remove(&pool);
                    for (handle, cb) in self.command_buffers.snapshot() {
                        if cb.read().command_pool == pool {
                            self.record_free_command_buffer(handle);
                        }
                    }
                }
                return;
            }
            vk::ObjectType::COMMAND_BUFFER => {
                if let Some(handle) = object.cast::<vk::CommandBuffer>() {
                    self.record_free_command_buffer(handle);
                }
                return;
            }
            vk::ObjectType::IMAGE => {
                if let Some(h) = object.cast() {
                    self.images.remove(&h);
                }
            }
            vk::ObjectType::PIPELINE => {
                if let Some(h) = object.cast() {
                    self.pipelines.remove(&h);
                }
            }
            vk::ObjectType::RENDER_PASS => {
                if let Some(h) = object.cast() {
                    self.render_passes.remove(&h);
                }
            }
            vk::ObjectType::FRAMEBUFFER => {
                if let Some(h) = object.cast() {
                    self.framebuffers.remove(&h);
                }
            }
            vk::ObjectType::QUERY_POOL => {
                if let Some(h) = object.cast() {
                    self.query_pools.remove(&h);
                }
            }
            vk::ObjectType::EVENT => {
                if let Some(h) = object.cast() {
                    self.events.remove(&h);
                }
            }
            vk::ObjectType::SEMAPHORE => {
                if let Some(h) = object.cast() {
                    self.semaphores.remove(&h);
                }
            }
            _ => {}
        }
        debug!("destroyed {}", object);
        self.invalidate_dependents(object);
    }

    /// A descriptor set update without update-after-bind breaks every
    /// recording that bound the set.
    pub fn record_update_descriptor_set(&self, set: vk::DescriptorSet, update_after_bind: bool) {
        if !update_after_bind {
            self.invalidate_dependents(TypedHandle::new(set));
        }
    }

    /// Forget a freed command buffer; primaries that executed it become invalid.
    pub fn record_free_command_buffer(&self, handle: vk::CommandBuffer) {
        let Some(cb) = self.command_buffers.remove(&handle) else {
            return;
        };
        let primaries = cb.write().reset();
        self.invalidate_linked_primaries(handle, primaries);
    }

    pub fn invalidate_dependents(&self, object: TypedHandle) {
        for (handle, cb) in self.command_buffers.snapshot() {
            let primaries = {
                let mut cb = cb.write();
                if !cb.bound_objects.contains(&object) || cb.state == crate::cmd_buffer::CbState::New {
                    continue;
                }
                cb.invalidate(BrokenBinding {
                    object,
                    referenced_by: vec![TypedHandle::new(handle)],
                });
                cb.linked_primaries.clone()
            };
            self.invalidate_linked_primaries(handle, primaries);
        }
    }

    /// Invalidate every primary that executed `secondary`, transitively.
    /// Takes one command buffer lock at a time.
    pub fn invalidate_linked_primaries(&self, secondary: vk::CommandBuffer, primaries: HashSet<vk::CommandBuffer>) {
        let mut work: Vec<(vk::CommandBuffer, vk::CommandBuffer)> =
            primaries.into_iter().map(|p| (p, secondary)).collect();
        let mut seen = HashSet::new();
        while let Some((primary, child)) = work.pop() {
            if !seen.insert((primary, child)) {
                continue;
            }
            let parents = self.with_write(primary, |cb| {
                if !cb.linked_command_buffers.contains(&child) {
                    return HashSet::new();
                }
                cb.invalidate(BrokenBinding {
                    object: TypedHandle::new(child),
                    referenced_by: vec![TypedHandle::new(primary)],
                });
                cb.linked_primaries.clone()
            });
            for parent in parents.unwrap_or_default() {
                work.push((parent, primary));
            }
        }
        debug!("invalidated primaries of 0x{:x}", secondary.as_raw());
    }
}
