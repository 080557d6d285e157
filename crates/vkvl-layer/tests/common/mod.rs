//! Shared fixture for the vkvl-layer integration tests.
//!
//! Builds a device with three queue families (graphics+compute+transfer,
//! transfer only, video decode), one resettable pool per family and a queue
//! per family, with every report collected in a `MemorySink`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk::{self, Handle};

use vkvl_core::config::LayerConfig;
use vkvl_layer::image_layout::full_range;
use vkvl_layer::objects::{ImageCreateInfo, PipelineInfo, QueryPoolInfo, SemaphoreKind};
use vkvl_layer::{BeginInfo, DeviceFeatures, DeviceState, InheritanceInfo, MemorySink, SubmitInfo, Validator};

pub const GRAPHICS_FAMILY: u32 = 0;
pub const TRANSFER_FAMILY: u32 = 1;
pub const VIDEO_FAMILY: u32 = 2;

pub struct Fixture {
    pub validator: Validator,
    pub sink: Arc<MemorySink>,
    pub graphics_pool: vk::CommandPool,
    pub transfer_pool: vk::CommandPool,
    pub video_pool: vk::CommandPool,
    pub queue: vk::Queue,
    pub transfer_queue: vk::Queue,
    pub video_queue: vk::Queue,
    next_handle: AtomicU64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_features(DeviceFeatures::default())
    }

    pub fn with_features(features: DeviceFeatures) -> Self {
        let mut config = LayerConfig::default();
        config.report.duplicate_message_limit = 0;
        Self::with_config(features, &config)
    }

    pub fn with_config(features: DeviceFeatures, config: &LayerConfig) -> Self {
        let device = DeviceState::new(
            features,
            vec![
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::VIDEO_DECODE_KHR,
            ],
        );
        let sink = Arc::new(MemorySink::new());
        let validator = Validator::new(device, sink.clone(), config);

        let next_handle = AtomicU64::new(0x1000);
        let next = || next_handle.fetch_add(1, Ordering::Relaxed);
        let graphics_pool = vk::CommandPool::from_raw(next());
        let transfer_pool = vk::CommandPool::from_raw(next());
        let video_pool = vk::CommandPool::from_raw(next());
        let queue = vk::Queue::from_raw(next());
        let transfer_queue = vk::Queue::from_raw(next());
        let video_queue = vk::Queue::from_raw(next());

        let device = validator.device();
        let resettable = vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        device.record_create_command_pool(graphics_pool, GRAPHICS_FAMILY, resettable);
        device.record_create_command_pool(transfer_pool, TRANSFER_FAMILY, resettable);
        device.record_create_command_pool(video_pool, VIDEO_FAMILY, resettable);
        device.record_get_device_queue(queue, GRAPHICS_FAMILY);
        device.record_get_device_queue(transfer_queue, TRANSFER_FAMILY);
        device.record_get_device_queue(video_queue, VIDEO_FAMILY);

        Self {
            validator,
            sink,
            graphics_pool,
            transfer_pool,
            video_pool,
            queue,
            transfer_queue,
            video_queue,
            next_handle,
        }
    }

    pub fn handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    pub fn create_pool(&self, family: u32, flags: vk::CommandPoolCreateFlags) -> vk::CommandPool {
        let pool = self.handle();
        self.validator.device().record_create_command_pool(pool, family, flags);
        pool
    }

    pub fn allocate_in(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> vk::CommandBuffer {
        let cb = self.handle();
        self.validator.device().record_allocate_command_buffers(pool, level, &[cb]);
        cb
    }

    pub fn primary(&self) -> vk::CommandBuffer {
        self.allocate_in(self.graphics_pool, vk::CommandBufferLevel::PRIMARY)
    }

    pub fn secondary(&self) -> vk::CommandBuffer {
        self.allocate_in(self.graphics_pool, vk::CommandBufferLevel::SECONDARY)
    }

    /// Validate and record vkBeginCommandBuffer; returns the skip flag.
    pub fn begin_with(&self, cb: vk::CommandBuffer, info: &BeginInfo) -> bool {
        let skip = self.validator.pre_call_validate_begin_command_buffer(cb, info);
        self.validator.post_call_record_begin_command_buffer(cb, info);
        skip
    }

    pub fn begin(&self, cb: vk::CommandBuffer) {
        self.begin_with(cb, &BeginInfo::default());
    }

    pub fn begin_secondary(&self, cb: vk::CommandBuffer, inheritance: InheritanceInfo) {
        self.begin_flags(cb, vk::CommandBufferUsageFlags::empty(), inheritance);
    }

    pub fn begin_flags(&self, cb: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags, inheritance: InheritanceInfo) {
        self.begin_with(
            cb,
            &BeginInfo {
                flags,
                inheritance: Some(inheritance),
            },
        );
    }

    pub fn end(&self, cb: vk::CommandBuffer) -> bool {
        let skip = self.validator.pre_call_validate_end_command_buffer(cb);
        self.validator.post_call_record_end_command_buffer(cb);
        skip
    }

    pub fn image(&self) -> vk::Image {
        self.image_with(ImageCreateInfo::default())
    }

    pub fn image_with(&self, info: ImageCreateInfo) -> vk::Image {
        let image = self.handle();
        self.validator.device().record_create_image(image, info);
        image
    }

    pub fn pipeline(&self, info: PipelineInfo) -> vk::Pipeline {
        let pipeline = self.handle();
        self.validator.device().record_create_pipeline(pipeline, info);
        pipeline
    }

    pub fn query_pool(&self, query_type: vk::QueryType, query_count: u32) -> vk::QueryPool {
        let pool = self.handle();
        self.validator.device().record_create_query_pool(
            pool,
            QueryPoolInfo {
                query_type,
                query_count,
                pipeline_statistics: vk::QueryPipelineStatisticFlags::empty(),
            },
        );
        pool
    }

    pub fn timeline_semaphore(&self, initial_value: u64) -> vk::Semaphore {
        let semaphore = self.handle();
        self.validator
            .device()
            .record_create_semaphore(semaphore, SemaphoreKind::Timeline, initial_value);
        semaphore
    }

    pub fn bind_pipeline(&self, cb: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.validator
            .post_call_record_cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, pipeline);
    }

    pub fn set_viewports(&self, cb: vk::CommandBuffer, first: u32, viewports: &[vk::Viewport]) {
        self.validator.post_call_record_cmd_set_viewport(cb, first, viewports);
    }

    pub fn set_scissors(&self, cb: vk::CommandBuffer, first: u32, count: u32) {
        let scissors = vec![rect(); count as usize];
        self.validator.post_call_record_cmd_set_scissor(cb, first, &scissors);
    }

    /// Validate and record vkCmdExecuteCommands; returns the skip flag.
    pub fn execute(&self, primary: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) -> bool {
        let skip = self
            .validator
            .pre_call_validate_cmd_execute_commands(primary, secondaries);
        self.validator
            .post_call_record_cmd_execute_commands(primary, secondaries);
        skip
    }

    /// Validate and record a single-batch vkQueueSubmit on the graphics queue.
    pub fn submit(&self, command_buffers: &[vk::CommandBuffer]) -> (bool, u64) {
        self.submit_batches(self.queue, &[SubmitInfo::with_command_buffers(command_buffers)])
    }

    pub fn submit_batches(&self, queue: vk::Queue, batches: &[SubmitInfo]) -> (bool, u64) {
        let skip = self.validator.pre_call_validate_queue_submit(queue, batches);
        let seq = self.validator.post_call_record_queue_submit(queue, batches);
        (skip, seq)
    }

    pub fn state(&self, cb: vk::CommandBuffer) -> vkvl_layer::CbState {
        self.validator
            .device()
            .with_read(cb, |cb| cb.state)
            .expect("command buffer is tracked")
    }
}

pub fn viewport(min_depth: f32, max_depth: f32) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: 64.0,
        height: 64.0,
        min_depth,
        max_depth,
    }
}

pub fn rect() -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: vk::Extent2D {
            width: 64,
            height: 64,
        },
    }
}

pub fn color_range() -> vk::ImageSubresourceRange {
    full_range(vk::ImageAspectFlags::COLOR)
}
