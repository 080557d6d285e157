//! Queues and the submissions pending on them.

use std::collections::VecDeque;

use ash::vk;
use parking_lot::Mutex;

/// One semaphore wait or signal of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreOp {
    pub semaphore: vk::Semaphore,
    /// Timeline payload; ignored for binary semaphores
    pub value: u64,
}

impl SemaphoreOp {
    pub fn binary(semaphore: vk::Semaphore) -> Self {
        Self { semaphore, value: 0 }
    }

    pub fn timeline(semaphore: vk::Semaphore, value: u64) -> Self {
        Self { semaphore, value }
    }
}

/// One `VkSubmitInfo` batch.
#[derive(Debug, Clone, Default)]
pub struct SubmitInfo {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_semaphores: Vec<SemaphoreOp>,
    pub signal_semaphores: Vec<SemaphoreOp>,
    /// `VkPerformanceQuerySubmitInfoKHR::counterPassIndex`
    pub perf_pass_index: u32,
}

impl SubmitInfo {
    pub fn with_command_buffers(command_buffers: &[vk::CommandBuffer]) -> Self {
        Self {
            command_buffers: command_buffers.to_vec(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedImage {
    pub swapchain: vk::SwapchainKHR,
    pub image: vk::Image,
}

/// One vkQueueSubmit (or vkQueuePresentKHR) call in flight.
#[derive(Debug, Clone)]
pub struct QueueSubmission {
    pub queue: vk::Queue,
    pub seq: u64,
    pub batches: Vec<SubmitInfo>,
    pub present: Option<PresentedImage>,
}

impl QueueSubmission {
    pub fn command_buffers(&self) -> impl Iterator<Item = (usize, usize, vk::CommandBuffer)> + '_ {
        self.batches.iter().enumerate().flat_map(|(batch, submit)| {
            submit
                .command_buffers
                .iter()
                .enumerate()
                .map(move |(index, cb)| (batch, index, *cb))
        })
    }
}

#[derive(Debug)]
pub struct QueueState {
    pub handle: vk::Queue,
    pub family_index: u32,
    pending: Mutex<VecDeque<QueueSubmission>>,
}

impl QueueState {
    pub fn new(handle: vk::Queue, family_index: u32) -> Self {
        Self {
            handle,
            family_index,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, submission: QueueSubmission) {
        self.pending.lock().push_back(submission);
    }

    /// Remove one submission, whatever its position.
    pub fn take(&self, seq: u64) -> Option<QueueSubmission> {
        let mut pending = self.pending.lock();
        let index = pending.iter().position(|s| s.seq == seq)?;
        pending.remove(index)
    }

    pub fn pending_snapshot(&self) -> Vec<QueueSubmission> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
