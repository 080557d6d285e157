use std::fmt;

use ash::vk::{self, Handle};

/// A Vulkan handle tagged with its object type.
///
/// Reports name the offending objects by these, and the broken-binding
/// bookkeeping keys on them so that handles of different types with the same
/// raw value never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedHandle {
    /// Raw 64-bit handle value
    pub raw: u64,
    /// Type tag used for message formatting and lookups
    pub object_type: vk::ObjectType,
}

impl TypedHandle {
    pub fn new<H: Handle>(handle: H) -> Self {
        Self {
            raw: handle.as_raw(),
            object_type: H::TYPE,
        }
    }

    /// Create a null/invalid handle.
    pub fn null() -> Self {
        Self {
            raw: 0,
            object_type: vk::ObjectType::UNKNOWN,
        }
    }

    pub fn is_null(&self) -> bool {
        self.raw == 0
    }

    /// Recover the concrete handle if the type tag matches.
    pub fn cast<H: Handle>(&self) -> Option<H> {
        (self.object_type == H::TYPE).then(|| H::from_raw(self.raw))
    }

    pub fn is<H: Handle>(&self) -> bool {
        self.object_type == H::TYPE
    }

    /// The Vulkan API name of the handle type, e.g. `VkCommandBuffer`.
    pub fn type_name(&self) -> &'static str {
        match self.object_type {
            vk::ObjectType::INSTANCE => "VkInstance",
            vk::ObjectType::PHYSICAL_DEVICE => "VkPhysicalDevice",
            vk::ObjectType::DEVICE => "VkDevice",
            vk::ObjectType::QUEUE => "VkQueue",
            vk::ObjectType::SEMAPHORE => "VkSemaphore",
            vk::ObjectType::COMMAND_BUFFER => "VkCommandBuffer",
            vk::ObjectType::FENCE => "VkFence",
            vk::ObjectType::DEVICE_MEMORY => "VkDeviceMemory",
            vk::ObjectType::BUFFER => "VkBuffer",
            vk::ObjectType::IMAGE => "VkImage",
            vk::ObjectType::EVENT => "VkEvent",
            vk::ObjectType::QUERY_POOL => "VkQueryPool",
            vk::ObjectType::BUFFER_VIEW => "VkBufferView",
            vk::ObjectType::IMAGE_VIEW => "VkImageView",
            vk::ObjectType::PIPELINE_LAYOUT => "VkPipelineLayout",
            vk::ObjectType::RENDER_PASS => "VkRenderPass",
            vk::ObjectType::PIPELINE => "VkPipeline",
            vk::ObjectType::DESCRIPTOR_SET_LAYOUT => "VkDescriptorSetLayout",
            vk::ObjectType::SAMPLER => "VkSampler",
            vk::ObjectType::DESCRIPTOR_POOL => "VkDescriptorPool",
            vk::ObjectType::DESCRIPTOR_SET => "VkDescriptorSet",
            vk::ObjectType::FRAMEBUFFER => "VkFramebuffer",
            vk::ObjectType::COMMAND_POOL => "VkCommandPool",
            vk::ObjectType::SWAPCHAIN_KHR => "VkSwapchainKHR",
            vk::ObjectType::VIDEO_SESSION_KHR => "VkVideoSessionKHR",
            _ => "VkObject",
        }
    }
}

impl fmt::Display for TypedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0x{:x}", self.type_name(), self.raw)
    }
}
