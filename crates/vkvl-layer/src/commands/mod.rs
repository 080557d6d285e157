//! The produced surface: one `pre_call_validate_*` / `post_call_record_*`
//! pair per intercepted entry point.
//!
//! Validation takes a shared lock on the command buffer and never mutates
//! tracked state. Recording takes the exclusive lock. Both are no-ops for
//! unknown handles.

mod action;
mod dynamic_state;
mod recording;
mod render_pass;
mod secondary;
mod submit;
mod sync;
mod query;
mod video;

pub use action::ImageUse;
pub use render_pass::RenderPassBegin;
pub use secondary::SECONDARY_IMAGE_LAYOUT;
pub use submit::SINGLE_SUBMIT_VIOLATION;
pub use sync::ImageBarrier;

use ash::vk;

use crate::cmd_buffer::CommandBuffer;
use crate::image_layout::ImageLayoutMap;
use crate::validator::Validator;

impl Validator {
    /// The buffer's layout map for `image`, created on first use. `None` for
    /// untracked images.
    pub(crate) fn layout_map_mut<'c>(
        &self,
        cb: &'c mut CommandBuffer,
        image: vk::Image,
    ) -> Option<&'c mut ImageLayoutMap> {
        let state = self.device().image(image)?;
        Some(
            cb.image_layouts
                .entry(image)
                .or_insert_with(|| state.new_layout_map()),
        )
    }

    /// Shared-lock validation with a `false` default for unknown handles.
    pub(crate) fn validate_with<F>(&self, command_buffer: vk::CommandBuffer, f: F) -> bool
    where
        F: FnOnce(&CommandBuffer) -> bool,
    {
        self.device().with_read(command_buffer, f).unwrap_or(false)
    }

    pub(crate) fn record_with<F>(&self, command_buffer: vk::CommandBuffer, f: F)
    where
        F: FnOnce(&mut CommandBuffer),
    {
        self.device().with_write(command_buffer, f);
    }
}
