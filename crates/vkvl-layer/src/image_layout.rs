//! Per-subresource image layout tracking.
//!
//! Each command buffer builds a [`LayoutRegistry`] while recording: for every
//! subresource it touches, the layout it expects on first use (`initial`) and
//! the layout it leaves behind (`current`). The same map type holds the
//! device-wide layout of every image, which submissions commit into.

use std::collections::{BTreeMap, HashMap};

use ash::vk;

/// `VK_IMAGE_LAYOUT_RENDERING_LOCAL_READ_KHR`
pub const RENDERING_LOCAL_READ: vk::ImageLayout = vk::ImageLayout::from_raw(1_000_232_000);

/// One (aspect, mip level, array layer) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subresource {
    /// A single `VkImageAspectFlagBits` value
    pub aspect: u32,
    pub mip_level: u32,
    pub array_layer: u32,
}

impl Subresource {
    pub fn aspect_flags(&self) -> vk::ImageAspectFlags {
        vk::ImageAspectFlags::from_raw(self.aspect)
    }
}

/// Expand `range` into individual subresources of an image with the given
/// extents, resolving `VK_REMAINING_*` and clamping to the image.
pub fn subresources(
    range: &vk::ImageSubresourceRange,
    mip_levels: u32,
    array_layers: u32,
) -> Vec<Subresource> {
    let level_end = resolve_end(range.base_mip_level, range.level_count, mip_levels);
    let layer_end = resolve_end(range.base_array_layer, range.layer_count, array_layers);
    let aspects = range.aspect_mask.as_raw();

    let mut out = Vec::new();
    for bit in 0..u32::BITS {
        let aspect = 1u32 << bit;
        if aspects & aspect == 0 {
            continue;
        }
        for mip_level in range.base_mip_level..level_end {
            for array_layer in range.base_array_layer..layer_end {
                out.push(Subresource {
                    aspect,
                    mip_level,
                    array_layer,
                });
            }
        }
    }
    out
}

// Same value as VK_REMAINING_ARRAY_LAYERS.
const REMAINING: u32 = vk::REMAINING_MIP_LEVELS;

fn resolve_end(base: u32, count: u32, total: u32) -> u32 {
    if count == REMAINING {
        total
    } else {
        base.saturating_add(count).min(total)
    }
}

/// Observed layouts for one subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutEntry {
    /// Layout the subresource must be in before this recording touches it
    pub initial: Option<vk::ImageLayout>,
    /// Layout the subresource is left in
    pub current: Option<vk::ImageLayout>,
}

/// A subresource whose layout differs from what a command expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMismatch {
    pub subresource: Subresource,
    pub expected: vk::ImageLayout,
    pub actual: vk::ImageLayout,
}

#[derive(Debug, Clone, Default)]
pub struct ImageLayoutMap {
    mip_levels: u32,
    array_layers: u32,
    entries: BTreeMap<Subresource, LayoutEntry>,
}

impl ImageLayoutMap {
    pub fn new(mip_levels: u32, array_layers: u32) -> Self {
        Self {
            mip_levels,
            array_layers,
            entries: BTreeMap::new(),
        }
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn current(&self, subresource: &Subresource) -> Option<vk::ImageLayout> {
        self.entries.get(subresource).and_then(|e| e.current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Subresource, &LayoutEntry)> {
        self.entries.iter()
    }

    pub fn expand(&self, range: &vk::ImageSubresourceRange) -> Vec<Subresource> {
        subresources(range, self.mip_levels, self.array_layers)
    }

    /// Record a layout transition (`old` → `new`) over `range`.
    pub fn transition(
        &mut self,
        range: &vk::ImageSubresourceRange,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        for sub in self.expand(range) {
            let entry = self.entries.entry(sub).or_default();
            if entry.initial.is_none() && entry.current.is_none() {
                entry.initial = Some(old);
            }
            entry.current = Some(new);
        }
    }

    /// Record that a command uses `range` in `layout` without transitioning it.
    ///
    /// Returns the first subresource already known to be in another layout;
    /// that subresource keeps its tracked layout.
    pub fn expect(
        &mut self,
        range: &vk::ImageSubresourceRange,
        layout: vk::ImageLayout,
    ) -> Option<LayoutMismatch> {
        let mut mismatch = None;
        for sub in self.expand(range) {
            let entry = self.entries.entry(sub).or_default();
            match entry.current {
                Some(actual) if actual != layout => {
                    if mismatch.is_none() {
                        mismatch = Some(LayoutMismatch {
                            subresource: sub,
                            expected: layout,
                            actual,
                        });
                    }
                }
                Some(_) => {}
                None => {
                    entry.initial = Some(layout);
                    entry.current = Some(layout);
                }
            }
        }
        mismatch
    }

    /// Apply the effects of a later recording on top of this one.
    ///
    /// Subresources this map has never seen inherit `other`'s initial layout;
    /// every subresource `other` left in a known layout takes that layout.
    pub fn merge(&mut self, other: &ImageLayoutMap) {
        for (sub, theirs) in other.entries.iter() {
            let ours = self.entries.entry(*sub).or_default();
            if ours.initial.is_none() && ours.current.is_none() {
                ours.initial = theirs.initial;
            }
            if theirs.current.is_some() {
                ours.current = theirs.current;
            }
        }
    }
}

/// Layout maps of every image one command buffer (or submission) touched.
pub type LayoutRegistry = HashMap<vk::Image, ImageLayoutMap>;

/// Whole-image range covering every aspect in `aspect_mask`.
pub fn full_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}
