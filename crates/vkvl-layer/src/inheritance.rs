//! Viewport/scissor inheritance simulation for `vkCmdExecuteCommands`.
//!
//! With `VK_NV_inherited_viewport_scissor`, a secondary may draw with
//! viewport and scissor state it never set. The tracker replays what a
//! driver would hand each secondary in a single `vkCmdExecuteCommands` call:
//! the primary's state first, then every secondary in execution order, each
//! of which may define more state or leave some undefined by binding a
//! pipeline with static state. Secondaries that inherit are checked against
//! that running picture.
//!
//! Visits must happen in (primary, secondary 0, secondary 1, ...) order;
//! the trashed-by markers name the participant that lost each slot.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::{CommandBuffer, MAX_VIEWPORTS};
use crate::error_sink::Location;
use crate::validator::Validator;

pub const INHERITED_STATE_UNDEFINED: &str = "VUID-vkCmdDraw-None-07850";

/// Who left a slot undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashedBy {
    NotTrashed,
    /// The calling primary, by an earlier vkCmdExecuteCommands or a bind
    Primary,
    /// `pCommandBuffers[index]` of this call
    Secondary(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InheritedState {
    Viewport,
    Scissor,
    ViewportCount,
    ScissorCount,
}

impl InheritedState {
    fn name(self) -> &'static str {
        match self {
            InheritedState::Viewport => "viewport",
            InheritedState::Scissor => "scissor",
            InheritedState::ViewportCount => "dynamic viewport count",
            InheritedState::ScissorCount => "dynamic scissor count",
        }
    }

    fn is_indexed(self) -> bool {
        matches!(self, InheritedState::Viewport | InheritedState::Scissor)
    }
}

/// One slot or count consumed by an inheriting secondary.
struct Consumed<'v> {
    state: InheritedState,
    defined: bool,
    trashed_by: TrashedBy,
    index: u32,
    static_use_count: u32,
    /// Inherited value and the secondary's expected depth range (viewports only)
    depths: Option<(&'v vk::Viewport, &'v vk::Viewport)>,
}

pub struct ViewportScissorInheritanceTracker<'a> {
    validator: &'a Validator,
    loc: &'a Location,
    primary: Option<TypedHandle>,
    viewport_mask: u32,
    scissor_mask: u32,
    viewport_trashed_by: [TrashedBy; MAX_VIEWPORTS],
    scissor_trashed_by: [TrashedBy; MAX_VIEWPORTS],
    viewports_to_inherit: [vk::Viewport; MAX_VIEWPORTS],
    /// 0 if the count was never defined (which is not the same as trashed)
    viewport_count_to_inherit: u32,
    scissor_count_to_inherit: u32,
    viewport_count_trashed_by: TrashedBy,
    scissor_count_trashed_by: TrashedBy,
}

impl<'a> ViewportScissorInheritanceTracker<'a> {
    pub fn new(validator: &'a Validator, loc: &'a Location) -> Self {
        let empty = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_depth: 0.0,
            max_depth: 0.0,
        };
        Self {
            validator,
            loc,
            primary: None,
            viewport_mask: 0,
            scissor_mask: 0,
            viewport_trashed_by: [TrashedBy::NotTrashed; MAX_VIEWPORTS],
            scissor_trashed_by: [TrashedBy::NotTrashed; MAX_VIEWPORTS],
            viewports_to_inherit: [empty; MAX_VIEWPORTS],
            viewport_count_to_inherit: 0,
            scissor_count_to_inherit: 0,
            viewport_count_trashed_by: TrashedBy::NotTrashed,
            scissor_count_trashed_by: TrashedBy::NotTrashed,
        }
    }

    pub fn visit_primary(&mut self, primary: &CommandBuffer) -> bool {
        debug_assert!(self.primary.is_none(), "primary visited twice");
        self.primary = Some(primary.typed());
        let vs = &primary.viewport_scissor;

        self.viewport_mask = vs.viewport_mask | vs.viewport_with_count_mask;
        self.scissor_mask = vs.scissor_mask | vs.scissor_with_count_mask;

        for n in 0..MAX_VIEWPORTS {
            let bit = 1u32 << n;
            self.viewport_trashed_by[n] = trashed_by_primary(vs.viewport_trashed_mask & bit != 0);
            self.scissor_trashed_by[n] = trashed_by_primary(vs.scissor_trashed_mask & bit != 0);
            if self.viewport_mask & bit != 0 {
                self.viewports_to_inherit[n] = vs.viewports[n];
            }
        }

        self.viewport_count_to_inherit = vs.viewport_with_count_count;
        self.scissor_count_to_inherit = vs.scissor_with_count_count;
        self.viewport_count_trashed_by = trashed_by_primary(vs.viewport_trashed_count);
        self.scissor_count_trashed_by = trashed_by_primary(vs.scissor_trashed_count);
        false
    }

    pub fn visit_secondary(&mut self, index: u32, secondary: &CommandBuffer) -> bool {
        let mut skip = false;
        if secondary.viewport_scissor.inherits() {
            skip |= self.visit_secondary_inheritance(index, secondary);
        } else {
            self.visit_secondary_no_inheritance(index, secondary);
        }

        // Even inheriting secondaries may bind pipelines with a static count.
        let vs = &secondary.viewport_scissor;
        if vs.viewport_trashed_count {
            self.viewport_count_trashed_by = TrashedBy::Secondary(index);
        }
        if vs.scissor_trashed_count {
            self.scissor_count_trashed_by = TrashedBy::Secondary(index);
        }
        skip
    }

    fn visit_secondary_no_inheritance(&mut self, index: u32, secondary: &CommandBuffer) {
        let vs = &secondary.viewport_scissor;
        let viewports_set = vs.viewport_mask | vs.viewport_with_count_mask;
        let scissors_set = vs.scissor_mask | vs.scissor_with_count_mask;
        self.viewport_mask |= viewports_set;
        self.scissor_mask |= scissors_set;

        if vs.viewport_with_count_count != 0 {
            self.viewport_count_to_inherit = vs.viewport_with_count_count;
            self.viewport_count_trashed_by = TrashedBy::NotTrashed;
        }
        if vs.scissor_with_count_count != 0 {
            self.scissor_count_to_inherit = vs.scissor_with_count_count;
            self.scissor_count_trashed_by = TrashedBy::NotTrashed;
        }

        for n in 0..MAX_VIEWPORTS {
            let bit = 1u32 << n;
            if viewports_set & bit != 0 {
                self.viewports_to_inherit[n] = vs.viewports[n];
                self.viewport_trashed_by[n] = TrashedBy::NotTrashed;
            }
            if scissors_set & bit != 0 {
                self.scissor_trashed_by[n] = TrashedBy::NotTrashed;
            }
            // A trash recorded in the secondary overrides a set from it.
            if vs.viewport_trashed_mask & bit != 0 {
                self.viewport_trashed_by[n] = TrashedBy::Secondary(index);
            }
            if vs.scissor_trashed_mask & bit != 0 {
                self.scissor_trashed_by[n] = TrashedBy::Secondary(index);
            }
        }
    }

    fn visit_secondary_inheritance(&self, index: u32, secondary: &CommandBuffer) -> bool {
        let vs = &secondary.viewport_scissor;
        let depths = &vs.inherited_viewport_depths;
        let mut skip = false;
        let mut check_viewport_count = 0;
        let mut check_scissor_count = 0;

        if vs.used_dynamic_viewport_count {
            if self.viewport_count_to_inherit == 0 || self.viewport_count_trashed_by != TrashedBy::NotTrashed {
                skip |= self.check_missing_inherit(
                    index,
                    secondary,
                    Consumed {
                        state: InheritedState::ViewportCount,
                        defined: self.viewport_count_to_inherit != 0,
                        trashed_by: self.viewport_count_trashed_by,
                        index: 0,
                        static_use_count: 0,
                        depths: None,
                    },
                );
            } else {
                check_viewport_count = self.viewport_count_to_inherit;
            }
        }
        if vs.used_dynamic_scissor_count {
            if self.scissor_count_to_inherit == 0 || self.scissor_count_trashed_by != TrashedBy::NotTrashed {
                skip |= self.check_missing_inherit(
                    index,
                    secondary,
                    Consumed {
                        state: InheritedState::ScissorCount,
                        defined: self.scissor_count_to_inherit != 0,
                        trashed_by: self.scissor_count_trashed_by,
                        index: 0,
                        static_use_count: 0,
                        depths: None,
                    },
                );
            } else {
                check_scissor_count = self.scissor_count_to_inherit;
            }
        }

        // Bounded by the depth array and by the mask width.
        let max_viewports = MAX_VIEWPORTS as u32;
        let check_viewport_count = max_viewports
            .min(depths.len() as u32)
            .min(check_viewport_count.max(vs.used_viewport_scissor_count));
        let check_scissor_count = max_viewports.min(check_scissor_count.max(vs.used_viewport_scissor_count));

        if vs.used_dynamic_viewport_count && self.viewport_count_to_inherit as usize > depths.len() {
            skip |= self.validator.log_error(
                INHERITED_STATE_UNDEFINED,
                &self.objects(secondary),
                self.loc,
                format!(
                    "Draw commands in pCommandBuffers[{}] ({}) consume inherited dynamic viewport with count \
                     state but the dynamic viewport count ({}) exceeds the inheritance limit \
                     (viewportDepthCount={}).",
                    index,
                    secondary.typed(),
                    self.viewport_count_to_inherit,
                    depths.len()
                ),
            );
        }

        for n in 0..check_viewport_count {
            let slot = n as usize;
            skip |= self.check_missing_inherit(
                index,
                secondary,
                Consumed {
                    state: InheritedState::Viewport,
                    defined: self.viewport_mask & (1 << n) != 0,
                    trashed_by: self.viewport_trashed_by[slot],
                    index: n,
                    static_use_count: vs.used_viewport_scissor_count,
                    depths: Some((&self.viewports_to_inherit[slot], &depths[slot])),
                },
            );
        }

        for n in 0..check_scissor_count {
            skip |= self.check_missing_inherit(
                index,
                secondary,
                Consumed {
                    state: InheritedState::Scissor,
                    defined: self.scissor_mask & (1 << n) != 0,
                    trashed_by: self.scissor_trashed_by[n as usize],
                    index: n,
                    static_use_count: vs.used_viewport_scissor_count,
                    depths: None,
                },
            );
        }
        skip
    }

    fn objects(&self, secondary: &CommandBuffer) -> Vec<TypedHandle> {
        let mut objects = Vec::with_capacity(2);
        objects.extend(self.primary);
        objects.push(secondary.typed());
        objects
    }

    fn check_missing_inherit(&self, cb_index: u32, secondary: &CommandBuffer, consumed: Consumed<'_>) -> bool {
        let with_count = if consumed.index >= consumed.static_use_count {
            "(with count) "
        } else {
            ""
        };

        if consumed.defined && consumed.trashed_by == TrashedBy::NotTrashed {
            let Some((inherited, expected)) = consumed.depths else {
                return false;
            };
            if inherited.min_depth == expected.min_depth && inherited.max_depth == expected.max_depth {
                return false;
            }
            return self.validator.log_error(
                INHERITED_STATE_UNDEFINED,
                &self.objects(secondary),
                self.loc,
                format!(
                    "Draw commands in pCommandBuffers[{}] ({}) consume inherited viewport {} {}but this state \
                     was not inherited as its depth range [{}, {}] does not match pViewportDepths[{}] = [{}, {}]",
                    cb_index,
                    secondary.typed(),
                    consumed.index,
                    with_count,
                    inherited.min_depth,
                    inherited.max_depth,
                    consumed.index,
                    expected.min_depth,
                    expected.max_depth
                ),
            );
        }

        let mut message = format!(
            "Draw commands in pCommandBuffers[{}] ({}) consume inherited {} ",
            cb_index,
            secondary.typed(),
            consumed.state.name()
        );
        if consumed.state.is_indexed() {
            message.push_str(with_count);
            message.push_str(&format!("{} ", consumed.index));
        }
        message.push_str("but this state ");
        match (consumed.defined, consumed.trashed_by) {
            (false, _) => message.push_str("was never defined."),
            (true, TrashedBy::Secondary(by)) => message.push_str(&format!(
                "was left undefined after vkCmdBindPipeline (with non-dynamic state) in pCommandBuffers[{}].",
                by
            )),
            (true, _) => message.push_str(
                "was left undefined after vkCmdExecuteCommands or vkCmdBindPipeline (with non-dynamic state) \
                 in the calling primary command buffer.",
            ),
        }
        self.validator
            .log_error(INHERITED_STATE_UNDEFINED, &self.objects(secondary), self.loc, message)
    }
}

fn trashed_by_primary(trashed: bool) -> TrashedBy {
    if trashed {
        TrashedBy::Primary
    } else {
        TrashedBy::NotTrashed
    }
}
