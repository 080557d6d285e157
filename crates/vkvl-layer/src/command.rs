//! Static per-command metadata.
//!
//! Every intercepted `vkCmd*` entry point has one row here. The admission
//! check reads only this table and the command buffer's state, so adding a
//! command never adds a code path to it.

use ash::vk;

/// Whether a command must be recorded inside or outside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Inside,
    Outside,
    Either,
}

/// Coarse classification used by the suspended-rendering gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Draws, dispatches, copies, clears and other work-producing commands
    Action,
    /// Barriers, events and render pass boundaries
    Synchronization,
    /// Everything else
    State,
}

/// Rule identifiers cited by the admission check for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandVuids {
    pub recording: &'static str,
    pub queue_flags: &'static str,
    pub buffer_level: &'static str,
    pub render_pass: &'static str,
    pub video_coding: &'static str,
    pub suspended: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Vulkan entry point name
    pub name: &'static str,
    /// The pool's queue family must support at least one of these
    pub queue_flags: vk::QueueFlags,
    pub primary_only: bool,
    pub render_pass: Scope,
    pub video_coding: Scope,
    pub kind: CommandKind,
    pub vuids: CommandVuids,
}

impl CommandInfo {
    pub fn is_action(&self) -> bool {
        self.kind == CommandKind::Action
    }

    pub fn is_synchronization(&self) -> bool {
        self.kind == CommandKind::Synchronization
    }
}

macro_rules! command_table {
    ($(
        $func:ident => $name:literal {
            queues: [$($queue:ident),+ $(,)?],
            render_pass: $rp:ident,
            video_coding: $vc:ident,
            primary_only: $primary:literal,
            kind: $kind:ident $(,)?
        }
    ),+ $(,)?) => {
        /// Identity of an intercepted command.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Func {
            $($func,)+
        }

        impl Func {
            pub const ALL: &'static [Func] = &[$(Func::$func,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Func::$func => $name,)+
                }
            }

            pub fn info(self) -> CommandInfo {
                match self {
                    $(Func::$func => CommandInfo {
                        name: $name,
                        queue_flags: vk::QueueFlags::empty() $(| vk::QueueFlags::$queue)+,
                        primary_only: $primary,
                        render_pass: Scope::$rp,
                        video_coding: Scope::$vc,
                        kind: CommandKind::$kind,
                        vuids: CommandVuids {
                            recording: concat!("VUID-", $name, "-commandBuffer-recording"),
                            queue_flags: concat!("VUID-", $name, "-commandBuffer-cmdpool"),
                            buffer_level: concat!("VUID-", $name, "-bufferlevel"),
                            render_pass: concat!("VUID-", $name, "-renderpass"),
                            video_coding: concat!("VUID-", $name, "-videocoding"),
                            suspended: concat!("VUID-", $name, "-suspended"),
                        },
                    },)+
                }
            }
        }
    };
}

command_table! {
    CmdBindPipeline => "vkCmdBindPipeline" {
        queues: [GRAPHICS, COMPUTE],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdBindDescriptorSets => "vkCmdBindDescriptorSets" {
        queues: [GRAPHICS, COMPUTE],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdSetViewport => "vkCmdSetViewport" {
        queues: [GRAPHICS],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdSetViewportWithCount => "vkCmdSetViewportWithCount" {
        queues: [GRAPHICS],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdSetScissor => "vkCmdSetScissor" {
        queues: [GRAPHICS],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdSetScissorWithCount => "vkCmdSetScissorWithCount" {
        queues: [GRAPHICS],
        render_pass: Either, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdBeginRenderPass => "vkCmdBeginRenderPass" {
        queues: [GRAPHICS],
        render_pass: Outside, video_coding: Outside, primary_only: true, kind: Synchronization,
    },
    CmdNextSubpass => "vkCmdNextSubpass" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: true, kind: Synchronization,
    },
    CmdEndRenderPass => "vkCmdEndRenderPass" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: true, kind: Synchronization,
    },
    CmdBeginRendering => "vkCmdBeginRendering" {
        queues: [GRAPHICS],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdEndRendering => "vkCmdEndRendering" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdDraw => "vkCmdDraw" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdDrawIndexed => "vkCmdDrawIndexed" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdDispatch => "vkCmdDispatch" {
        queues: [COMPUTE],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdCopyBuffer => "vkCmdCopyBuffer" {
        queues: [GRAPHICS, COMPUTE, TRANSFER],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdCopyImage => "vkCmdCopyImage" {
        queues: [GRAPHICS, COMPUTE, TRANSFER],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdClearColorImage => "vkCmdClearColorImage" {
        queues: [GRAPHICS, COMPUTE],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdClearAttachments => "vkCmdClearAttachments" {
        queues: [GRAPHICS],
        render_pass: Inside, video_coding: Outside, primary_only: false, kind: Action,
    },
    CmdPipelineBarrier => "vkCmdPipelineBarrier" {
        queues: [GRAPHICS, COMPUTE, TRANSFER, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Either, video_coding: Either, primary_only: false, kind: Synchronization,
    },
    CmdSetEvent => "vkCmdSetEvent" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Either, primary_only: false, kind: Synchronization,
    },
    CmdResetEvent => "vkCmdResetEvent" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Either, primary_only: false, kind: Synchronization,
    },
    CmdWaitEvents => "vkCmdWaitEvents" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Either, video_coding: Either, primary_only: false, kind: Synchronization,
    },
    CmdBeginQuery => "vkCmdBeginQuery" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Either, video_coding: Either, primary_only: false, kind: State,
    },
    CmdEndQuery => "vkCmdEndQuery" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Either, video_coding: Either, primary_only: false, kind: State,
    },
    CmdResetQueryPool => "vkCmdResetQueryPool" {
        queues: [GRAPHICS, COMPUTE, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Outside, primary_only: false, kind: State,
    },
    CmdWriteTimestamp => "vkCmdWriteTimestamp" {
        queues: [GRAPHICS, COMPUTE, TRANSFER, VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Either, video_coding: Either, primary_only: false, kind: Action,
    },
    CmdExecuteCommands => "vkCmdExecuteCommands" {
        queues: [GRAPHICS, COMPUTE, TRANSFER],
        render_pass: Either, video_coding: Outside, primary_only: true, kind: Action,
    },
    CmdBeginVideoCoding => "vkCmdBeginVideoCodingKHR" {
        queues: [VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Outside, primary_only: true, kind: State,
    },
    CmdControlVideoCoding => "vkCmdControlVideoCodingKHR" {
        queues: [VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Inside, primary_only: true, kind: State,
    },
    CmdDecodeVideo => "vkCmdDecodeVideoKHR" {
        queues: [VIDEO_DECODE_KHR],
        render_pass: Outside, video_coding: Inside, primary_only: true, kind: Action,
    },
    CmdEndVideoCoding => "vkCmdEndVideoCodingKHR" {
        queues: [VIDEO_DECODE_KHR, VIDEO_ENCODE_KHR],
        render_pass: Outside, video_coding: Inside, primary_only: true, kind: State,
    },
}

/// Flag names for messages, e.g. `GRAPHICS | COMPUTE`.
pub fn describe_queue_flags(flags: vk::QueueFlags) -> String {
    if flags.is_empty() {
        "none".to_string()
    } else {
        format!("{:?}", flags)
    }
}
