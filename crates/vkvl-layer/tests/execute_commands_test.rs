//! Integration test: vkCmdExecuteCommands compatibility checks and composition.

mod common;

use ash::vk;

use common::{color_range, Fixture};
use vkvl_layer::cmd_buffer::{InheritedRendering, RenderingAttachment};
use vkvl_layer::commands::SECONDARY_IMAGE_LAYOUT;
use vkvl_layer::deferred::QueryUpdate;
use vkvl_layer::objects::{FramebufferInfo, QueryPoolInfo, RenderPassInfo};
use vkvl_layer::query::{QueryObject, QueryState};
use vkvl_layer::{DeviceFeatures, ImageBarrier, ImageUse, InheritanceInfo, RenderPassBegin, RenderingInfo};

fn recorded_secondary(
    fx: &Fixture,
    flags: vk::CommandBufferUsageFlags,
    inheritance: InheritanceInfo,
) -> vk::CommandBuffer {
    let cb = fx.secondary();
    fx.begin_flags(cb, flags, inheritance);
    fx.end(cb);
    cb
}

fn plain_secondary(fx: &Fixture) -> vk::CommandBuffer {
    recorded_secondary(fx, vk::CommandBufferUsageFlags::empty(), InheritanceInfo::default())
}

fn recording_primary(fx: &Fixture) -> vk::CommandBuffer {
    let primary = fx.primary();
    fx.begin(primary);
    primary
}

fn render_pass(fx: &Fixture, subpass_count: u32) -> vk::RenderPass {
    let render_pass = fx.handle();
    fx.validator.device().record_create_render_pass(
        render_pass,
        RenderPassInfo {
            attachments: Vec::new(),
            subpass_count,
            view_mask: 0,
        },
    );
    render_pass
}

fn framebuffer(fx: &Fixture, render_pass: vk::RenderPass) -> vk::Framebuffer {
    let framebuffer = fx.handle();
    fx.validator.device().record_create_framebuffer(
        framebuffer,
        FramebufferInfo {
            render_pass,
            attachments: Vec::new(),
        },
    );
    framebuffer
}

fn begin_render_pass(
    fx: &Fixture,
    primary: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    contents: vk::SubpassContents,
) {
    fx.validator.post_call_record_cmd_begin_render_pass(
        primary,
        &RenderPassBegin {
            render_pass,
            framebuffer,
            contents,
        },
    );
}

fn color_attachment(image: vk::Image, format: vk::Format) -> RenderingAttachment {
    RenderingAttachment {
        image: Some(image),
        range: color_range(),
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }
}

fn begin_rendering(fx: &Fixture, primary: vk::CommandBuffer, flags: vk::RenderingFlags) {
    let image = fx.image();
    fx.validator.post_call_record_cmd_begin_rendering(
        primary,
        &RenderingInfo {
            flags,
            color_attachments: vec![color_attachment(image, vk::Format::R8G8B8A8_UNORM)],
            ..Default::default()
        },
    );
}

fn rendering_secondary(fx: &Fixture, rendering: InheritedRendering) -> vk::CommandBuffer {
    recorded_secondary(
        fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            rendering: Some(rendering),
            ..Default::default()
        },
    )
}

fn color_formats(formats: &[vk::Format]) -> InheritedRendering {
    InheritedRendering {
        color_formats: formats.to_vec(),
        ..Default::default()
    }
}

#[test]
fn test_execute_links_secondary_into_primary() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let secondary = plain_secondary(&fx);

    assert!(!fx.execute(primary, &[secondary]));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());

    let device = fx.validator.device();
    let (linked, last_update, nesting) = device
        .with_read(primary, |cb| {
            (
                cb.linked_command_buffers.clone(),
                cb.query_updates.last().cloned(),
                cb.nesting_level,
            )
        })
        .expect("primary is tracked");
    assert_eq!(linked, vec![secondary]);
    assert_eq!(last_update, Some(QueryUpdate::ExecuteSecondary { secondary }));
    assert_eq!(nesting, 1);

    let primaries = device
        .with_read(secondary, |cb| cb.linked_primaries.clone())
        .expect("secondary is tracked");
    assert!(primaries.contains(&primary));
}

#[test]
fn test_primary_cannot_be_executed() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let other = fx.primary();
    fx.begin(other);
    fx.end(other);

    assert!(fx.execute(primary, &[other]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00088");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].ends_with("is not VK_COMMAND_BUFFER_LEVEL_SECONDARY."));
}

#[test]
fn test_buffer_cannot_execute_itself() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);

    assert!(fx.execute(primary, &[primary]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00088");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].ends_with("cannot execute itself."));
}

#[test]
fn test_secondary_must_be_executable() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let still_recording = fx.secondary();
    fx.begin_secondary(still_recording, InheritanceInfo::default());

    assert!(fx.execute(primary, &[still_recording]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00089");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("is in state Recording"));
}

#[test]
fn test_invalidated_secondary_lists_its_causes() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let image = fx.image();
    let secondary = fx.secondary();
    fx.begin_secondary(secondary, InheritanceInfo::default());
    fx.validator.post_call_record_cmd_clear_color_image(
        secondary,
        &ImageUse {
            image,
            layout: vk::ImageLayout::GENERAL,
            range: color_range(),
        },
    );
    fx.end(secondary);
    fx.validator
        .device()
        .record_destroy_object(vkvl_core::TypedHandle::new(image));

    assert!(fx.execute(primary, &[secondary]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00089");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("is invalid because bound VkImage"));
    assert!(messages[0].ends_with("was destroyed."));
}

#[test]
fn test_repeated_secondary_without_simultaneous_use() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let secondary = plain_secondary(&fx);

    assert!(fx.execute(primary, &[secondary, secondary]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00093");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("appears in pCommandBuffers[0] and pCommandBuffers[1]"));

    fx.sink.clear();
    assert!(fx.execute(primary, &[secondary]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-pCommandBuffers-00092"));
}

#[test]
fn test_simultaneous_use_secondary_may_repeat() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let secondary = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
        InheritanceInfo::default(),
    );

    assert!(!fx.execute(primary, &[secondary, secondary]));
    assert!(!fx.execute(primary, &[secondary]));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

#[test]
fn test_pending_secondary_without_simultaneous_use() {
    let fx = Fixture::new();
    let secondary = plain_secondary(&fx);

    let first = recording_primary(&fx);
    fx.execute(first, &[secondary]);
    fx.end(first);
    let (_, seq) = fx.submit(&[first]);
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());

    let second = recording_primary(&fx);
    assert!(fx.execute(second, &[secondary]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-pCommandBuffers-00091"));

    fx.validator.retire_submission(fx.queue, seq);
    fx.sink.clear();
    let third = recording_primary(&fx);
    assert!(!fx.execute(third, &[secondary]));
}

#[test]
fn test_queue_family_must_match() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    let secondary = fx.allocate_in(fx.transfer_pool, vk::CommandBufferLevel::SECONDARY);
    fx.begin_secondary(secondary, InheritanceInfo::default());
    fx.end(secondary);

    assert!(fx.execute(primary, &[secondary]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00094");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("queue family index 1"));
}

#[test]
fn test_protected_mismatch_both_ways() {
    let fx = Fixture::new();
    let protected_pool = fx.create_pool(
        common::GRAPHICS_FAMILY,
        vk::CommandPoolCreateFlags::PROTECTED | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
    );

    let protected_primary = fx.allocate_in(protected_pool, vk::CommandBufferLevel::PRIMARY);
    fx.begin(protected_primary);
    let unprotected = plain_secondary(&fx);
    assert!(fx.execute(protected_primary, &[unprotected]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-commandBuffer-01820"));

    let unprotected_primary = recording_primary(&fx);
    let protected_secondary = fx.allocate_in(protected_pool, vk::CommandBufferLevel::SECONDARY);
    fx.begin_secondary(protected_secondary, InheritanceInfo::default());
    fx.end(protected_secondary);
    assert!(fx.execute(unprotected_primary, &[protected_secondary]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-commandBuffer-01821"));
}

#[test]
fn test_render_pass_continue_flag_must_match_scope() {
    let fx = Fixture::new();
    let rp = render_pass(&fx, 2);
    let fb = framebuffer(&fx, rp);

    let primary = recording_primary(&fx);
    let continuing = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            render_pass: Some(rp),
            framebuffer: Some(fb),
            ..Default::default()
        },
    );
    assert!(fx.execute(primary, &[continuing]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-pCommandBuffers-00100"));

    fx.sink.clear();
    let in_pass = recording_primary(&fx);
    begin_render_pass(&fx, in_pass, rp, fb, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS);
    let plain = plain_secondary(&fx);
    assert!(fx.execute(in_pass, &[plain]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-00096");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("within a render pass instance scope"));
}

#[test]
fn test_inherited_render_pass_state() {
    let fx = Fixture::new();
    let rp = render_pass(&fx, 2);
    let incompatible = render_pass(&fx, 3);
    let fb = framebuffer(&fx, rp);
    let other_fb = framebuffer(&fx, rp);

    let primary = recording_primary(&fx);
    begin_render_pass(&fx, primary, rp, fb, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS);

    let matching = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            render_pass: Some(rp),
            framebuffer: Some(fb),
            ..Default::default()
        },
    );
    assert!(!fx.execute(primary, &[matching]));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());

    let wrong_subpass = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            render_pass: Some(rp),
            subpass: 1,
            ..Default::default()
        },
    );
    let wrong_pass = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            render_pass: Some(incompatible),
            ..Default::default()
        },
    );
    let wrong_framebuffer = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo {
            render_pass: Some(rp),
            framebuffer: Some(other_fb),
            ..Default::default()
        },
    );
    assert!(fx.execute(primary, &[wrong_subpass, wrong_pass, wrong_framebuffer]));

    let subpass = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pCommandBuffers-06019");
    assert_eq!(subpass.len(), 1);
    assert!(subpass[0].contains("subpass 1, but the current subpass is 0"));
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-pBeginInfo-06020"), 1);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-pCommandBuffers-00099"), 1);
}

#[test]
fn test_inline_subpass_rejects_execute() {
    let fx = Fixture::new();
    let rp = render_pass(&fx, 1);
    let fb = framebuffer(&fx, rp);
    let primary = recording_primary(&fx);
    begin_render_pass(&fx, primary, rp, fb, vk::SubpassContents::INLINE);

    assert!(fx.execute(primary, &[]));
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-contents-06018"), 1);
}

#[test]
fn test_dynamic_rendering_needs_secondary_contents_flag() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    begin_rendering(&fx, primary, vk::RenderingFlags::empty());
    let secondary = rendering_secondary(&fx, color_formats(&[vk::Format::R8G8B8A8_UNORM]));

    assert!(fx.execute(primary, &[secondary]));
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-flags-06024"), 1);
    assert_eq!(fx.sink.len(), 1, "{:?}", fx.sink.messages());
}

#[test]
fn test_dynamic_rendering_inheritance_matches() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    begin_rendering(&fx, primary, vk::RenderingFlags::CONTENTS_SECONDARY_COMMAND_BUFFERS);
    let secondary = rendering_secondary(&fx, color_formats(&[vk::Format::R8G8B8A8_UNORM]));

    assert!(!fx.execute(primary, &[secondary]));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

#[test]
fn test_dynamic_rendering_inheritance_mismatches() {
    let fx = Fixture::new();
    let primary = recording_primary(&fx);
    begin_rendering(
        &fx,
        primary,
        vk::RenderingFlags::CONTENTS_SECONDARY_COMMAND_BUFFERS | vk::RenderingFlags::SUSPENDING,
    );

    let wrong_format = rendering_secondary(&fx, color_formats(&[vk::Format::B8G8R8A8_UNORM]));
    let wrong_count = rendering_secondary(
        &fx,
        color_formats(&[vk::Format::R8G8B8A8_UNORM, vk::Format::R8G8B8A8_UNORM]),
    );
    let wrong_view_mask = rendering_secondary(
        &fx,
        InheritedRendering {
            view_mask: 0b11,
            ..color_formats(&[vk::Format::R8G8B8A8_UNORM])
        },
    );
    let wrong_samples = rendering_secondary(
        &fx,
        InheritedRendering {
            color_attachment_samples: vec![vk::SampleCountFlags::TYPE_4],
            ..color_formats(&[vk::Format::R8G8B8A8_UNORM])
        },
    );
    let no_rendering = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
        InheritanceInfo::default(),
    );

    assert!(fx.execute(
        primary,
        &[wrong_format, wrong_count, wrong_view_mask, wrong_samples, no_rendering]
    ));

    // Every secondary above lacks SUSPENDING.
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-flags-06026"), 4);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-imageView-06028"), 1);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-colorAttachmentCount-06027"), 1);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-viewMask-06031"), 1);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-pNext-06035"), 1);
    let missing = fx.sink.messages_for("VUID-vkCmdExecuteCommands-pBeginInfo-06025");
    assert_eq!(missing.len(), 1);
    assert!(missing[0].contains("was not begun with VkCommandBufferInheritanceRenderingInfo"));
}

#[test]
fn test_active_occlusion_query_needs_inheritance() {
    let fx = Fixture::new();
    let pool = fx.query_pool(vk::QueryType::OCCLUSION, 1);
    let primary = recording_primary(&fx);
    fx.validator
        .post_call_record_cmd_begin_query(primary, pool, 0, vk::QueryControlFlags::PRECISE);

    let disabled = plain_secondary(&fx);
    let imprecise = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::empty(),
        InheritanceInfo {
            occlusion_query_enable: true,
            ..Default::default()
        },
    );
    let precise = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::empty(),
        InheritanceInfo {
            occlusion_query_enable: true,
            query_flags: vk::QueryControlFlags::PRECISE,
            ..Default::default()
        },
    );

    assert!(fx.execute(primary, &[disabled, imprecise, precise]));
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-commandBuffer-00101"), 1);
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-commandBuffer-00102"), 1);
    assert_eq!(fx.sink.len(), 2);
}

#[test]
fn test_active_pipeline_statistics_query_needs_inheritance() {
    let fx = Fixture::new();
    let pool = fx.handle();
    let statistics = vk::QueryPipelineStatisticFlags::VERTEX_SHADER_INVOCATIONS
        | vk::QueryPipelineStatisticFlags::FRAGMENT_SHADER_INVOCATIONS;
    fx.validator.device().record_create_query_pool(
        pool,
        QueryPoolInfo {
            query_type: vk::QueryType::PIPELINE_STATISTICS,
            query_count: 1,
            pipeline_statistics: statistics,
        },
    );
    let primary = recording_primary(&fx);
    fx.validator
        .post_call_record_cmd_begin_query(primary, pool, 0, vk::QueryControlFlags::empty());

    let partial = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::empty(),
        InheritanceInfo {
            pipeline_statistics: vk::QueryPipelineStatisticFlags::VERTEX_SHADER_INVOCATIONS,
            ..Default::default()
        },
    );
    let full = recorded_secondary(
        &fx,
        vk::CommandBufferUsageFlags::empty(),
        InheritanceInfo {
            pipeline_statistics: statistics,
            ..Default::default()
        },
    );

    assert!(fx.execute(primary, &[partial, full]));
    assert_eq!(fx.sink.count("VUID-vkCmdExecuteCommands-commandBuffer-00104"), 1);
    assert_eq!(fx.sink.len(), 1);
}

fn layout_fixture(features: DeviceFeatures) -> (Fixture, vk::CommandBuffer, vk::CommandBuffer, vk::Image) {
    let fx = Fixture::with_features(features);
    let image = fx.image();
    let primary = recording_primary(&fx);
    fx.validator.post_call_record_cmd_pipeline_barrier(
        primary,
        &[ImageBarrier::layout_transition(
            image,
            color_range(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )],
    );

    let secondary = fx.secondary();
    fx.begin_secondary(secondary, InheritanceInfo::default());
    fx.validator.post_call_record_cmd_clear_color_image(
        secondary,
        &ImageUse {
            image,
            layout: vk::ImageLayout::GENERAL,
            range: color_range(),
        },
    );
    fx.end(secondary);
    (fx, primary, secondary, image)
}

#[test]
fn test_secondary_expects_primary_layout() {
    let (fx, primary, secondary, image) = layout_fixture(DeviceFeatures::default());

    assert!(fx.execute(primary, &[secondary]));
    assert_eq!(fx.sink.count(SECONDARY_IMAGE_LAYOUT), 1);

    // The primary now carries the secondary's final layout.
    let current = fx
        .validator
        .device()
        .with_read(primary, |cb| {
            let map = cb.image_layouts.get(&image).expect("image tracked in primary");
            map.current(&map.expand(&color_range())[0])
        })
        .expect("primary is tracked");
    assert_eq!(current, Some(vk::ImageLayout::GENERAL));
}

#[test]
fn test_secondary_layout_check_off_with_custom_resolve() {
    let (fx, primary, secondary, _) = layout_fixture(DeviceFeatures {
        custom_resolve: true,
        ..Default::default()
    });

    assert!(!fx.execute(primary, &[secondary]));
    assert!(!fx.sink.has(SECONDARY_IMAGE_LAYOUT));
}

#[test]
fn test_nesting_depth_limit() {
    let fx = Fixture::with_features(DeviceFeatures {
        nested_command_buffer: true,
        max_command_buffer_nesting_level: 1,
        ..Default::default()
    });
    let innermost = plain_secondary(&fx);

    let middle = fx.secondary();
    fx.begin_secondary(middle, InheritanceInfo::default());
    assert!(!fx.execute(middle, &[innermost]));
    fx.end(middle);

    let outer = fx.secondary();
    fx.begin_secondary(outer, InheritanceInfo::default());
    assert!(fx.execute(outer, &[middle]));
    let messages = fx.sink.messages_for("VUID-vkCmdExecuteCommands-nestedCommandBuffer-09376");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("nesting level of 1"));
}

#[test]
fn test_nesting_needs_the_feature() {
    let fx = Fixture::new();
    let inner = plain_secondary(&fx);
    let outer = fx.secondary();
    fx.begin_secondary(outer, InheritanceInfo::default());

    assert!(fx.execute(outer, &[inner]));
    assert!(fx.sink.has("VUID-vkCmdExecuteCommands-bufferlevel"));
}

#[test]
fn test_secondary_queries_replay_at_execute_position() {
    let fx = Fixture::new();
    let pool = fx.query_pool(vk::QueryType::OCCLUSION, 1);
    fx.validator.record_reset_query_pool_host(pool, 0, 1);
    let query = QueryObject::new(pool, 0);

    let primary = recording_primary(&fx);
    fx.validator
        .post_call_record_cmd_begin_query(primary, pool, 0, vk::QueryControlFlags::empty());

    let secondary = fx.secondary();
    fx.begin_secondary(
        secondary,
        InheritanceInfo {
            occlusion_query_enable: true,
            ..Default::default()
        },
    );
    fx.validator.post_call_record_cmd_end_query(secondary, pool, 0);
    fx.end(secondary);

    assert!(!fx.execute(primary, &[secondary]));
    fx.validator.post_call_record_end_command_buffer(primary);

    let (_, seq) = fx.submit(&[primary]);
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
    assert_eq!(fx.validator.device().query_state(&query), QueryState::Ended);

    fx.validator.retire_submission(fx.queue, seq);
    assert_eq!(fx.validator.device().query_state(&query), QueryState::Available);
}

#[test]
fn test_reset_after_execute_comes_too_late() {
    let fx = Fixture::new();
    let pool = fx.query_pool(vk::QueryType::TIMESTAMP, 1);

    let secondary = fx.secondary();
    fx.begin_secondary(secondary, InheritanceInfo::default());
    fx.validator.post_call_record_cmd_write_timestamp(
        secondary,
        vk::PipelineStageFlags2::ALL_COMMANDS,
        pool,
        0,
    );
    fx.end(secondary);

    let late = recording_primary(&fx);
    fx.execute(late, &[secondary]);
    fx.validator.post_call_record_cmd_reset_query_pool(late, pool, 0, 1);
    fx.end(late);
    fx.submit(&[late]);
    assert_eq!(fx.sink.count("VUID-vkCmdWriteTimestamp-None-00830"), 1);

    fx.validator.queue_wait_idle(fx.queue);
    fx.sink.clear();
    fx.validator.record_reset_query_pool_host(pool, 0, 1);

    let secondary = recorded_timestamp_secondary(&fx, pool);
    let early = recording_primary(&fx);
    fx.validator.post_call_record_cmd_reset_query_pool(early, pool, 0, 1);
    fx.execute(early, &[secondary]);
    fx.end(early);
    fx.submit(&[early]);
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

fn recorded_timestamp_secondary(fx: &Fixture, pool: vk::QueryPool) -> vk::CommandBuffer {
    let secondary = fx.secondary();
    fx.begin_secondary(secondary, InheritanceInfo::default());
    fx.validator.post_call_record_cmd_write_timestamp(
        secondary,
        vk::PipelineStageFlags2::ALL_COMMANDS,
        pool,
        0,
    );
    fx.end(secondary);
    secondary
}
