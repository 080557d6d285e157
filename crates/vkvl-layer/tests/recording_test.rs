//! Integration test: record-time render pass, query and image usage checks.

mod common;

use ash::vk;

use common::{color_range, Fixture};
use vkvl_layer::cmd_buffer::RenderingAttachment;
use vkvl_layer::objects::{AttachmentDescription, FramebufferAttachment, FramebufferInfo, RenderPassInfo};
use vkvl_layer::query::{QueryObject, QueryState};
use vkvl_layer::submission::INVALID_IMAGE_LAYOUT;
use vkvl_layer::{ImageBarrier, ImageUse, RenderPassBegin, RenderingInfo};

fn render_pass(fx: &Fixture, subpass_count: u32, view_mask: u32) -> (vk::RenderPass, vk::Framebuffer) {
    let render_pass = fx.handle();
    fx.validator.device().record_create_render_pass(
        render_pass,
        RenderPassInfo {
            attachments: Vec::new(),
            subpass_count,
            view_mask,
        },
    );
    let framebuffer = fx.handle();
    fx.validator.device().record_create_framebuffer(
        framebuffer,
        FramebufferInfo {
            render_pass,
            attachments: Vec::new(),
        },
    );
    (render_pass, framebuffer)
}

fn in_render_pass(fx: &Fixture, subpass_count: u32, view_mask: u32) -> vk::CommandBuffer {
    let (render_pass, framebuffer) = render_pass(fx, subpass_count, view_mask);
    let cb = fx.primary();
    fx.begin(cb);
    fx.validator.post_call_record_cmd_begin_render_pass(
        cb,
        &RenderPassBegin {
            render_pass,
            framebuffer,
            contents: vk::SubpassContents::INLINE,
        },
    );
    cb
}

fn in_rendering(fx: &Fixture) -> vk::CommandBuffer {
    let cb = fx.primary();
    fx.begin(cb);
    fx.validator
        .post_call_record_cmd_begin_rendering(cb, &RenderingInfo::default());
    cb
}

#[test]
fn test_next_subpass_past_the_last() {
    let fx = Fixture::new();
    let cb = in_render_pass(&fx, 2, 0);

    assert!(!fx
        .validator
        .pre_call_validate_cmd_next_subpass(cb, vk::SubpassContents::INLINE));
    fx.validator
        .post_call_record_cmd_next_subpass(cb, vk::SubpassContents::INLINE);

    assert!(fx
        .validator
        .pre_call_validate_cmd_next_subpass(cb, vk::SubpassContents::INLINE));
    let messages = fx.sink.messages_for("VUID-vkCmdNextSubpass-None-00909");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("(1 of 2)"));
}

#[test]
fn test_end_render_pass_before_the_last_subpass() {
    let fx = Fixture::new();
    let cb = in_render_pass(&fx, 2, 0);

    assert!(fx.validator.pre_call_validate_cmd_end_render_pass(cb));
    assert_eq!(fx.sink.count("VUID-vkCmdEndRenderPass-None-00910"), 1);

    fx.sink.clear();
    fx.validator
        .post_call_record_cmd_next_subpass(cb, vk::SubpassContents::INLINE);
    assert!(!fx.validator.pre_call_validate_cmd_end_render_pass(cb));
    fx.validator.post_call_record_cmd_end_render_pass(cb);
    assert!(!fx.end(cb));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

#[test]
fn test_mismatched_instance_ends() {
    let fx = Fixture::new();
    let rendering = in_rendering(&fx);
    assert!(fx.validator.pre_call_validate_cmd_end_render_pass(rendering));
    assert_eq!(fx.sink.count("VUID-vkCmdEndRenderPass-None-06170"), 1);
    assert!(!fx.validator.pre_call_validate_cmd_end_rendering(rendering));

    let legacy = in_render_pass(&fx, 1, 0);
    assert!(fx.validator.pre_call_validate_cmd_end_rendering(legacy));
    assert_eq!(fx.sink.count("VUID-vkCmdEndRendering-None-06161"), 1);
}

#[test]
fn test_query_begin_and_end_checks() {
    let fx = Fixture::new();
    let pool = fx.query_pool(vk::QueryType::OCCLUSION, 2);
    let cb = fx.primary();
    fx.begin(cb);
    let flags = vk::QueryControlFlags::empty();

    assert!(fx.validator.pre_call_validate_cmd_begin_query(cb, pool, 2, flags));
    let messages = fx.sink.messages_for("VUID-vkCmdBeginQuery-query-00802");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("(2) is greater or equal to the queryCount (2)"));

    assert!(fx.validator.pre_call_validate_cmd_end_query(cb, pool, 0));
    assert_eq!(fx.sink.count("VUID-vkCmdEndQuery-None-01923"), 1);

    fx.sink.clear();
    assert!(!fx.validator.pre_call_validate_cmd_begin_query(cb, pool, 0, flags));
    fx.validator.post_call_record_cmd_begin_query(cb, pool, 0, flags);
    assert!(fx.validator.pre_call_validate_cmd_begin_query(cb, pool, 0, flags));
    assert_eq!(fx.sink.count("VUID-vkCmdBeginQuery-queryPool-01922"), 1);

    fx.sink.clear();
    assert!(!fx.validator.pre_call_validate_cmd_end_query(cb, pool, 0));
    fx.validator.post_call_record_cmd_end_query(cb, pool, 0);
    assert!(!fx.end(cb));
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

#[test]
fn test_multiview_end_query_ends_one_slot_per_view() {
    let fx = Fixture::new();
    let pool = fx.query_pool(vk::QueryType::OCCLUSION, 4);
    fx.validator.record_reset_query_pool_host(pool, 0, 4);

    let cb = in_render_pass(&fx, 1, 0b11);
    fx.validator
        .post_call_record_cmd_begin_query(cb, pool, 0, vk::QueryControlFlags::empty());
    fx.validator.post_call_record_cmd_end_query(cb, pool, 0);
    fx.validator.post_call_record_cmd_end_render_pass(cb);
    fx.end(cb);

    fx.submit(&[cb]);
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
    let device = fx.validator.device();
    assert_eq!(device.query_state(&QueryObject::new(pool, 0)), QueryState::Ended);
    assert_eq!(device.query_state(&QueryObject::new(pool, 1)), QueryState::Ended);
    assert_eq!(device.query_state(&QueryObject::new(pool, 2)), QueryState::Reset);
}

#[test]
fn test_image_use_against_recorded_layout() {
    let fx = Fixture::new();
    let image = fx.image();
    let cb = fx.primary();
    fx.begin(cb);

    let dst = ImageUse {
        image,
        layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        range: color_range(),
    };
    assert!(!fx.validator.pre_call_validate_cmd_clear_color_image(cb, &dst));
    fx.validator.post_call_record_cmd_clear_color_image(cb, &dst);

    let general = ImageUse {
        layout: vk::ImageLayout::GENERAL,
        ..dst
    };
    assert!(fx.validator.pre_call_validate_cmd_clear_color_image(cb, &general));
    let messages = fx.sink.messages_for("VUID-vkCmdClearColorImage-imageLayout-00004");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("doesn't match the previous known layout"));

    // The source was never touched by this recording.
    let src = ImageUse {
        image: fx.image(),
        layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        range: color_range(),
    };
    fx.sink.clear();
    assert!(!fx.validator.pre_call_validate_cmd_copy_image(cb, &src, &dst));
    assert!(fx.validator.pre_call_validate_cmd_copy_image(cb, &src, &general));
    assert_eq!(fx.sink.count("VUID-vkCmdCopyImage-dstImageLayout-00133"), 1);
}

fn transition(fx: &Fixture, cb: vk::CommandBuffer, image: vk::Image, old: vk::ImageLayout, new: vk::ImageLayout) {
    fx.validator
        .post_call_record_cmd_pipeline_barrier(cb, &[ImageBarrier::layout_transition(image, color_range(), old, new)]);
}

fn color_rendering(image: vk::Image) -> RenderingInfo {
    RenderingInfo {
        color_attachments: vec![RenderingAttachment {
            image: Some(image),
            range: color_range(),
            format: vk::Format::R8G8B8A8_UNORM,
            samples: vk::SampleCountFlags::TYPE_1,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }],
        ..Default::default()
    }
}

#[test]
fn test_rendering_attachment_in_wrong_recorded_layout() {
    let fx = Fixture::new();
    let image = fx.image();
    let cb = fx.primary();
    fx.begin(cb);
    transition(
        &fx,
        cb,
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    let info = color_rendering(image);
    assert!(fx.validator.pre_call_validate_cmd_begin_rendering(cb, &info));
    let reports = fx.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].vuid, INVALID_IMAGE_LAYOUT);
    assert_eq!(
        reports[0].location.to_string(),
        "vkCmdBeginRendering(): pRenderingInfo.pColorAttachments[0].imageLayout"
    );
    assert!(reports[0].message.contains("COLOR_ATTACHMENT_OPTIMAL"));
}

#[test]
fn test_rendering_attachment_after_matching_transition() {
    let fx = Fixture::new();
    let image = fx.image();
    let cb = fx.primary();
    fx.begin(cb);
    transition(
        &fx,
        cb,
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    let info = color_rendering(image);
    assert!(!fx.validator.pre_call_validate_cmd_begin_rendering(cb, &info));
    fx.validator.post_call_record_cmd_begin_rendering(cb, &info);
    fx.validator.post_call_record_cmd_end_rendering(cb);
    assert!(!fx.end(cb));
    let (skip, _) = fx.submit(&[cb]);
    assert!(!skip);
    assert!(fx.sink.is_empty(), "unexpected reports: {:?}", fx.sink.messages());
}

#[test]
fn test_render_pass_attachment_not_in_initial_layout() {
    let fx = Fixture::new();
    let image = fx.image();
    let render_pass = fx.handle();
    fx.validator.device().record_create_render_pass(
        render_pass,
        RenderPassInfo {
            attachments: vec![AttachmentDescription {
                format: vk::Format::R8G8B8A8_UNORM,
                samples: vk::SampleCountFlags::TYPE_1,
                initial_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            }],
            subpass_count: 1,
            view_mask: 0,
        },
    );
    let framebuffer = fx.handle();
    fx.validator.device().record_create_framebuffer(
        framebuffer,
        FramebufferInfo {
            render_pass,
            attachments: vec![FramebufferAttachment {
                image,
                range: color_range(),
            }],
        },
    );
    let begin = RenderPassBegin {
        render_pass,
        framebuffer,
        contents: vk::SubpassContents::INLINE,
    };

    let cb = fx.primary();
    fx.begin(cb);
    transition(
        &fx,
        cb,
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );
    assert!(fx.validator.pre_call_validate_cmd_begin_render_pass(cb, &begin));
    let reports = fx.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].vuid, INVALID_IMAGE_LAYOUT);
    assert_eq!(
        reports[0].location.to_string(),
        "vkCmdBeginRenderPass(): pRenderPassBegin.framebuffer.pAttachments[0]"
    );

    fx.sink.clear();
    transition(
        &fx,
        cb,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );
    assert!(!fx.validator.pre_call_validate_cmd_begin_render_pass(cb, &begin));
}
