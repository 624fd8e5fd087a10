//! Render pass creation
//!
//! One color attachment cleared at load and handed to presentation at the end.
//! No depth attachment.

use ash::{vk, Device};

use crate::render::DeletionQueue;
use super::context::{VulkanError, VulkanResult};

/// Create the single-subpass color render pass and queue its destruction
pub fn create_render_pass(
    device: &Device,
    color_format: vk::Format,
    deletion_queue: &mut DeletionQueue,
) -> VulkanResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .build();

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let render_pass_create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses);

    let render_pass = unsafe {
        device
            .create_render_pass(&render_pass_create_info, None)
            .map_err(VulkanError::Api)?
    };

    let owner = device.clone();
    deletion_queue.push(move || unsafe {
        owner.destroy_render_pass(render_pass, None);
    });

    log::debug!("Render pass created for {:?}", color_format);
    Ok(render_pass)
}
