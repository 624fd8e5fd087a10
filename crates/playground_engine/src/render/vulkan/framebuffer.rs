//! Framebuffers over the swapchain views
//!
//! Each framebuffer binds exactly one swapchain image view. Views are queued
//! by the swapchain before any framebuffer exists, so every framebuffer is
//! released ahead of the view it binds.

use ash::{vk, Device};

use crate::render::DeletionQueue;
use super::context::{VulkanError, VulkanResult};

/// What a single framebuffer will be created from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferPlan {
    /// The only attachment
    pub view: vk::ImageView,
    /// Framebuffer width
    pub width: u32,
    /// Framebuffer height
    pub height: u32,
}

/// One plan per swapchain view, all at the render extent
pub fn plan_framebuffers(views: &[vk::ImageView], extent: vk::Extent2D) -> Vec<FramebufferPlan> {
    views
        .iter()
        .map(|&view| FramebufferPlan {
            view,
            width: extent.width,
            height: extent.height,
        })
        .collect()
}

/// Render pass plus one framebuffer per swapchain image
#[derive(Debug, Clone)]
pub struct RenderTargets {
    /// Color render pass every framebuffer is compatible with
    pub render_pass: vk::RenderPass,
    /// Indexed by swapchain image index
    pub framebuffers: Vec<vk::Framebuffer>,
    /// Render area of every pass
    pub extent: vk::Extent2D,
}

impl RenderTargets {
    /// Create one framebuffer per view
    ///
    /// Each framebuffer queues its own release as soon as it is created.
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
        deletion_queue: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let owner = device.clone();
        let framebuffers = deletion_queue
            .create_each(
                plan_framebuffers(views, extent),
                |plan| {
                    let attachments = [plan.view];
                    let create_info = vk::FramebufferCreateInfo::builder()
                        .render_pass(render_pass)
                        .attachments(&attachments)
                        .width(plan.width)
                        .height(plan.height)
                        .layers(1);

                    unsafe { device.create_framebuffer(&create_info, None) }
                },
                move |framebuffer| unsafe { owner.destroy_framebuffer(framebuffer, None) },
            )
            .map_err(VulkanError::Api)?;

        log::debug!(
            "Created {} framebuffers at {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            render_pass,
            framebuffers,
            extent,
        })
    }

    /// Framebuffer for a swapchain image, if the index is in range
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn views(count: u64) -> Vec<vk::ImageView> {
        (1..=count).map(vk::ImageView::from_raw).collect()
    }

    #[test]
    fn test_plan_count_matches_views() {
        for count in [1, 2, 3, 8] {
            for extent in [
                vk::Extent2D { width: 1, height: 1 },
                vk::Extent2D { width: 1700, height: 900 },
                vk::Extent2D { width: 4096, height: 16 },
            ] {
                let plans = plan_framebuffers(&views(count), extent);
                assert_eq!(plans.len(), count as usize);
            }
        }
    }

    #[test]
    fn test_plan_binds_each_view_once_at_extent() {
        let views = views(3);
        let extent = vk::Extent2D { width: 1700, height: 900 };
        let plans = plan_framebuffers(&views, extent);

        for (plan, view) in plans.iter().zip(&views) {
            assert_eq!(plan.view, *view);
            assert_eq!((plan.width, plan.height), (1700, 900));
        }
    }

    #[test]
    fn test_framebuffer_lookup_is_bounds_checked() {
        let targets = RenderTargets {
            render_pass: vk::RenderPass::null(),
            framebuffers: vec![vk::Framebuffer::from_raw(7), vk::Framebuffer::from_raw(9)],
            extent: vk::Extent2D { width: 1, height: 1 },
        };

        assert_eq!(targets.framebuffer(1), Some(vk::Framebuffer::from_raw(9)));
        assert_eq!(targets.framebuffer(2), None);
    }
}
