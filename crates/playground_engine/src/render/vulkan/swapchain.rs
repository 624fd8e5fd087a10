//! Vulkan swapchain management
//!
//! Creates the presentable image chain and one view per image. The chain's
//! destruction is queued first, then each view's as soon as it exists, so the
//! views go before the chain and a failed view creation leaks nothing.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use serde::{Deserialize, Serialize};

use crate::render::DeletionQueue;
use super::context::{DeviceContext, SurfaceContext, VulkanError, VulkanInstance, VulkanResult};

/// Preferred presentation mode; FIFO is used whenever the preference is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Vsync, no tearing, bounded latency; always supported
    #[default]
    Fifo,
    /// Vsync with latest-image replacement
    Mailbox,
    /// No vsync, may tear
    Immediate,
}

impl PresentModePreference {
    fn as_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Preferred mode when available, otherwise FIFO
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> vk::PresentModeKHR {
    let preferred = preference.as_vk();
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// BGRA8 sRGB when offered, otherwise whatever the surface lists first
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| available.first())
        .copied()
}

/// The surface's current extent, or `desired` clamped to the supported range
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: desired.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One image more than the minimum, capped by the maximum (0 means unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Presentable image chain plus one view per image
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain and its views, queueing the destruction of each
    pub fn new(
        instance: &VulkanInstance,
        device: &DeviceContext,
        surface: &SurfaceContext,
        desired_extent: vk::Extent2D,
        preference: PresentModePreference,
        deletion_queue: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let loader = SwapchainLoader::new(&instance.instance, &device.device);
        let physical_device = device.physical_device;

        let (surface_caps, surface_formats, present_modes) = unsafe {
            (
                surface
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, surface.surface)
                    .map_err(VulkanError::Api)?,
                surface
                    .loader
                    .get_physical_device_surface_formats(physical_device, surface.surface)
                    .map_err(VulkanError::Api)?,
                surface
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, surface.surface)
                    .map_err(VulkanError::Api)?,
            )
        };

        let format = choose_surface_format(&surface_formats).ok_or_else(|| {
            VulkanError::InitializationFailed("Surface reports no formats".to_string())
        })?;
        let present_mode = choose_present_mode(&present_modes, preference);
        let extent = choose_extent(&surface_caps, desired_extent);
        let image_count = choose_image_count(&surface_caps);

        if extent != desired_extent {
            log::warn!(
                "Swapchain extent {}x{} differs from window extent {}x{}",
                extent.width,
                extent.height,
                desired_extent.width,
                desired_extent.height
            );
        }

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let chain_loader = loader.clone();
        deletion_queue.push(move || unsafe {
            chain_loader.destroy_swapchain(swapchain, None);
        });

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let view_owner = device.device.clone();
        let image_views = deletion_queue
            .create_each(
                images.iter(),
                |&image| {
                    let create_info = vk::ImageViewCreateInfo::builder()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(format.format)
                        .components(vk::ComponentMapping {
                            r: vk::ComponentSwizzle::IDENTITY,
                            g: vk::ComponentSwizzle::IDENTITY,
                            b: vk::ComponentSwizzle::IDENTITY,
                            a: vk::ComponentSwizzle::IDENTITY,
                        })
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        });

                    unsafe { device.device.create_image_view(&create_info, None) }
                },
                move |view| unsafe { view_owner.destroy_image_view(view, None) },
            )
            .map_err(VulkanError::Api)?;

        log::info!(
            "Swapchain created: {} images, {}x{}, {:?}, {:?}",
            images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );

        Ok(Self {
            loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Swapchain extent; also the render extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format of the images
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// One view per image, in image order
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images in the chain
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire the next presentable image, signalling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> VulkanResult<u32> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout_ns, semaphore, vk::Fence::null())
                .map_err(VulkanError::Api)?
        };
        if suboptimal {
            log::warn!("Swapchain is suboptimal for the surface");
        }
        Ok(index)
    }

    /// Queue `image_index` for presentation once `wait_semaphore` is signalled
    pub fn present(&self, queue: vk::Queue, wait_semaphore: vk::Semaphore, image_index: u32) -> VulkanResult<()> {
        let swapchains = [self.swapchain];
        let wait_semaphores = [wait_semaphore];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .swapchains(&swapchains)
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            self.loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::Api)?
        };
        if suboptimal {
            log::warn!("Presented to a suboptimal swapchain");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn test_present_mode_defaults_to_fifo() {
        let available = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&available, PresentModePreference::Fifo), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&available, PresentModePreference::Mailbox), vk::PresentModeKHR::FIFO);
        assert_eq!(
            choose_present_mode(&available, PresentModePreference::Immediate),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(choose_surface_format(&[unorm, srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[unorm]), Some(unorm));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_extent_uses_current_unless_sentinel() {
        let desired = vk::Extent2D { width: 1700, height: 900 };
        let fixed = vk::Extent2D { width: 800, height: 600 };
        assert_eq!(choose_extent(&caps(2, 3, fixed), desired), fixed);

        let sentinel = vk::Extent2D { width: u32::MAX, height: u32::MAX };
        assert_eq!(choose_extent(&caps(2, 3, sentinel), desired), desired);

        let huge = vk::Extent2D { width: 10_000, height: 0 };
        assert_eq!(
            choose_extent(&caps(2, 3, sentinel), huge),
            vk::Extent2D { width: 4096, height: 1 }
        );
    }

    #[test]
    fn test_image_count_respects_maximum() {
        let any = vk::Extent2D { width: 1, height: 1 };
        assert_eq!(choose_image_count(&caps(2, 0, any)), 3);
        assert_eq!(choose_image_count(&caps(2, 8, any)), 3);
        assert_eq!(choose_image_count(&caps(3, 3, any)), 3);
    }
}
