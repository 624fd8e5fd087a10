//! Frame synchronization primitives
//!
//! One fence and two semaphores guard the single frame in flight:
//!
//! ```text
//! acquire --present_semaphore--> submit --render_semaphore--> present
//!                                submit --render_fence------> CPU wait
//! ```

use ash::{vk, Device};

use crate::render::DeletionQueue;
use super::context::{VulkanError, VulkanResult};

/// The fence/semaphore triple for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signalled when the GPU finishes the frame's submission; created signalled
    pub render_fence: vk::Fence,
    /// Signalled by image acquisition, waited by submission
    pub present_semaphore: vk::Semaphore,
    /// Signalled by submission, waited by presentation
    pub render_semaphore: vk::Semaphore,
}

impl FrameSync {
    /// Create the triple and queue a single release action for all three
    pub fn new(device: &Device, deletion_queue: &mut DeletionQueue) -> VulkanResult<Self> {
        // Signalled so the very first wait returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        let semaphore_info = vk::SemaphoreCreateInfo::builder();

        let render_fence = unsafe { device.create_fence(&fence_info, None).map_err(VulkanError::Api)? };
        let present_semaphore = match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.destroy_fence(render_fence, None) };
                return Err(VulkanError::Api(e));
            }
        };
        let render_semaphore = match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe {
                    device.destroy_semaphore(present_semaphore, None);
                    device.destroy_fence(render_fence, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        let owner = device.clone();
        deletion_queue.push(move || unsafe {
            owner.destroy_fence(render_fence, None);
            owner.destroy_semaphore(present_semaphore, None);
            owner.destroy_semaphore(render_semaphore, None);
        });

        log::debug!("Frame synchronization objects created");
        Ok(Self {
            render_fence,
            present_semaphore,
            render_semaphore,
        })
    }

    /// Block until the render fence is signalled or `timeout_ns` elapses
    pub fn wait_for_fence(&self, device: &Device, timeout_ns: u64) -> VulkanResult<()> {
        unsafe {
            device
                .wait_for_fences(&[self.render_fence], true, timeout_ns)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the render fence to the unsignalled state
    pub fn reset_fence(&self, device: &Device) -> VulkanResult<()> {
        unsafe { device.reset_fences(&[self.render_fence]).map_err(VulkanError::Api) }
    }
}
