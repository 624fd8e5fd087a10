//! Command buffer recording and submission
//!
//! A single resettable primary command buffer is re-recorded every frame.
//! Draw commands are issued through [`ActiveRenderPass`], which ends the render
//! pass when dropped.

use ash::{vk, Device};

use crate::render::draw::DrawRecorder;
use crate::render::DeletionQueue;
use super::context::{DeviceContext, VulkanError, VulkanResult};
use super::sync::FrameSync;

/// The one primary buffer of a `RESET_COMMAND_BUFFER` pool
///
/// The pool itself is owned by its release action in the deletion queue.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    /// Main per-frame command buffer
    pub main_buffer: vk::CommandBuffer,
}

impl CommandContext {
    /// Create the pool on the graphics family and allocate the main buffer
    ///
    /// Destroying the pool frees the buffer, so only the pool is queued.
    pub fn new(device: &DeviceContext, deletion_queue: &mut DeletionQueue) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.graphics_queue_family);

        let pool = unsafe {
            device
                .device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let owner = device.device.clone();
        deletion_queue.push(move || unsafe {
            owner.destroy_command_pool(pool, None);
        });

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let main_buffer = unsafe {
            device
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        }
        .into_iter()
        .next()
        .ok_or_else(|| VulkanError::InitializationFailed("No command buffer allocated".to_string()))?;

        log::debug!(
            "Command pool created on queue family {}",
            device.graphics_queue_family
        );
        Ok(Self { main_buffer })
    }

    /// Submit the main buffer: wait on acquisition, signal render completion and the fence
    pub fn submit(&self, device: &Device, queue: vk::Queue, sync: &FrameSync) -> VulkanResult<()> {
        let wait_semaphores = [sync.present_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_semaphore];
        let command_buffers = [self.main_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(queue, &[submit_info], sync.render_fence)
                .map_err(VulkanError::Api)
        }
    }
}

/// Where a frame is rendered to
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired image
    pub framebuffer: vk::Framebuffer,
    /// Render area
    pub extent: vk::Extent2D,
}

/// Reset and re-record `command_buffer` for one frame
///
/// Begins the render pass with a single clear value, hands the open pass to
/// `draw`, and ends the pass and the buffer afterwards.
pub fn record_frame<F>(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    target: &FrameTarget,
    clear_color: [f32; 4],
    draw: F,
) -> VulkanResult<()>
where
    F: FnOnce(&mut ActiveRenderPass<'_>),
{
    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe {
        device
            .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
            .map_err(VulkanError::Api)?;
        device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(VulkanError::Api)?;
    }

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: clear_color },
    }];
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };

    {
        let mut pass = ActiveRenderPass::begin(device, command_buffer, target, render_area, &clear_values);
        draw(&mut pass);
    }

    unsafe {
        device
            .end_command_buffer(command_buffer)
            .map_err(VulkanError::Api)
    }
}

/// An open render pass on a recording command buffer
pub struct ActiveRenderPass<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> ActiveRenderPass<'a> {
    fn begin(
        device: &'a Device,
        command_buffer: vk::CommandBuffer,
        target: &FrameTarget,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> Self {
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Self {
            device,
            command_buffer,
        }
    }
}

impl DrawRecorder for ActiveRenderPass<'_> {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[0]);
        }
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, bytes: &[u8]) {
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stages, 0, bytes);
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, instance_count, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }
}
