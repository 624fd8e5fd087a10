//! Core engine implementation
//!
//! Startup order: device, allocator, swapchain, render targets, commands,
//! sync, pipelines, meshes. Every GPU object created after the device is
//! registered with the deletion queue, which `cleanup` flushes once after the
//! device goes idle. The device, surface and instance are then released by
//! their own `Drop`, in that order.

use ash::{vk, Device};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::render::draw::{record_variant_draws, DrawScene, MeshDraw, MeshPushConstants, VariantPipeline};
use crate::render::frame::{FrameBackend, FrameDriver};
use crate::render::mesh::{Mesh, Vertex, VertexInputDescription};
use crate::render::variant::{PipelineVariant, VariantSelector};
use crate::render::vulkan::{
    bootstrap, create_pipeline_layout, create_render_pass, load_shader_module, record_frame, upload_mesh,
    CommandContext, DeviceContext, EngineEvent, FrameSync, FrameTarget, GpuAllocator, PipelineBuilder,
    RenderTargets, SurfaceContext, Swapchain, VulkanError, VulkanInstance, VulkanResult, Window, WindowError,
};
use crate::render::DeletionQueue;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Fatal Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// GPU objects created after the device; all released through the deletion queue
struct FrameResources {
    swapchain: Swapchain,
    targets: RenderTargets,
    commands: CommandContext,
    sync: FrameSync,
    pipelines: Vec<VariantPipeline>,
    triangle_mesh: Mesh,
    mesh: Mesh,
}

impl FrameResources {
    fn create(
        config: &EngineConfig,
        window: &Window,
        instance: &VulkanInstance,
        surface: &SurfaceContext,
        device: &DeviceContext,
        deletion_queue: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        // Only needed for the uploads below; buffer release actions keep it alive
        let allocator = GpuAllocator::new(instance, device, deletion_queue)?;

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            instance,
            device,
            surface,
            vk::Extent2D { width, height },
            config.present_mode,
            deletion_queue,
        )?;

        let render_pass = create_render_pass(&device.device, swapchain.format().format, deletion_queue)?;
        let targets = RenderTargets::new(
            &device.device,
            render_pass,
            swapchain.image_views(),
            swapchain.extent(),
            deletion_queue,
        )?;

        let commands = CommandContext::new(device, deletion_queue)?;
        let sync = FrameSync::new(&device.device, deletion_queue)?;
        let pipelines = build_pipelines(&device.device, config, &targets, deletion_queue)?;

        let mut triangle_mesh = Mesh::triangle();
        let mut mesh = Mesh::load_obj(&config.mesh_path).unwrap_or_else(|e| {
            log::error!("{}", e);
            Mesh::default()
        });

        upload_mesh(&allocator, deletion_queue, &mut triangle_mesh)?;
        upload_mesh(&allocator, deletion_queue, &mut mesh)?;

        Ok(Self {
            swapchain,
            targets,
            commands,
            sync,
            pipelines,
            triangle_mesh,
            mesh,
        })
    }
}

/// Build one pipeline per variant with a single reused builder
///
/// A variant whose shaders or pipeline fail keeps a null pipeline and is not drawn.
/// Shader modules are destroyed once every pipeline has been built.
fn build_pipelines(
    device: &Device,
    config: &EngineConfig,
    targets: &RenderTargets,
    deletion_queue: &mut DeletionQueue,
) -> VulkanResult<Vec<VariantPipeline>> {
    let plain_layout = create_pipeline_layout(device, &[], deletion_queue)?;
    let mesh_layout = create_pipeline_layout(device, &[MeshPushConstants::range()], deletion_queue)?;

    let mut builder = PipelineBuilder::new(targets.extent);
    let mut modules = Vec::new();
    let mut pipelines = Vec::with_capacity(PipelineVariant::COUNT);

    for variant in PipelineVariant::ALL {
        let shaders = config.shaders.for_variant(variant);
        let vertex = load_shader_module(device, &shaders.vertex);
        let fragment = load_shader_module(device, &shaders.fragment);
        modules.extend(vertex);
        modules.extend(fragment);

        let (layout, vertex_input) = match variant {
            PipelineVariant::FlatTriangle => (plain_layout, Vertex::vertex_description()),
            PipelineVariant::ColoredTriangle => (plain_layout, VertexInputDescription::default()),
            PipelineVariant::PushConstantMesh => (mesh_layout, Vertex::vertex_description()),
        };

        builder
            .set_shaders(vertex, fragment)
            .set_vertex_input(vertex_input)
            .set_layout(layout);

        let pipeline = builder.build(device, targets.render_pass);
        if pipeline == vk::Pipeline::null() {
            log::warn!("{:?} will not be drawn", variant);
        } else {
            let owner = device.clone();
            deletion_queue.push(move || unsafe {
                owner.destroy_pipeline(pipeline, None);
            });
            log::debug!("Built pipeline for {:?}", variant);
        }

        pipelines.push(VariantPipeline { pipeline, layout });
    }

    for module in modules {
        unsafe { device.destroy_shader_module(module, None) };
    }

    Ok(pipelines)
}

/// [`FrameBackend`] over the engine's Vulkan objects for one frame
struct VulkanFrame<'a> {
    device: &'a DeviceContext,
    resources: &'a FrameResources,
    variant: PipelineVariant,
}

impl FrameBackend for VulkanFrame<'_> {
    fn wait_for_fence(&mut self, timeout_ns: u64) -> VulkanResult<()> {
        self.resources.sync.wait_for_fence(&self.device.device, timeout_ns)
    }

    fn reset_fence(&mut self) -> VulkanResult<()> {
        self.resources.sync.reset_fence(&self.device.device)
    }

    fn acquire_next_image(&mut self, timeout_ns: u64) -> VulkanResult<u32> {
        self.resources
            .swapchain
            .acquire_next_image(self.resources.sync.present_semaphore, timeout_ns)
    }

    fn record(&mut self, image_index: u32, frame_number: u64) -> VulkanResult<()> {
        let resources = self.resources;
        let framebuffer = resources
            .targets
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No framebuffer for swapchain image {}", image_index),
            })?;

        let target = FrameTarget {
            render_pass: resources.targets.render_pass,
            framebuffer,
            extent: resources.targets.extent,
        };

        let scene = DrawScene {
            variant: self.variant,
            pipelines: &resources.pipelines,
            triangle: MeshDraw::from(&resources.triangle_mesh),
            mesh: MeshDraw::from(&resources.mesh),
            frame_number,
            aspect: target.extent.width as f32 / target.extent.height.max(1) as f32,
        };

        record_frame(
            &self.device.device,
            resources.commands.main_buffer,
            &target,
            FrameDriver::clear_color(frame_number),
            |pass| record_variant_draws(pass, &scene),
        )
    }

    fn submit(&mut self) -> VulkanResult<()> {
        self.resources
            .commands
            .submit(&self.device.device, self.device.graphics_queue, &self.resources.sync)
    }

    fn present(&mut self, image_index: u32) -> VulkanResult<()> {
        self.resources.swapchain.present(
            self.device.graphics_queue,
            self.resources.sync.render_semaphore,
            image_index,
        )
    }
}

/// The playground engine
///
/// Field order is teardown order for everything released by `Drop`:
/// the deletion queue must already be flushed when the device goes.
pub struct VulkanEngine {
    initialized: bool,
    driver: FrameDriver,
    selector: VariantSelector,
    resources: FrameResources,
    deletion_queue: DeletionQueue,
    device: DeviceContext,
    #[allow(dead_code)] // destroyed on drop, after the device
    surface: SurfaceContext,
    #[allow(dead_code)] // destroyed on drop, last
    instance: VulkanInstance,
}

impl VulkanEngine {
    /// Bring up the device and every rendering resource
    pub fn new(config: &EngineConfig, window: &mut Window) -> EngineResult<Self> {
        log::info!("Initializing engine...");

        let (instance, surface, device) = bootstrap(window, &config.application_name, config.enable_validation)?;
        let mut deletion_queue = DeletionQueue::new();

        let resources =
            match FrameResources::create(config, window, &instance, &surface, &device, &mut deletion_queue) {
                Ok(resources) => resources,
                Err(e) => {
                    // Nothing was submitted yet, so the partial setup can go right away
                    if let Err(idle) = device.wait_idle() {
                        log::error!("Device wait failed during aborted startup: {}", idle);
                    }
                    deletion_queue.flush();
                    return Err(e.into());
                }
            };

        let selector = VariantSelector::new(config.initial_variant());
        log::info!(
            "Engine initialized: {} swapchain images, starting with {:?}",
            resources.swapchain.image_count(),
            selector.selected()
        );

        Ok(Self {
            initialized: true,
            driver: FrameDriver::new(config.fence_timeout_ns),
            selector,
            resources,
            deletion_queue,
            device,
            surface,
            instance,
        })
    }

    /// Render and present one frame
    ///
    /// Fails with [`VulkanError::InvalidOperation`] once [`VulkanEngine::cleanup`] has run.
    pub fn draw(&mut self) -> EngineResult<()> {
        let mut frame = VulkanFrame {
            device: &self.device,
            resources: &self.resources,
            variant: self.selector.selected(),
        };
        self.driver.draw_frame(&mut frame)?;
        Ok(())
    }

    /// Apply one window event; returns false when the engine should stop
    pub fn handle_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Quit => false,
            EngineEvent::NextVariant => {
                self.selector.advance();
                true
            }
        }
    }

    /// Poll events and draw until the window closes or a quit event arrives
    pub fn run(&mut self, window: &mut Window) -> EngineResult<()> {
        log::info!("Starting main loop...");

        let mut running = true;
        while running && !window.should_close() {
            for event in window.poll_engine_events() {
                running &= self.handle_event(event);
            }
            if running {
                self.draw()?;
            }
        }

        log::info!("Main loop finished after {} frames", self.driver.frame_number());
        Ok(())
    }

    /// Frames presented so far
    pub fn frame_number(&self) -> u64 {
        self.driver.frame_number()
    }

    /// Variant currently drawn
    pub fn selected_variant(&self) -> PipelineVariant {
        self.selector.selected()
    }

    /// Wait for the GPU and release every queued object; safe to call more than once
    pub fn cleanup(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        self.driver.retire();

        if let Err(e) = self.device.wait_idle() {
            log::error!("Device wait failed during cleanup: {}", e);
        }
        self.deletion_queue.flush();

        log::info!("Engine shutdown complete");
    }
}

impl Drop for VulkanEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}
