//! Vulkan rendering backend
//!
//! Thin wrappers over `ash`. Instance, surface and device are owned RAII-style;
//! every other object queues its release with the engine's deletion queue.

pub mod allocator;
pub mod buffer;
pub mod commands;
pub mod context;
pub mod framebuffer;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use allocator::{BufferAllocator, GpuAllocator, MemoryUsageHint};
pub use buffer::{upload_mesh, AllocatedBuffer};
pub use commands::{record_frame, ActiveRenderPass, CommandContext, FrameTarget};
pub use context::{bootstrap, DeviceContext, SurfaceContext, VulkanError, VulkanInstance, VulkanResult};
pub use framebuffer::RenderTargets;
pub use pipeline::{create_pipeline_layout, PipelineBuilder, PipelineError};
pub use render_pass::create_render_pass;
pub use shader::{load_shader_module, ShaderError};
pub use swapchain::{PresentModePreference, Swapchain};
pub use sync::FrameSync;
pub use window::{EngineEvent, Window, WindowError};
