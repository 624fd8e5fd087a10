//! # Rendering
//!
//! Everything between the window and the GPU:
//! - **vulkan**: device bootstrap, swapchain, render targets, commands, sync,
//!   pipelines, memory
//! - **mesh**: vertex format and OBJ loading
//! - **deletion_queue**: ordered teardown of every GPU object
//! - **frame**: the per-frame stage sequence
//! - **variant** / **draw**: which pipeline is drawn and how

pub mod deletion_queue;
pub mod draw;
pub mod frame;
pub mod mesh;
pub mod variant;
pub mod vulkan;

pub use deletion_queue::DeletionQueue;
pub use draw::{record_variant_draws, DrawRecorder, DrawScene, MeshDraw, MeshPushConstants, VariantPipeline};
pub use frame::{FrameBackend, FrameDriver, FrameStage, MAX_FRAMES_IN_FLIGHT};
pub use mesh::{Mesh, MeshError, Vertex, VertexInputDescription};
pub use variant::{PipelineVariant, VariantSelector};
