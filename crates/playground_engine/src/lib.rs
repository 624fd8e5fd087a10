//! # Playground Engine
//!
//! A minimal Vulkan engine: one window, one device, a handful of fixed
//! pipelines and a fence-gated frame loop with a single frame in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playground_engine::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     playground_engine::foundation::logging::init();
//!
//!     let config = EngineConfig::load_or_default("playground.toml");
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let mut engine = VulkanEngine::new(&config, &mut window)?;
//!
//!     engine.run(&mut window)?;
//!     engine.cleanup();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

mod engine;

pub use engine::{EngineError, EngineResult, VulkanEngine};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, EngineConfig},
        render::{
            vulkan::{EngineEvent, PresentModePreference, VulkanError, Window, WindowError},
            DeletionQueue, Mesh, PipelineVariant, Vertex,
        },
        EngineError, EngineResult, VulkanEngine,
    };
}
