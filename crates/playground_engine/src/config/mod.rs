//! Configuration system
//!
//! Any [`Config`] type can be loaded from and saved to `.toml` or `.ron` files.
//! [`EngineConfig`] is the engine's own configuration; every field has a
//! default, so partial files are accepted.

use std::path::{Path, PathBuf};

pub use serde::{Deserialize, Serialize};

use crate::render::frame::DEFAULT_FRAME_TIMEOUT_NS;
use crate::render::variant::PipelineVariant;
use crate::render::vulkan::PresentModePreference;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Load from `path`, falling back to defaults when the file is missing or invalid
    fn load_or_default(path: &str) -> Self {
        if !Path::new(path).exists() {
            log::info!("No configuration at {}, using defaults", path);
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path);
                config
            }
            Err(e) => {
                log::warn!("Ignoring configuration at {}: {}", path, e);
                Self::default()
            }
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Client width in pixels
    pub width: u32,
    /// Client height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Playground".to_string(),
            width: 1700,
            height: 900,
        }
    }
}

/// SPIR-V files for one pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderPair {
    /// Vertex stage
    pub vertex: PathBuf,
    /// Fragment stage
    pub fragment: PathBuf,
}

impl ShaderPair {
    fn compiled(vertex: &str, fragment: &str) -> Self {
        let dir = Path::new("target/shaders");
        Self {
            vertex: dir.join(vertex),
            fragment: dir.join(fragment),
        }
    }
}

/// Shader files per pipeline variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    /// [`PipelineVariant::FlatTriangle`]
    pub flat_triangle: ShaderPair,
    /// [`PipelineVariant::ColoredTriangle`]
    pub colored_triangle: ShaderPair,
    /// [`PipelineVariant::PushConstantMesh`]
    pub push_constant_mesh: ShaderPair,
}

impl ShaderPaths {
    /// Shaders for `variant`
    pub fn for_variant(&self, variant: PipelineVariant) -> &ShaderPair {
        match variant {
            PipelineVariant::FlatTriangle => &self.flat_triangle,
            PipelineVariant::ColoredTriangle => &self.colored_triangle,
            PipelineVariant::PushConstantMesh => &self.push_constant_mesh,
        }
    }
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            flat_triangle: ShaderPair::compiled("flat_triangle.vert.spv", "colored_triangle.frag.spv"),
            colored_triangle: ShaderPair::compiled("colored_triangle.vert.spv", "colored_triangle.frag.spv"),
            push_constant_mesh: ShaderPair::compiled("tri_mesh.vert.spv", "colored_triangle.frag.spv"),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reported to the driver as the application name
    pub application_name: String,
    /// Enable the Khronos validation layer and debug messenger
    pub enable_validation: bool,
    /// Bound on fence waits and image acquisition, nanoseconds
    pub fence_timeout_ns: u64,
    /// Preferred present mode
    pub present_mode: PresentModePreference,
    /// OBJ file drawn by the push-constant variant
    pub mesh_path: PathBuf,
    /// Variant shown at startup, wrapped into range
    pub initial_variant: usize,
    /// Window settings
    pub window: WindowConfig,
    /// Shader files per variant
    pub shaders: ShaderPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Playground".to_string(),
            enable_validation: cfg!(debug_assertions),
            fence_timeout_ns: DEFAULT_FRAME_TIMEOUT_NS,
            present_mode: PresentModePreference::default(),
            mesh_path: PathBuf::from("assets/octahedron.obj"),
            initial_variant: 0,
            window: WindowConfig::default(),
            shaders: ShaderPaths::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// The variant selected at startup
    pub fn initial_variant(&self) -> PipelineVariant {
        PipelineVariant::from_index(self.initial_variant)
    }
}
