//! SPIR-V shader module loading
//!
//! Shader failures are not fatal: the caller gets `None`, the error is logged,
//! and the pipeline that needed the module is built without it (and skipped).

use ash::{vk, Device};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Shader loading errors
#[derive(Error, Debug)]
pub enum ShaderError {
    /// File missing, unreadable or not valid SPIR-V words
    #[error("Failed to read SPIR-V '{path}': {source}")]
    Read {
        /// Shader path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The driver rejected the bytecode
    #[error("Failed to create shader module from '{path}': {result}")]
    Create {
        /// Shader path
        path: String,
        /// Vulkan result code
        result: vk::Result,
    },
}

/// Read a SPIR-V file into 32-bit words
pub fn read_spirv<P: AsRef<Path>>(path: P) -> Result<Vec<u32>, ShaderError> {
    let path = path.as_ref();
    let read_error = |source| ShaderError::Read {
        path: path.display().to_string(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    ash::util::read_spv(&mut file).map_err(read_error)
}

/// Read a SPIR-V file and create a shader module from it
pub fn create_shader_module<P: AsRef<Path>>(device: &Device, path: P) -> Result<vk::ShaderModule, ShaderError> {
    let path = path.as_ref();
    let code = read_spirv(path)?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

    unsafe { device.create_shader_module(&create_info, None) }.map_err(|result| ShaderError::Create {
        path: path.display().to_string(),
        result,
    })
}

/// [`create_shader_module`], logging the outcome instead of returning an error
pub fn load_shader_module<P: AsRef<Path>>(device: &Device, path: P) -> Option<vk::ShaderModule> {
    match create_shader_module(device, path.as_ref()) {
        Ok(module) => {
            log::info!("Loaded shader {}", path.as_ref().display());
            Some(module)
        }
        Err(e) => {
            log::error!("{}", e);
            None
        }
    }
}
