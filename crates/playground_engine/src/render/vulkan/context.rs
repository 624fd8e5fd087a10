//! Vulkan instance, surface and device bootstrap
//!
//! Creates the instance (with the optional validation diagnostics), the window
//! surface, picks the first suitable physical device and creates the logical
//! device with a single graphics+present queue. Every failure here is fatal:
//! the engine has no degraded mode without a device.
//!
//! The three wrappers destroy their handle on `Drop`. Owners must declare them
//! device → surface → instance so Rust's field drop order matches Vulkan's.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use thiserror::Error;

use super::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Minimum API version a physical device must report
pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_1;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &str = "Vulkan Playground";

/// Vulkan instance plus the optional debug messenger
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance with the extensions GLFW needs
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {}", e)))?;
        let engine_name_cstr = CString::new(ENGINE_NAME)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(REQUIRED_API_VERSION);

        let required_extensions = window
            .get_required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {}", e)))?;

        let mut extensions: Vec<*const c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!("{} requested but not installed; continuing without it", VALIDATION_LAYER);
        }

        let layer_names = if validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![CString::new(VALIDATION_LAYER)
                .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?]
        } else {
            Vec::new()
        };
        let layer_name_ptrs: Vec<*const c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_name_ptrs);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            log::info!("Validation layers enabled");
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;

        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str().map_or(false, |name| name == VALIDATION_LAYER)
        }))
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentation surface and its extension loader
pub struct SurfaceContext {
    /// Surface extension loader
    pub loader: Surface,
    /// Surface created from the window
    pub surface: vk::SurfaceKHR,
}

impl SurfaceContext {
    /// Create the surface for `window`
    pub fn new(instance: &VulkanInstance, window: &mut Window) -> VulkanResult<Self> {
        let loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;

        Ok(Self { loader, surface })
    }
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Physical device selection result
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue family used for both graphics and presentation
    pub graphics_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the first device that meets [`REQUIRED_API_VERSION`], supports
    /// swapchains and can present to `surface` from a graphics queue family
    pub fn select_suitable_device(instance: &Instance, surface: &SurfaceContext) -> VulkanResult<Self> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        for device in devices {
            if let Some(info) = Self::evaluate_device(instance, device, surface)? {
                log::info!("Selected GPU: {}", device_name(&info.properties));
                return Ok(info);
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: &SurfaceContext,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = device_name(&properties);

        if !meets_api_version(properties.api_version, REQUIRED_API_VERSION) {
            log::debug!("Skipping {}: API version too old", name);
            return Ok(None);
        }

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let extension_names: Vec<&CStr> = extensions
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();
        if !extension_names.contains(&SwapchainLoader::name()) {
            log::debug!("Skipping {}: no swapchain support", name);
            return Ok(None);
        }

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let family = find_graphics_present_family(&queue_families, |index| unsafe {
            surface
                .loader
                .get_physical_device_surface_support(device, index, surface.surface)
                .map_err(VulkanError::Api)
        })?;

        Ok(family.map(|graphics_family| Self {
            device,
            properties,
            graphics_family,
        }))
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// True when `device_version` is at least `required` (major.minor only)
pub fn meets_api_version(device_version: u32, required: u32) -> bool {
    let device = (vk::api_version_major(device_version), vk::api_version_minor(device_version));
    let required = (vk::api_version_major(required), vk::api_version_minor(required));
    device >= required
}

/// First queue family that supports graphics and can present
pub fn find_graphics_present_family<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> VulkanResult<Option<u32>>
where
    F: FnMut(u32) -> VulkanResult<bool>,
{
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && supports_present(index)?
        {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Logical device with its single graphics queue
pub struct DeviceContext {
    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,
    /// Logical device
    pub device: Device,
    /// Graphics (and present) queue
    pub graphics_queue: vk::Queue,
    /// Queue family of `graphics_queue`
    pub graphics_queue_family: u32,
}

impl DeviceContext {
    /// Create the logical device on `physical_device`
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(physical_device.graphics_family)
            .queue_priorities(&priorities)
            .build()];

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };

        Ok(Self {
            physical_device: physical_device.device,
            device,
            graphics_queue,
            graphics_queue_family: physical_device.graphics_family,
        })
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}

/// Instance, surface and device, created in that order
pub fn bootstrap(
    window: &mut Window,
    app_name: &str,
    enable_validation: bool,
) -> VulkanResult<(VulkanInstance, SurfaceContext, DeviceContext)> {
    let instance = VulkanInstance::new(window, app_name, enable_validation)?;
    let surface = SurfaceContext::new(&instance, window)?;
    let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;
    let device = DeviceContext::new(&instance.instance, &physical_device)?;

    log::info!(
        "Vulkan device ready (queue family {})",
        device.graphics_queue_family
    );

    Ok((instance, surface, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_api_version_comparison_ignores_patch() {
        assert!(meets_api_version(vk::make_api_version(0, 1, 1, 0), REQUIRED_API_VERSION));
        assert!(meets_api_version(vk::make_api_version(0, 1, 3, 250), REQUIRED_API_VERSION));
        assert!(meets_api_version(vk::make_api_version(0, 2, 0, 0), REQUIRED_API_VERSION));
        assert!(!meets_api_version(vk::make_api_version(0, 1, 0, 999), REQUIRED_API_VERSION));
    }

    #[test]
    fn test_family_must_support_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];

        // Family 1 has graphics but cannot present
        let chosen = find_graphics_present_family(&families, |index| Ok(index == 2)).unwrap();
        assert_eq!(chosen, Some(2));
    }

    #[test]
    fn test_no_family_found() {
        let families = [family(vk::QueueFlags::COMPUTE, 1), family(vk::QueueFlags::GRAPHICS, 0)];
        let chosen = find_graphics_present_family(&families, |_| Ok(true)).unwrap();
        assert_eq!(chosen, None);
    }

    #[test]
    fn test_present_query_error_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let result = find_graphics_present_family(&families, |_| Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
        assert!(matches!(result, Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))));
    }
}
