//! Window management using GLFW
//!
//! Provides window creation, Vulkan surface creation and the translation of raw
//! GLFW events into the two events the engine reacts to.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Events the engine reacts to; everything else GLFW reports is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Window close request or Escape
    Quit,
    /// Space: cycle to the next pipeline variant
    NextVariant,
}

/// Map a raw GLFW event onto an engine event
pub fn translate_event(event: &glfw::WindowEvent) -> Option<EngineEvent> {
    match event {
        glfw::WindowEvent::Close => Some(EngineEvent::Quit),
        glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => Some(EngineEvent::Quit),
        glfw::WindowEvent::Key(glfw::Key::Space, _, glfw::Action::Press, _) => Some(EngineEvent::NextVariant),
        _ => None,
    }
}

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a fixed-size window with no client API (Vulkan renders into it)
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        // No swapchain recreation, so the window never changes size
        glfw.window_hint(glfw::WindowHint::Resizable(false));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);

        log::info!("Created {}x{} window '{}'", width, height, title);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// True once the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Pump the GLFW event loop and return the engine events it produced
    pub fn poll_engine_events(&mut self) -> Vec<EngineEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| translate_event(&event))
            .collect()
    }

    /// Size of the drawable area in pixels
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Instance extensions GLFW needs to create a surface
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create the Vulkan surface through GLFW
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {:?}", result)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glfw::{Action, Key, Modifiers, WindowEvent};

    #[test]
    fn test_close_and_escape_quit() {
        assert_eq!(translate_event(&WindowEvent::Close), Some(EngineEvent::Quit));
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::Escape, 0, Action::Press, Modifiers::empty())),
            Some(EngineEvent::Quit)
        );
    }

    #[test]
    fn test_space_press_advances_variant() {
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::Space, 0, Action::Press, Modifiers::empty())),
            Some(EngineEvent::NextVariant)
        );
    }

    #[test]
    fn test_release_and_other_keys_are_ignored() {
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::Space, 0, Action::Release, Modifiers::empty())),
            None
        );
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::A, 0, Action::Press, Modifiers::empty())),
            None
        );
        assert_eq!(translate_event(&WindowEvent::Focus(true)), None);
    }
}
