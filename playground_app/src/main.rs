//! Vulkan playground
//!
//! Opens a window and cycles through the engine's pipeline variants.
//! Space switches variant; Escape or closing the window quits.
//! Settings are read from `playground.toml` in the working directory when present.

use playground_engine::foundation::logging;
use playground_engine::prelude::*;

const CONFIG_PATH: &str = "playground.toml";

fn run(config: &EngineConfig) -> Result<(), EngineError> {
    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
    let mut engine = VulkanEngine::new(config, &mut window)?;

    if let Err(e) = engine.run(&mut window) {
        // Leave GPU objects alone: the device may be lost or mid-frame
        log::error!("Fatal error: {}", e);
        std::process::exit(1);
    }

    engine.cleanup();
    Ok(())
}

fn main() {
    logging::init();

    let config = EngineConfig::load_or_default(CONFIG_PATH);
    log::info!("Starting {}", config.application_name);

    if let Err(e) = run(&config) {
        log::error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}
