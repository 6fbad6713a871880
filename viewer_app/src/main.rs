//! Viking model viewer
//!
//! Opens a window and draws the configured model spinning about the Z axis
//! until the window is closed. Settings come from `viewer.toml` in the
//! working directory when it exists.

use std::error::Error;
use std::time::Duration;

use viking_renderer::prelude::*;

const CONFIG_PATH: &str = "viewer.toml";
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(5);

fn run(config: &ApplicationConfig) -> Result<(), Box<dyn Error>> {
    let renderer_config = &config.renderer;

    log::info!("Creating window...");
    let mut window = Window::new(
        &renderer_config.application_name,
        renderer_config.window_width,
        renderer_config.window_height,
    )?;

    log::info!("Creating Vulkan renderer...");
    let mut renderer = VulkanRenderer::new(&mut window, config)?;

    let mut stats = FrameStats::new();
    while !window.should_close() {
        window.poll_events();

        match renderer.draw_frame(&mut window)? {
            FrameOutcome::Skipped => continue,
            FrameOutcome::Presented | FrameOutcome::PresentedAndRecreated => {}
        }

        if let Some(fps) = stats.record_frame(FPS_REPORT_INTERVAL) {
            log::debug!("{:.1} fps", fps);
        }
    }

    renderer.wait_idle()?;
    log::info!(
        "Window closed after {} frames ({:.1} fps average)",
        stats.frame_count(),
        stats.average_fps()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = ApplicationConfig::load_or_default(CONFIG_PATH)?;

    // RUST_LOG overrides the configured level
    env_logger::Builder::new()
        .filter_level(config.engine.level_filter())
        .parse_default_env()
        .init();

    config.validate()?;
    log::info!("Starting {}", config.renderer.application_name);

    if let Err(e) = run(&config) {
        log::error!("Fatal error: {}", e);
        return Err(e);
    }
    Ok(())
}
