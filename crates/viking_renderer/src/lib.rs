//! # Viking Renderer
//!
//! A minimal Vulkan renderer that draws one textured OBJ model spinning
//! about the Z axis.
//!
//! ```rust,no_run
//! use viking_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut window = Window::new(
//!         &config.renderer.application_name,
//!         config.renderer.window_width,
//!         config.renderer.window_height,
//!     )?;
//!     let mut renderer = VulkanRenderer::new(&mut window, &config)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&mut window)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::core::{ApplicationConfig, AssetConfig, CameraPreset, ModelLayout, VulkanRendererConfig};
    pub use crate::foundation::time::{AnimationClock, FrameStats};
    pub use crate::render::vulkan::{FrameOutcome, VulkanError, VulkanRenderer, VulkanResult, Window};
    pub use crate::render::{Mesh, UniformBufferObject, Vertex};
}
