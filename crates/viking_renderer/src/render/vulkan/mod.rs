//! Vulkan rendering backend
//!
//! Thin RAII wrappers over `ash` plus the renderer that ties them together.
//! Every wrapper owns a clone of the logical device and destroys its handle
//! on drop; owners order their fields so dependents drop first.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor_set;
pub mod framebuffer;
pub mod memory;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod transfer;
pub mod vertex_layout;
pub mod window;

// Re-export commonly used types
pub use buffer::{Buffer, UniformBuffer};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{
    LogicalDevice, PhysicalDeviceInfo, QueueFamilies, QueueFamilyIndices, VulkanContext, VulkanError,
    VulkanInstance, VulkanResult,
};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use framebuffer::{DepthBuffer, Framebuffer};
pub use memory::{Image, ImageDesc, Sharing};
pub use render_pass::RenderPass;
pub use renderer::{FrameLoop, FrameOps, FrameOutcome, SceneResources, VulkanRenderer};
pub use shader::{GraphicsPipeline, ShaderModule};
pub use surface::{Surface, SwapchainSupport};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::Texture;
pub use transfer::TransferContext;
pub use vertex_layout::VulkanVertexLayout;
pub use window::{Window, WindowError};
