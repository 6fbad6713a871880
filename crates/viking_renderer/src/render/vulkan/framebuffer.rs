//! Framebuffer management
//!
//! Handles Vulkan framebuffer creation and the depth attachment shared by
//! every framebuffer of a swapchain.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};
use super::memory::{Image, ImageDesc, Sharing};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Depth attachment sized to the swapchain
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// Create a device-local depth image and its depth-aspect view
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let image = Image::new(
            device,
            memory_properties,
            ImageDesc {
                extent,
                format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
            },
            &Sharing::for_families(&[]),
        )?;

        Ok(Self { image })
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Depth format in use
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}
