//! Vulkan swapchain management
//!
//! Handles swapchain creation and recreation. The swapchain owns its color
//! views, the shared depth buffer and one framebuffer per image; all of it
//! is torn down and rebuilt together when the surface changes.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::framebuffer::{DepthBuffer, Framebuffer};
use super::memory::{self, Sharing};
use super::surface::SwapchainSupport;

/// Preferred format, falling back to the first one reported
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Surface reports no formats".to_string(),
        })
}

/// MAILBOX when available, otherwise FIFO which is always supported
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's current extent, or the framebuffer size clamped to its limits
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, within the maximum; a maximum of 0 means unbounded
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count == 0 {
        desired
    } else {
        desired.clamp(capabilities.min_image_count, capabilities.max_image_count)
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth: Option<DepthBuffer>,
    framebuffers: Vec<Framebuffer>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain, its color views and the depth buffer
    ///
    /// Framebuffers are added by [`Swapchain::create_framebuffers`] once the
    /// render pass exists.
    pub fn new(context: &VulkanContext, framebuffer_size: (u32, u32)) -> VulkanResult<Self> {
        let device = context.raw_device();
        let swapchain_loader = context.swapchain_loader().clone();
        let support = context.swapchain_support()?;

        let SwapchainSupport {
            capabilities,
            formats,
            present_modes,
        } = support;

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&capabilities, framebuffer_size);
        let image_count = choose_image_count(&capabilities);

        let sharing = Sharing::for_families(&context.queue_families().graphics_and_present());

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface().handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.families)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        // From here on Drop cleans up whatever has been created
        let mut this = Self {
            device: device.clone(),
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            depth: None,
            framebuffers: Vec::new(),
            format,
            present_mode,
            extent,
        };

        this.images = unsafe {
            this.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        for &image in &this.images {
            let view = unsafe {
                memory::create_view(&device, image, format.format, vk::ImageAspectFlags::COLOR)
                    .map_err(VulkanError::Api)?
            };
            this.image_views.push(view);
        }

        this.depth = Some(DepthBuffer::new(
            device,
            &context.physical_device().memory_properties,
            context.depth_format(),
            extent,
        )?);

        log::info!(
            "Swapchain {}x{} {:?} {:?}, {} images",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            this.images.len()
        );

        Ok(this)
    }

    /// One framebuffer per image with attachments `[color, depth]`
    pub fn create_framebuffers(&mut self, render_pass: vk::RenderPass) -> VulkanResult<()> {
        let depth_view = self
            .depth
            .as_ref()
            .map(DepthBuffer::image_view)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Swapchain has no depth buffer".to_string(),
            })?;

        self.framebuffers = self
            .image_views
            .iter()
            .map(|&view| Framebuffer::new(self.device.clone(), render_pass, &[view, depth_view], self.extent))
            .collect::<VulkanResult<_>>()?;

        log::debug!("Created {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    /// Tear everything down and build it again for the new surface size
    ///
    /// The caller must have waited for the device to go idle.
    pub fn recreate(
        &mut self,
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<()> {
        // The old handle is not chained into the new swapchain, so it must go first
        self.destroy();

        let mut fresh = Self::new(context, framebuffer_size)?;
        fresh.create_framebuffers(render_pass)?;
        *self = fresh;

        log::debug!("Swapchain recreated at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    /// Depth, framebuffers, views, then the swapchain itself. Idempotent.
    fn destroy(&mut self) {
        self.depth = None;
        self.framebuffers.clear();

        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
        self.images.clear();
    }

    /// Acquire the next image, signaling `semaphore`
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> ash::prelude::VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Present `image_index` after `wait_semaphore`; `Ok(true)` means suboptimal
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> ash::prelude::VkResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Chosen present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for image `index`
    pub fn framebuffer(&self, index: u32) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No framebuffer for swapchain image {index}"),
            })
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32, current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn test_preferred_surface_format() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);

        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_current_when_defined() {
        let caps = capabilities(2, 3, (1024, 768));
        let extent = choose_extent(&caps, (10, 10));
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn test_extent_clamped_when_undefined() {
        let caps = capabilities(2, 3, (u32::MAX, u32::MAX));

        let extent = choose_extent(&caps, (800, 600));
        assert_eq!((extent.width, extent.height), (800, 600));

        let extent = choose_extent(&caps, (10, 9000));
        assert_eq!((extent.width, extent.height), (64, 2048));
    }

    #[test]
    fn test_image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&capabilities(2, 8, (1, 1))), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3, (1, 1))), 3);
    }

    #[test]
    fn test_image_count_unbounded_max() {
        assert_eq!(choose_image_count(&capabilities(2, 0, (1, 1))), 3);
    }
}
