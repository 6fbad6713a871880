//! Vulkan texture management
//!
//! Uploads a decoded RGBA8 image through the transfer queue into a sampled
//! sRGB image and creates the sampler the fragment shader reads it with.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};
use super::memory::{Image, ImageDesc};
use super::transfer::TransferContext;
use crate::assets::TextureImage;

/// Format of uploaded textures
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Sampled texture with image, view and sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image: Image,
}

impl Texture {
    /// Stage, copy and transition `source` into a shader-readable image
    pub fn upload(transfer: &mut TransferContext, source: &TextureImage, max_anisotropy: f32) -> VulkanResult<Self> {
        let expected = source.size_bytes();
        if source.pixels.len() as u64 != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Texture data is {} bytes, expected {} for {}x{}",
                    source.pixels.len(),
                    expected,
                    source.width,
                    source.height
                ),
            });
        }

        let staging = transfer.create_staging_buffer(&source.pixels)?;

        let device = transfer.device().clone();
        let image = Image::new(
            device.clone(),
            transfer.memory_properties(),
            ImageDesc {
                extent: vk::Extent2D {
                    width: source.width,
                    height: source.height,
                },
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
            },
            &transfer.upload_sharing(),
        )?;

        transfer.transition_image_layout(
            image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        transfer.copy_buffer_to_image(staging.handle(), image.handle(), source.width, source.height)?;
        transfer.transition_image_layout(
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let sampler_info = sampler_create_info(max_anisotropy);
        let sampler = unsafe { device.create_sampler(&sampler_info, None).map_err(VulkanError::Api)? };

        log::debug!(
            "Uploaded {}x{} texture, max anisotropy {}",
            source.width,
            source.height,
            max_anisotropy
        );

        Ok(Self { device, sampler, image })
    }

    /// Get image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Get sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Texture size
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

fn sampler_create_info(max_anisotropy: f32) -> vk::SamplerCreateInfo {
    vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .min_lod(0.0)
        .max_lod(0.0)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sampler_is_linear_repeat_anisotropic() {
        let info = sampler_create_info(16.0);

        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_relative_eq!(info.max_anisotropy, 16.0);
        assert_eq!(info.compare_enable, vk::FALSE);
        assert_eq!(info.unnormalized_coordinates, vk::FALSE);
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    }
}
