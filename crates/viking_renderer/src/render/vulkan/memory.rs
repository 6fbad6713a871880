//! Device memory helpers
//!
//! Memory type selection, queue-family sharing and the RAII image wrapper
//! shared by the depth buffer and the texture.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// First memory type allowed by `type_bits` whose flags contain `required`
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let index = (0..memory_properties.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)?;

    log::debug!("Memory type {} selected for {:?}", index, required);
    Ok(index)
}

/// How a resource is shared between queue families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sharing {
    /// Exclusive or concurrent
    pub mode: vk::SharingMode,
    /// Families listed for concurrent sharing, empty when exclusive
    pub families: Vec<u32>,
}

impl Sharing {
    /// Concurrent sharing only when more than one distinct family is involved
    pub fn for_families(families: &[u32]) -> Self {
        let mut distinct = families.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        if distinct.len() > 1 {
            Self {
                mode: vk::SharingMode::CONCURRENT,
                families: distinct,
            }
        } else {
            Self {
                mode: vk::SharingMode::EXCLUSIVE,
                families: Vec::new(),
            }
        }
    }
}

/// Allocate memory for `requirements` with `properties`
pub fn allocate(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type_index(memory_properties, requirements.memory_type_bits, properties)?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api) }
}

/// Parameters for a single-mip 2D image
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width and height
    pub extent: vk::Extent2D,
    /// Pixel format
    pub format: vk::Format,
    /// Intended usage
    pub usage: vk::ImageUsageFlags,
    /// Aspect used by the view
    pub aspect: vk::ImageAspectFlags,
}

/// 2D image with bound device-local memory and a view
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    extent: vk::Extent2D,
    format: vk::Format,
}

impl Image {
    /// Create the image, bind memory and create a matching view
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: ImageDesc,
        sharing: &Sharing,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.families)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate(&device, memory_properties, requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bound = unsafe { device.bind_image_memory(image, memory, 0) };
        let view = bound.and_then(|()| unsafe { create_view(&device, image, desc.format, desc.aspect) });
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!(
            "Created {}x{} {:?} image",
            desc.extent.width,
            desc.extent.height,
            desc.format
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
            extent: desc.extent,
            format: desc.format,
        })
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over the whole image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Image size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a single-mip 2D view over `image`
///
/// # Safety
/// `image` must be a live image created on `device` with `format`.
pub unsafe fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> ash::prelude::VkResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    device.create_image_view(&view_info, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn test_memory_type_respects_type_bits() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host, host]);

        assert_eq!(find_memory_type_index(&props, 0b111, host).unwrap(), 1);
        assert_eq!(find_memory_type_index(&props, 0b100, host).unwrap(), 2);
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn test_memory_type_superset_flags_accepted() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(
            find_memory_type_index(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            0
        );
    }

    #[test]
    fn test_no_matching_memory_type() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type_index(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));

        let result = find_memory_type_index(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn test_sharing_single_family_is_exclusive() {
        let sharing = Sharing::for_families(&[2, 2]);
        assert_eq!(sharing.mode, vk::SharingMode::EXCLUSIVE);
        assert!(sharing.families.is_empty());

        assert_eq!(Sharing::for_families(&[]).mode, vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn test_sharing_distinct_families_are_concurrent() {
        let sharing = Sharing::for_families(&[3, 0, 3]);
        assert_eq!(sharing.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(sharing.families, vec![0, 3]);
    }
}
