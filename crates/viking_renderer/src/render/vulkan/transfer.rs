//! One-shot uploads on the transfer queue
//!
//! A single command buffer from a transfer-family pool is reset, recorded
//! and submitted for every copy, then the queue is waited idle before the
//! call returns. Nothing here overlaps with the frame loop; all uploads
//! happen during renderer initialization.

use ash::{vk, Device};

use super::buffer::{Buffer, HOST_VISIBLE_COHERENT};
use super::commands::{CommandPool, CommandRecorder};
use super::context::{QueueFamilies, VulkanContext, VulkanError, VulkanResult};
use super::memory::Sharing;

/// Access masks and stages for one supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the barrier
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the barrier
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked by the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

impl TransitionMasks {
    /// Masks for `old -> new`; only the two upload transitions are supported
    pub fn for_layouts(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<Self> {
        match (old, new) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(Self {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            }),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(Self {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            }),
            _ => Err(VulkanError::UnsupportedLayoutTransition { old, new }),
        }
    }
}

/// Single-region copy covering `size` bytes at offset 0 on both sides
pub fn whole_buffer_copy(size: vk::DeviceSize) -> vk::BufferCopy {
    vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size,
    }
}

/// Copy of a tightly packed buffer into mip 0, layer 0 of a color image
pub fn full_image_copy(width: u32, height: u32) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D { width, height, depth: 1 },
    }
}

/// Transfer queue, its pool and the reusable upload command buffer
pub struct TransferContext {
    device: Device,
    queue: vk::Queue,
    recorder: CommandRecorder,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    families: QueueFamilies,
    // Dropped last; freeing the pool frees the command buffer
    _pool: CommandPool,
}

impl TransferContext {
    /// Create the transfer pool and command buffer
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let device = context.raw_device();
        let families = context.queue_families();

        let pool = CommandPool::new(device.clone(), families.transfer)?;
        let command_buffer = pool
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("No transfer command buffer allocated".to_string()))?;

        Ok(Self {
            recorder: CommandRecorder::new(command_buffer, device.clone()),
            device,
            queue: context.transfer_queue(),
            memory_properties: context.physical_device().memory_properties,
            families,
            _pool: pool,
        })
    }

    /// Record with `record`, submit, and wait for the transfer queue to drain
    fn submit_one_time<F>(&mut self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder),
    {
        self.recorder.reset()?;
        self.recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(&mut self.recorder);
        let command_buffer = self.recorder.end()?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(self.queue).map_err(VulkanError::Api)
        }
    }

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    pub fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        self.submit_one_time(|recorder| {
            recorder.cmd_copy_buffer(src, dst, &[whole_buffer_copy(size)]);
        })
    }

    /// Copy tightly packed texels into an image in `TRANSFER_DST_OPTIMAL`
    pub fn copy_buffer_to_image(&mut self, src: vk::Buffer, image: vk::Image, width: u32, height: u32) -> VulkanResult<()> {
        self.submit_one_time(|recorder| {
            recorder.cmd_copy_buffer_to_image(
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[full_image_copy(width, height)],
            );
        })
    }

    /// Move a color image between the two upload layouts
    pub fn transition_image_layout(
        &mut self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks = TransitionMasks::for_layouts(old, new)?;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        self.submit_one_time(|recorder| {
            recorder.cmd_image_barrier(masks.src_stage, masks.dst_stage, &[barrier]);
        })
    }

    /// Host-visible staging buffer holding `bytes`
    pub fn create_staging_buffer(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        let staging = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            HOST_VISIBLE_COHERENT,
            &Sharing::for_families(&[]),
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Upload `bytes` into a new device-local buffer with `usage`
    ///
    /// The target is shared between the graphics and transfer families.
    pub fn upload_buffer(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        let staging = self.create_staging_buffer(bytes)?;

        let target = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            &self.upload_sharing(),
        )?;

        self.copy_buffer(staging.handle(), target.handle(), staging.size())?;
        Ok(target)
    }

    /// Sharing used by every uploaded resource
    pub fn upload_sharing(&self) -> Sharing {
        Sharing::for_families(&self.families.graphics_and_transfer())
    }

    /// Memory properties of the device uploads go to
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Device handle
    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_to_transfer_dst() {
        let masks =
            TransitionMasks::for_layouts(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();

        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_transfer_dst_to_shader_read() {
        let masks = TransitionMasks::for_layouts(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();

        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_same_layout_is_rejected() {
        let result = TransitionMasks::for_layouts(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(result, Err(VulkanError::UnsupportedLayoutTransition { .. })));
    }

    #[test]
    fn test_reverse_transition_is_rejected() {
        let result = TransitionMasks::for_layouts(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(VulkanError::UnsupportedLayoutTransition {
                old: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                new: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            })
        ));
    }

    #[test]
    fn test_copy_regions() {
        let copy = whole_buffer_copy(96);
        assert_eq!((copy.src_offset, copy.dst_offset, copy.size), (0, 0, 96));

        let region = full_image_copy(512, 256);
        assert_eq!(region.image_extent.width, 512);
        assert_eq!(region.image_extent.height, 256);
        assert_eq!(region.image_extent.depth, 1);
        assert_eq!(region.image_subresource.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(region.image_subresource.layer_count, 1);
        assert_eq!(region.buffer_row_length, 0);
    }
}
