//! Buffer management for vertex data and uniforms
//!
//! Memory management following RAII patterns with proper allocation and cleanup

use std::ffi::c_void;

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};
use super::memory::{self, Sharing};
use crate::render::ubo::UniformBufferObject;

/// Memory flags for buffers the CPU writes directly
pub const HOST_VISIBLE_COHERENT: vk::MemoryPropertyFlags =
    vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        sharing: &Sharing,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot create a zero-sized buffer".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.families);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = match memory::allocate(&device, memory_properties, requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        log::debug!("Created {} byte buffer ({:?})", size, usage);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Map memory for writing
    pub fn map_memory(&self) -> VulkanResult<*mut c_void> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Unmap memory
    pub fn unmap_memory(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Copy `bytes` to the start of a host-visible buffer
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        check_fits(bytes.len(), self.size)?;

        let data_ptr = self.map_memory()?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data_ptr.cast::<u8>(), bytes.len());
        }
        self.unmap_memory();
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn check_fits(len: usize, capacity: vk::DeviceSize) -> VulkanResult<()> {
    if len as vk::DeviceSize > capacity {
        return Err(VulkanError::InvalidOperation {
            reason: format!("Write of {len} bytes exceeds buffer size {capacity}"),
        });
    }
    Ok(())
}

/// Host-visible uniform buffer that stays mapped for its whole life
pub struct UniformBuffer {
    buffer: Buffer,
    mapped: *mut c_void,
}

impl UniformBuffer {
    /// Create and map a buffer sized for one [`UniformBufferObject`]
    pub fn new(device: Device, memory_properties: &vk::PhysicalDeviceMemoryProperties) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            memory_properties,
            UniformBufferObject::SIZE as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            HOST_VISIBLE_COHERENT,
            &Sharing::for_families(&[]),
        )?;
        let mapped = buffer.map_memory()?;

        Ok(Self { buffer, mapped })
    }

    /// Overwrite the uniform block
    pub fn update(&mut self, ubo: &UniformBufferObject) {
        let bytes = ubo.as_bytes();
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.cast::<u8>(), bytes.len());
        }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        self.buffer.unmap_memory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_visible_coherent_flags() {
        assert!(HOST_VISIBLE_COHERENT.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        assert!(HOST_VISIBLE_COHERENT.contains(vk::MemoryPropertyFlags::HOST_COHERENT));
        assert!(!HOST_VISIBLE_COHERENT.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    }

    #[test]
    fn test_write_must_fit() {
        assert!(check_fits(16, 16).is_ok());
        assert!(check_fits(0, 16).is_ok());
        assert!(matches!(check_fits(17, 16), Err(VulkanError::InvalidOperation { .. })));
    }
}
