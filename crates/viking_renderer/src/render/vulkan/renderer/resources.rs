//! GPU resources created once at startup
//!
//! Vertex, index and texture data go through staging buffers on the
//! transfer queue. Uniform buffers and descriptor sets are per frame slot.

use ash::vk;

use crate::assets::TextureImage;
use crate::render::mesh::Mesh;
use crate::render::ubo::UniformBufferObject;
use crate::render::vulkan::buffer::{Buffer, UniformBuffer};
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetWriter};
use crate::render::vulkan::texture::Texture;
use crate::render::vulkan::transfer::TransferContext;

/// Scene data living on the GPU
pub struct SceneResources {
    descriptor_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    uniform_buffers: Vec<UniformBuffer>,
    texture: Texture,
    index_buffer: Buffer,
    index_count: u32,
    vertex_buffer: Buffer,
}

impl SceneResources {
    /// Upload `mesh` and `texture_image` and create `frames` uniform slots
    pub fn new(
        context: &VulkanContext,
        mesh: &Mesh,
        texture_image: &TextureImage,
        layout: &DescriptorSetLayout,
        frames: usize,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let memory_properties = context.physical_device().memory_properties;

        // Only needed while uploading
        let mut transfer = TransferContext::new(context)?;

        let vertex_buffer = transfer.upload_buffer(
            bytemuck::cast_slice(&mesh.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = transfer.upload_buffer(bytemuck::cast_slice(&mesh.indices), vk::BufferUsageFlags::INDEX_BUFFER)?;
        let texture = Texture::upload(
            &mut transfer,
            texture_image,
            context.physical_device().max_sampler_anisotropy(),
        )?;

        let uniform_buffers = (0..frames)
            .map(|_| UniformBuffer::new(device.clone(), &memory_properties))
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_pool = DescriptorPool::new(device.clone(), frames as u32)?;
        let layouts = vec![layout.handle(); frames];
        let descriptor_sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;

        let writer = descriptor_sets
            .iter()
            .zip(&uniform_buffers)
            .fold(DescriptorSetWriter::new(), |writer, (&set, uniform)| {
                writer
                    .write_buffer(set, 0, uniform.handle(), UniformBufferObject::SIZE as vk::DeviceSize)
                    .write_image(set, 1, texture.image_view(), texture.sampler())
            });
        writer.update(&device);

        log::debug!(
            "Scene resources ready: {} vertices, {} indices, {} frame slots",
            mesh.vertices.len(),
            mesh.indices.len(),
            frames
        );

        Ok(Self {
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            uniform_buffers,
            texture,
            index_buffer,
            index_count: mesh.index_count(),
            vertex_buffer,
        })
    }

    /// Device-local vertex buffer
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Device-local index buffer of 32-bit indices
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Descriptor set for frame slot `slot`
    pub fn descriptor_set(&self, slot: usize) -> vk::DescriptorSet {
        self.descriptor_sets[slot]
    }

    /// Write `ubo` into frame slot `slot`'s mapped uniform buffer
    pub fn write_uniforms(&mut self, slot: usize, ubo: &UniformBufferObject) {
        self.uniform_buffers[slot].update(ubo);
    }

    /// Model texture
    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}
