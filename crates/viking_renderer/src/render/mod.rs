//! # Rendering
//!
//! CPU-side scene data ([`mesh`], [`ubo`]) and the Vulkan backend that draws it.

pub mod mesh;
pub mod ubo;
pub mod vulkan;

pub use mesh::{Mesh, MeshBuilder, Vertex};
pub use ubo::UniformBufferObject;
