//! Mesh data structures
//!
//! [`Vertex`] is the interleaved layout uploaded to the single vertex buffer.
//! [`MeshBuilder`] deduplicates face corners while a model is assembled, so
//! every distinct vertex is stored exactly once and referenced by index.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Interleaved vertex: position, color and texture coordinate
///
/// `#[repr(C)]` keeps the member offsets stable for the vertex input layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

// SAFETY: `Vertex` is `repr(C)`, made only of `f32` arrays and has no padding.
unsafe impl bytemuck::Zeroable for Vertex {}
unsafe impl bytemuck::Pod for Vertex {}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    fn bit_pattern(&self) -> [u32; 8] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
        ]
    }
}

// Equality and hashing both compare bit patterns, so the two always agree.
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bit_pattern() == other.bit_pattern()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bit_pattern().hash(state);
    }
}

/// Triangle mesh with 32-bit indices into its own vertex array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Unique vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from already indexed data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Two stacked colored quads, one at z = 0 and one at z = -0.5
    pub fn layered_quads() -> Self {
        let layer = |z: f32| {
            [
                Vertex::new([-0.5, -0.5, z], [1.0, 0.0, 0.0], [1.0, 0.0]),
                Vertex::new([0.5, -0.5, z], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex::new([0.5, 0.5, z], [0.0, 0.0, 1.0], [0.0, 1.0]),
                Vertex::new([-0.5, 0.5, z], [1.0, 1.0, 1.0], [1.0, 1.0]),
            ]
        };

        let mut vertices = Vec::with_capacity(8);
        vertices.extend(layer(0.0));
        vertices.extend(layer(-0.5));

        Self::new(vertices, vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4])
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Size in bytes of the vertex data
    pub fn vertex_bytes(&self) -> usize {
        std::mem::size_of::<Vertex>() * self.vertices.len()
    }

    /// Size in bytes of the index data
    pub fn index_bytes(&self) -> usize {
        std::mem::size_of::<u32>() * self.indices.len()
    }

    /// Check that every index references an existing vertex
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.is_empty() {
            return Err("Mesh has no indices".to_string());
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!("Index count {} is not a multiple of 3", self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(format!("Index {bad} out of range for {vertex_count} vertices"));
        }
        Ok(())
    }
}

/// Accumulates face corners into a deduplicated [`Mesh`]
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: Mesh,
    unique: HashMap<Vertex, u32>,
}

impl MeshBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one face corner, reusing the index of an identical vertex
    pub fn push_corner(&mut self, vertex: Vertex) {
        let next = self.mesh.vertices.len() as u32;
        let index = match self.unique.entry(vertex) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                self.mesh.vertices.push(vertex);
                *entry.insert(next)
            }
        };
        self.mesh.indices.push(index);
    }

    /// Finish building
    pub fn build(self) -> Mesh {
        self.mesh
    }
}

impl Extend<Vertex> for MeshBuilder {
    fn extend<T: IntoIterator<Item = Vertex>>(&mut self, corners: T) {
        for corner in corners {
            self.push_corner(corner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(vertex: &Vertex) -> u64 {
        let mut hasher = DefaultHasher::new();
        vertex.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::offset_of!(Vertex, position), 0);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(std::mem::offset_of!(Vertex, tex_coord), 24);
    }

    #[test]
    fn test_hash_covers_every_member() {
        let base = Vertex::new([1.0, 2.0, 3.0], [1.0, 1.0, 1.0], [0.25, 0.75]);
        let moved = Vertex { position: [1.0, 2.0, 3.5], ..base };
        let tinted = Vertex { color: [0.5, 1.0, 1.0], ..base };
        let shifted = Vertex { tex_coord: [0.25, 0.5], ..base };

        assert_eq!(hash_of(&base), hash_of(&base.clone()));
        assert_ne!(hash_of(&base), hash_of(&moved));
        assert_ne!(hash_of(&base), hash_of(&tinted));
        assert_ne!(hash_of(&base), hash_of(&shifted));
    }

    #[test]
    fn test_layered_quads_counts() {
        let mesh = Mesh::layered_quads();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 12);
        assert_eq!(mesh.index_count(), 12);
        assert_eq!(mesh.vertex_bytes(), 8 * 32);
        assert_eq!(mesh.index_bytes(), 48);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_builder_deduplicates_corners() {
        let quads = Mesh::layered_quads();
        let corners: Vec<Vertex> = quads.indices.iter().map(|&i| quads.vertices[i as usize]).collect();

        let mut builder = MeshBuilder::new();
        builder.extend(corners.iter().copied());
        let mesh = builder.build();

        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 12);
        for (k, corner) in corners.iter().enumerate() {
            assert_eq!(&mesh.vertices[mesh.indices[k] as usize], corner);
        }
    }

    #[test]
    fn test_builder_keeps_distinct_uvs_apart() {
        let mut builder = MeshBuilder::new();
        builder.push_corner(Vertex::new([0.0; 3], [1.0; 3], [0.0, 0.0]));
        builder.push_corner(Vertex::new([0.0; 3], [1.0; 3], [0.0, 1.0]));
        builder.push_corner(Vertex::new([0.0; 3], [1.0; 3], [0.0, 0.0]));

        let mesh = builder.build();
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mesh = Mesh::new(vec![Vertex::default(); 2], vec![0, 1, 2]);
        assert!(mesh.validate().is_err());
    }
}
