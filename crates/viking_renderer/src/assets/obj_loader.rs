//! Wavefront OBJ model loading
//!
//! Parsing is delegated to `tobj`. Every face corner becomes a [`Vertex`]
//! with a white color and a vertically flipped texture coordinate, and the
//! corners are deduplicated through [`MeshBuilder`].

use std::io::{BufRead, BufReader};
use std::path::Path;

use super::AssetError;
use crate::render::mesh::{Mesh, MeshBuilder, Vertex};

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// OBJ file loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file into a single deduplicated mesh
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Mesh, AssetError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| AssetError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let mesh = Self::load_obj_buf(&mut BufReader::new(file), path)?;
        log::info!(
            "Loaded model {}: {} vertices, {} indices",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(mesh)
    }

    /// Load OBJ data from any buffered reader; `origin` is only used in errors
    pub fn load_obj_buf<R: BufRead>(reader: &mut R, origin: &Path) -> Result<Mesh, AssetError> {
        let model_error = |reason: String| AssetError::Model {
            path: origin.to_path_buf(),
            reason,
        };

        let options = tobj::LoadOptions {
            triangulate: true,
            ..Default::default()
        };
        // Materials are not used; the texture comes from configuration.
        let (models, _) = tobj::load_obj_buf(reader, &options, |_| Ok(Default::default()))
            .map_err(|e| model_error(e.to_string()))?;

        let mut builder = MeshBuilder::new();
        for model in &models {
            let mesh = &model.mesh;
            let has_texcoords = !mesh.texcoord_indices.is_empty();

            for (corner, &position_index) in mesh.indices.iter().enumerate() {
                let position = corner_position(&mesh.positions, position_index).ok_or_else(|| {
                    model_error(format!("position index {position_index} out of range in '{}'", model.name))
                })?;

                let tex_coord = if has_texcoords {
                    let texcoord_index = mesh.texcoord_indices[corner];
                    corner_tex_coord(&mesh.texcoords, texcoord_index).ok_or_else(|| {
                        model_error(format!("texcoord index {texcoord_index} out of range in '{}'", model.name))
                    })?
                } else {
                    [0.0, 0.0]
                };

                builder.push_corner(Vertex::new(position, WHITE, tex_coord));
            }
        }

        let mesh = builder.build();
        mesh.validate().map_err(model_error)?;
        Ok(mesh)
    }
}

fn corner_position(positions: &[f32], index: u32) -> Option<[f32; 3]> {
    let start = 3 * index as usize;
    match positions.get(start..start + 3)? {
        &[x, y, z] => Some([x, y, z]),
        _ => None,
    }
}

/// OBJ puts the texture origin bottom-left; Vulkan samples from top-left.
fn corner_tex_coord(texcoords: &[f32], index: u32) -> Option<[f32; 2]> {
    let start = 2 * index as usize;
    match texcoords.get(start..start + 2)? {
        &[u, v] => Some([u, 1.0 - v]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const QUAD_OBJ: &str = "\
o quad
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    fn load_str(text: &str) -> Result<Mesh, AssetError> {
        ObjLoader::load_obj_buf(&mut text.as_bytes(), Path::new("inline.obj"))
    }

    #[test]
    fn test_quad_is_triangulated_and_deduplicated() {
        let mesh = load_str(QUAD_OBJ).unwrap();

        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 4);
        assert!(mesh.vertices.iter().all(|v| v.color == WHITE));
    }

    #[test]
    fn test_tex_coords_are_flipped_vertically() {
        let mesh = load_str(QUAD_OBJ).unwrap();

        let first = mesh
            .vertices
            .iter()
            .find(|v| v.position == [-1.0, -1.0, 0.0])
            .unwrap();
        assert_relative_eq!(first.tex_coord[0], 0.0);
        assert_relative_eq!(first.tex_coord[1], 1.0);

        let top_right = mesh
            .vertices
            .iter()
            .find(|v| v.position == [1.0, 1.0, 0.0])
            .unwrap();
        assert_relative_eq!(top_right.tex_coord[1], 0.0);
    }

    #[test]
    fn test_shared_position_with_different_uv_stays_split() {
        let text = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 0.5 0.5
f 1/1 2/1 3/1
f 1/2 3/2 2/2
";
        let mesh = load_str(text).unwrap();

        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn test_missing_texcoords_default_to_zero() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_str(text).unwrap();

        assert_eq!(mesh.vertices.len(), 3);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == [0.0, 0.0]));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("viking_renderer_quad_{}.obj", std::process::id()));
        std::fs::write(&path, QUAD_OBJ).unwrap();

        let mesh = ObjLoader::load_obj(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(mesh.index_count(), 6);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = ObjLoader::load_obj("models/does_not_exist.obj").unwrap_err();
        assert!(matches!(err, AssetError::FileOpen { .. }));
    }

    #[test]
    fn test_empty_model_is_rejected() {
        assert!(matches!(load_str("# nothing here\n"), Err(AssetError::Model { .. })));
    }
}
