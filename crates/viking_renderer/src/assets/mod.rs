//! Asset loading: OBJ models, texture images and SPIR-V blobs
//!
//! Everything here is read once during startup. File access goes through
//! [`read_file`] so every missing asset reports the same diagnostic.

pub mod image_loader;
pub mod obj_loader;
pub mod spirv;

pub use image_loader::TextureImage;
pub use obj_loader::ObjLoader;
pub use spirv::read_spirv;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file could not be opened or read
    #[error("Failed to open file '{}': {source}", path.display())]
    FileOpen {
        /// Requested path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Malformed OBJ data
    #[error("Failed to load model '{}': {reason}", path.display())]
    Model {
        /// Model path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Image could not be decoded
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// SPIR-V blob with a bad size or header
    #[error("Invalid SPIR-V in '{}': {reason}", path.display())]
    InvalidSpirv {
        /// Shader path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
}

/// Read a whole file into memory
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, AssetError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| AssetError::FileOpen {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_message_names_the_path() {
        let err = read_file("shaders/definitely_missing.spv").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to open file 'shaders/definitely_missing.spv'"));
    }
}
