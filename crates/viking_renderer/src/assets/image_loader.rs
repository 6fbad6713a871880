//! Texture image loading

use std::path::Path;

use super::{read_file, AssetError};

/// Decoded image ready for GPU upload, always RGBA8
#[derive(Debug, Clone)]
pub struct TextureImage {
    /// Tightly packed RGBA pixels, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl TextureImage {
    /// Bytes per texel after conversion
    pub const BYTES_PER_PIXEL: u64 = 4;

    /// Load and decode an image file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let image = Self::from_bytes(&bytes)?;

        log::info!("Loaded texture {}x{} from {}", image.width, image.height, path.display());
        Ok(image)
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(Self {
            pixels: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * Self::BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_decode_png_to_rgba8() {
        let texture = TextureImage::from_bytes(&encoded_png(2, 3)).unwrap();

        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.size_bytes(), 24);
        assert_eq!(texture.pixels.len(), 24);
        // Texel (1, 2)
        assert_eq!(&texture.pixels[20..24], &[1, 2, 128, 255]);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = TextureImage::from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, AssetError::Image(_)));
    }

    #[test]
    fn test_missing_texture_is_open_error() {
        let err = TextureImage::from_file("textures/does_not_exist.png").unwrap_err();
        assert!(matches!(err, AssetError::FileOpen { .. }));
    }
}
