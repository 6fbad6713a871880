//! SPIR-V blob loading

use std::io::Cursor;
use std::path::Path;

use super::{read_file, AssetError};

/// Load a SPIR-V module as 32-bit words
///
/// The byte length must be a multiple of four. Endianness is resolved from
/// the magic number.
pub fn read_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>, AssetError> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    let words = spirv_words(&bytes).map_err(|reason| AssetError::InvalidSpirv {
        path: path.to_path_buf(),
        reason,
    })?;

    log::debug!("Loaded {} SPIR-V words from {}", words.len(), path.display());
    Ok(words)
}

fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err("file is empty".to_string());
    }
    if bytes.len() % 4 != 0 {
        return Err(format!("size {} is not a multiple of 4", bytes.len()));
    }
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_words_from_little_endian_blob() {
        let mut bytes = MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000_u32.to_le_bytes());

        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_rejects_unaligned_length() {
        let mut bytes = MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(spirv_words(&bytes).unwrap_err().contains("multiple of 4"));
    }

    #[test]
    fn test_rejects_empty_blob() {
        assert!(spirv_words(&[]).is_err());
    }
}
