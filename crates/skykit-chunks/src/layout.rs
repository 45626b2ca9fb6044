//! Fixed 99-byte layout header at the start of every base block
//!
//! ```text
//! offset  size  field
//!      0     1  version (= 1)
//!      1     8  file size            (u64 LE)
//!      9     8  metadata size        (u64 LE)
//!     17     8  fanout size          (u64 LE, 0 for single-block files)
//!     25     1  fanout data pieces
//!     26     1  fanout parity pieces
//!     27     8  cipher type
//!     35    64  key data
//! ```

use crate::block::BlockError;

/// Serialized size of the layout header
pub const LAYOUT_SIZE: usize = 99;

/// The only layout version this crate writes or reads
pub const LAYOUT_VERSION: u8 = 1;

/// Cipher type marking an unencrypted block
pub const CIPHER_PLAINTEXT: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

const KEY_DATA_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub version: u8,
    pub file_size: u64,
    pub metadata_size: u64,
    pub fanout_size: u64,
    pub fanout_data_pieces: u8,
    pub fanout_parity_pieces: u8,
    pub cipher_type: [u8; 8],
    pub key_data: [u8; KEY_DATA_SIZE],
}

impl Layout {
    /// Layout for a plaintext file stored entirely inside the base block.
    pub fn single_block(file_size: u64, metadata_size: u64) -> Self {
        Self {
            version: LAYOUT_VERSION,
            file_size,
            metadata_size,
            fanout_size: 0,
            fanout_data_pieces: 0,
            fanout_parity_pieces: 0,
            cipher_type: CIPHER_PLAINTEXT,
            key_data: [0u8; KEY_DATA_SIZE],
        }
    }

    pub fn encode(&self) -> [u8; LAYOUT_SIZE] {
        let mut out = [0u8; LAYOUT_SIZE];
        out[0] = self.version;
        out[1..9].copy_from_slice(&self.file_size.to_le_bytes());
        out[9..17].copy_from_slice(&self.metadata_size.to_le_bytes());
        out[17..25].copy_from_slice(&self.fanout_size.to_le_bytes());
        out[25] = self.fanout_data_pieces;
        out[26] = self.fanout_parity_pieces;
        out[27..35].copy_from_slice(&self.cipher_type);
        out[35..].copy_from_slice(&self.key_data);
        out
    }

    /// Parse the header from the first [`LAYOUT_SIZE`] bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, BlockError> {
        let header = data.get(..LAYOUT_SIZE).ok_or_else(|| {
            BlockError::InvalidLayout(format!(
                "need {LAYOUT_SIZE} bytes, got {}",
                data.len()
            ))
        })?;

        let version = header[0];
        if version != LAYOUT_VERSION {
            return Err(BlockError::InvalidLayout(format!(
                "unsupported layout version {version}"
            )));
        }

        let mut cipher_type = [0u8; 8];
        cipher_type.copy_from_slice(&header[27..35]);
        let mut key_data = [0u8; KEY_DATA_SIZE];
        key_data.copy_from_slice(&header[35..]);

        Ok(Self {
            version,
            file_size: read_u64(&header[1..9]),
            metadata_size: read_u64(&header[9..17]),
            fanout_size: read_u64(&header[17..25]),
            fanout_data_pieces: header[25],
            fanout_parity_pieces: header[26],
            cipher_type,
            key_data,
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block_encoding() {
        let bytes = Layout::single_block(5, 46).encode();
        assert_eq!(bytes.len(), LAYOUT_SIZE);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..9], &5u64.to_le_bytes());
        assert_eq!(&bytes[9..17], &46u64.to_le_bytes());
        assert!(bytes[17..27].iter().all(|&b| b == 0), "no fanout");
        assert_eq!(&bytes[27..35], &CIPHER_PLAINTEXT);
        assert!(bytes[35..].iter().all(|&b| b == 0), "no key data");
    }

    #[test]
    fn test_decode_matches_encode() {
        let layout = Layout::single_block(4_000_000, 60);
        assert_eq!(Layout::decode(&layout.encode()).unwrap(), layout);
    }

    #[test]
    fn test_decode_rejects_short_and_unknown_version() {
        assert!(matches!(
            Layout::decode(&[1u8; 10]),
            Err(BlockError::InvalidLayout(_))
        ));

        let mut bytes = Layout::single_block(1, 1).encode();
        bytes[0] = 2;
        let err = Layout::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }
}
