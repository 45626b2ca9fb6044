//! Base block construction: `layout ‖ fanout ‖ metadata ‖ file bytes`
//!
//! Only files that fit in a single sector are supported, so the fanout
//! section is always empty. The content hash covers the serialized block
//! exactly as uploaded (no sector padding).

use skykit_core::FileMetadata;
use thiserror::Error;
use tracing::debug;

use crate::address::Address;
use crate::blake3::{hash_bytes, Hash};
use crate::layout::{Layout, LAYOUT_SIZE};

/// Network sector size; a base block never exceeds it.
pub const BLOCK_SIZE: usize = 1 << 22;

/// Largest file accepted, leaving headroom in the sector for layout and metadata.
pub const MAX_FILE_SIZE: usize = 4_000_000;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("file too large: {size} bytes exceeds the {max}-byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("range at offset {offset} with fetch size {fetch_size} does not fit in a block")]
    OffsetOutOfRange { offset: u64, fetch_size: u64 },
}

/// A serialized base block ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct BaseBlock {
    bytes: Vec<u8>,
    fetch_size: u64,
}

impl BaseBlock {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes a reader must fetch to recover the whole block.
    pub fn fetch_size(&self) -> u64 {
        self.fetch_size
    }

    pub fn content_hash(&self) -> Hash {
        hash_bytes(&self.bytes)
    }

    /// Version 1 address covering the block from offset 0.
    pub fn address(&self) -> Result<Address, BlockError> {
        Address::content(&self.content_hash(), 0, self.fetch_size)
    }

    /// Split serialized block bytes back into their sections.
    pub fn parse(data: &[u8]) -> Result<ParsedBlock<'_>, BlockError> {
        let layout = Layout::decode(data)?;
        if layout.fanout_size != 0 {
            return Err(BlockError::InvalidLayout(
                "blocks with a fanout section are not supported".into(),
            ));
        }

        let metadata_end = section_end(LAYOUT_SIZE, layout.metadata_size, data.len())?;
        let file_end = section_end(metadata_end, layout.file_size, data.len())?;
        if file_end != data.len() {
            return Err(BlockError::InvalidLayout(format!(
                "{} trailing bytes after file section",
                data.len() - file_end
            )));
        }

        let metadata = FileMetadata::from_bytes(&data[LAYOUT_SIZE..metadata_end])
            .map_err(|e| BlockError::InvalidMetadata(e.to_string()))?;

        Ok(ParsedBlock {
            layout,
            metadata,
            file: &data[metadata_end..file_end],
        })
    }
}

impl std::fmt::Debug for BaseBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseBlock")
            .field("fetch_size", &self.fetch_size)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a parsed base block.
#[derive(Debug)]
pub struct ParsedBlock<'a> {
    pub layout: Layout,
    pub metadata: FileMetadata,
    pub file: &'a [u8],
}

fn section_end(start: usize, len: u64, total: usize) -> Result<usize, BlockError> {
    usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|&end| end <= total)
        .ok_or_else(|| {
            BlockError::InvalidLayout(format!(
                "section of {len} bytes at offset {start} overruns {total}-byte block"
            ))
        })
}

/// Serialize `file` and its metadata into a single base block.
///
/// Fails with [`BlockError::FileTooLarge`] when the file exceeds
/// [`MAX_FILE_SIZE`] or the finished block would not fit in [`BLOCK_SIZE`].
pub fn build_base_block(file: &[u8], metadata: &FileMetadata) -> Result<BaseBlock, BlockError> {
    if file.len() > MAX_FILE_SIZE {
        return Err(BlockError::FileTooLarge {
            size: file.len() as u64,
            max: MAX_FILE_SIZE as u64,
        });
    }
    if metadata.length != file.len() as u64 {
        return Err(BlockError::InvalidMetadata(format!(
            "metadata length {} does not match file size {}",
            metadata.length,
            file.len()
        )));
    }

    let metadata_bytes = metadata
        .to_bytes()
        .map_err(|e| BlockError::InvalidMetadata(e.to_string()))?;

    let total = LAYOUT_SIZE + metadata_bytes.len() + file.len();
    if total > BLOCK_SIZE {
        return Err(BlockError::FileTooLarge {
            size: total as u64,
            max: BLOCK_SIZE as u64,
        });
    }

    let layout = Layout::single_block(file.len() as u64, metadata_bytes.len() as u64);
    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&layout.encode());
    bytes.extend_from_slice(&metadata_bytes);
    bytes.extend_from_slice(file);

    debug!(
        filename = %metadata.filename,
        file_size = file.len(),
        block_size = total,
        "built base block"
    );

    Ok(BaseBlock {
        bytes,
        fetch_size: total as u64,
    })
}
