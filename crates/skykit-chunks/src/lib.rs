//! skykit-chunks: base blocks and the addresses that name them
//!
//! A file small enough to fit in one network sector is serialized as
//! `layout ‖ metadata ‖ file bytes`, hashed with BLAKE3, and addressed by
//! (hash, offset, fetch size). Registry entries are addressed by the owner's
//! public key and lookup key instead.

pub mod address;
pub mod blake3;
pub mod block;
pub mod layout;

pub use address::{Address, AddressVersion, ADDRESS_SIZE, ADDRESS_TEXT_LEN};
pub use blake3::{hash_bytes, hash_to_hex, Hash};
pub use block::{build_base_block, BaseBlock, BlockError, ParsedBlock, BLOCK_SIZE, MAX_FILE_SIZE};
pub use layout::{Layout, CIPHER_PLAINTEXT, LAYOUT_SIZE, LAYOUT_VERSION};
