//! Content and registry addresses
//!
//! An address is 34 bytes: a little-endian `u16` bitfield followed by a
//! 32-byte hash. The low two bits of the bitfield hold `version - 1`.
//!
//! Version 1 (content) packs an (offset, fetch size) range into the
//! remaining 14 bits:
//!
//! ```text
//! bit  0..2        version - 1 (= 0)
//! bit  2..2+m      mode m, as a run of m one-bits (0 <= m <= 7)
//! bit  2+m         zero terminator
//! bit  3+m..6+m    fetch-size step index (3 bits)
//! bit  6+m..16     offset in units of 4 KiB << m (10 - m bits)
//! ```
//!
//! Mode 0 covers fetch sizes up to 32 KiB in 4 KiB steps; mode m >= 1 covers
//! (32 KiB << (m-1), 32 KiB << m] in (4 KiB << (m-1)) steps. Fetch sizes are
//! rounded up to the next step.
//!
//! Version 2 (registry) has bitfield `1` and hashes the owner's public key
//! with the lookup key; resolving it means reading that registry entry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use skykit_crypto::{LookupKey, PublicKey};
use std::fmt;
use std::str::FromStr;

use crate::blake3::{hash_concat, Hash};
use crate::block::{BlockError, BLOCK_SIZE};

/// Raw address length: 2-byte bitfield plus 32-byte hash
pub const ADDRESS_SIZE: usize = 34;

/// Length of the base64url text form
pub const ADDRESS_TEXT_LEN: usize = 46;

const URI_SCHEME: &str = "sia://";

const ALIGNMENT: u64 = 4096;
const MODE_0_MAX_FETCH: u64 = 32 * 1024;
const MAX_MODE: u32 = 7;
const REGISTRY_BITFIELD: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressVersion {
    /// Names a byte range of a content block
    Content,
    /// Names a registry entry that holds a content address
    Registry,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    bitfield: u16,
    hash: [u8; 32],
}

impl Address {
    /// Version 1 address for `fetch_size` bytes at `offset` of the block
    /// hashing to `hash`.
    pub fn content(hash: &Hash, offset: u64, fetch_size: u64) -> Result<Self, BlockError> {
        let bitfield = encode_range(offset, fetch_size)?;
        Ok(Self {
            bitfield,
            hash: *hash.as_bytes(),
        })
    }

    /// Version 2 address for the registry slot `(public_key, lookup_key)`.
    pub fn registry(public_key: &PublicKey, lookup_key: &LookupKey) -> Self {
        let hash = hash_concat(&[public_key.as_bytes(), lookup_key.as_bytes()]);
        Self {
            bitfield: REGISTRY_BITFIELD,
            hash: *hash.as_bytes(),
        }
    }

    pub fn version(&self) -> AddressVersion {
        if self.bitfield & 0b11 == 0 {
            AddressVersion::Content
        } else {
            AddressVersion::Registry
        }
    }

    pub fn bitfield(&self) -> u16 {
        self.bitfield
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Decoded `(offset, fetch_size)` of a version 1 address.
    pub fn offset_and_fetch_size(&self) -> Result<(u64, u64), BlockError> {
        if self.version() != AddressVersion::Content {
            return Err(BlockError::InvalidAddress(
                "registry addresses do not carry a byte range".into(),
            ));
        }
        decode_range(self.bitfield)
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut out = [0u8; ADDRESS_SIZE];
        out[..2].copy_from_slice(&self.bitfield.to_le_bytes());
        out[2..].copy_from_slice(&self.hash);
        out
    }

    /// Parse and validate raw address bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(BlockError::InvalidAddress(format!(
                "expected {ADDRESS_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let bitfield = u16::from_le_bytes([bytes[0], bytes[1]]);
        match bitfield & 0b11 {
            0 => {
                decode_range(bitfield)?;
            }
            1 if bitfield == REGISTRY_BITFIELD => {}
            1 => {
                return Err(BlockError::InvalidAddress(format!(
                    "registry address has stray bitfield bits: {bitfield:#06x}"
                )))
            }
            v => {
                return Err(BlockError::InvalidAddress(format!(
                    "unknown address version {}",
                    v + 1
                )))
            }
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..]);
        Ok(Self { bitfield, hash })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = BlockError;

    /// Accepts the bare base64url form or one prefixed with `sia://`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = text.strip_prefix(URI_SCHEME).unwrap_or(text);
        if text.len() != ADDRESS_TEXT_LEN {
            return Err(BlockError::InvalidAddress(format!(
                "expected {ADDRESS_TEXT_LEN} characters, got {}",
                text.len()
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|e| BlockError::InvalidAddress(format!("base64 decode: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Lower bound (exclusive) and step of fetch sizes representable in `mode`.
fn mode_bounds(mode: u32) -> (u64, u64) {
    if mode == 0 {
        (0, ALIGNMENT)
    } else {
        (MODE_0_MAX_FETCH << (mode - 1), ALIGNMENT << (mode - 1))
    }
}

fn check_range(offset: u64, fetch_size: u64) -> Result<(), BlockError> {
    match offset.checked_add(fetch_size) {
        Some(end) if end <= BLOCK_SIZE as u64 => Ok(()),
        _ => Err(BlockError::OffsetOutOfRange { offset, fetch_size }),
    }
}

fn encode_range(offset: u64, fetch_size: u64) -> Result<u16, BlockError> {
    if fetch_size == 0 {
        return Err(BlockError::InvalidAddress("fetch size must be positive".into()));
    }
    check_range(offset, fetch_size)?;

    let mut mode = 0u32;
    while fetch_size > MODE_0_MAX_FETCH << mode {
        mode += 1;
    }
    debug_assert!(mode <= MAX_MODE);

    let alignment = ALIGNMENT << mode;
    if offset % alignment != 0 {
        return Err(BlockError::InvalidAddress(format!(
            "offset {offset} is not aligned to {alignment} bytes for fetch size {fetch_size}"
        )));
    }

    let (base, step) = mode_bounds(mode);
    let fetch_bits = (fetch_size - base - 1) / step;
    let offset_bits = offset / alignment;

    let mut bitfield: u64 = ((1 << mode) - 1) << 2;
    bitfield |= fetch_bits << (3 + mode);
    bitfield |= offset_bits << (6 + mode);
    u16::try_from(bitfield).map_err(|_| BlockError::OffsetOutOfRange { offset, fetch_size })
}

fn decode_range(bitfield: u16) -> Result<(u64, u64), BlockError> {
    let mut bits = u64::from(bitfield >> 2);
    let mut mode = 0u32;
    while bits & 1 == 1 {
        mode += 1;
        bits >>= 1;
    }
    if mode > MAX_MODE {
        return Err(BlockError::InvalidAddress(format!(
            "mode {mode} exceeds maximum {MAX_MODE}"
        )));
    }
    bits >>= 1;

    let fetch_bits = bits & 0b111;
    let offset_bits = bits >> 3;

    let (base, step) = mode_bounds(mode);
    let fetch_size = base + (fetch_bits + 1) * step;
    let offset = offset_bits * (ALIGNMENT << mode);
    check_range(offset, fetch_size)?;
    Ok((offset, fetch_size))
}
