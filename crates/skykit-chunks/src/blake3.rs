//! BLAKE3 hashing for base blocks and registry addresses

/// A BLAKE3 hash digest (32 bytes), displayed as 64 hex chars
pub type Hash = blake3::Hash;

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Hash {
    blake3::hash(data)
}

/// Hash the concatenation of several slices without copying them together.
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Format a hash as lowercase hex string (64 chars)
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_hash_is_deterministic() {
        assert_eq!(hash_bytes(b""), hash_bytes(b""));
    }

    #[test]
    fn hash_hex_is_64_chars() {
        let hex = hash_to_hex(&hash_bytes(b"hello skykit"));
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(hash_bytes(b"foo"), hash_bytes(b"bar"));
    }

    proptest! {
        #[test]
        fn concat_matches_contiguous(
            a in proptest::collection::vec(any::<u8>(), 0..=512),
            b in proptest::collection::vec(any::<u8>(), 0..=512),
        ) {
            let joined: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
            prop_assert_eq!(hash_concat(&[&a, &b]), hash_bytes(&joined));
        }
    }
}
