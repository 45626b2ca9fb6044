//! 15-word seed phrases
//!
//! Layout of a phrase over a 1024-word dictionary:
//! ```text
//! words 0..=11  10 bits each, MSB-first over the seed bytes   (120 bits)
//! word  12       8 bits, index must be <= 256                  (8 bits)
//! words 13, 14  checksum: bits 0..10 and 10..20 of SHA-512(seed)
//! ```
//!
//! The phrase is displayed once and written down by the user; it is never
//! stored digitally.

use sha2::{Digest, Sha512};

use crate::dictionary::{resolve_prefix, Dictionary, ENGLISH_V1};
use crate::seed::Seed;
use crate::SEED_SIZE;

/// Total words in a phrase.
pub const PHRASE_WORDS: usize = 15;

/// Words carrying seed entropy (the rest are checksum words).
pub const SEED_WORDS: usize = 13;

/// Largest dictionary index accepted for the 13th word. Only its low 8 bits
/// carry entropy; higher indices would collide with reserved version bits.
pub const VERSION_WORD_MAX_INDEX: u16 = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhraseError {
    #[error("seed phrase must be {PHRASE_WORDS} words, got {words}")]
    MalformedPhrase { words: usize },

    #[error("word {} of the seed phrase is not in the dictionary", position + 1)]
    UnknownWord { position: usize },

    #[error("13th word of seed phrase is invalid (dictionary index {index} > {VERSION_WORD_MAX_INDEX})")]
    InvalidVersionWord { index: u16 },

    #[error("checksum word {} does not match the seed", position + 1)]
    ChecksumMismatch { position: usize },
}

/// Converts seeds to and from phrases over an injected dictionary.
#[derive(Debug, Clone, Copy)]
pub struct MnemonicCodec {
    dictionary: &'static Dictionary,
}

impl Default for MnemonicCodec {
    fn default() -> Self {
        Self::new(&ENGLISH_V1)
    }
}

impl MnemonicCodec {
    pub fn new(dictionary: &'static Dictionary) -> Self {
        Self { dictionary }
    }

    /// Encode a seed as a space-separated 15-word phrase.
    ///
    /// # Panics
    ///
    /// Panics if the produced phrase does not decode back to `seed`. That can
    /// only happen with a dictionary whose prefixes collide, and returning
    /// the phrase anyway would hand the user an unrecoverable secret.
    pub fn encode(&self, seed: &Seed) -> String {
        let mut words: Vec<&str> = seed_to_indices(seed.as_bytes())
            .iter()
            .map(|&i| self.dictionary.word(i))
            .collect();
        words.extend(
            checksum_indices(seed.as_bytes())
                .iter()
                .map(|&i| self.dictionary.word(i)),
        );
        let phrase = words.join(" ");

        match self.decode(&phrase) {
            Ok(decoded) if decoded == *seed => phrase,
            _ => panic!(
                "seed phrase failed its round-trip check with dictionary '{}'",
                self.dictionary.name()
            ),
        }
    }

    /// Decode and checksum-verify a phrase.
    pub fn decode(&self, phrase: &str) -> Result<Seed, PhraseError> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.len() != PHRASE_WORDS {
            return Err(PhraseError::MalformedPhrase { words: words.len() });
        }

        let mut indices = [0u16; SEED_WORDS];
        for (position, word) in words[..SEED_WORDS].iter().enumerate() {
            let index = resolve_prefix(self.dictionary, word)
                .ok_or(PhraseError::UnknownWord { position })?;
            if position == SEED_WORDS - 1 && index > VERSION_WORD_MAX_INDEX {
                return Err(PhraseError::InvalidVersionWord { index });
            }
            indices[position] = index;
        }

        let seed = Seed::from_bytes(indices_to_seed(&indices));

        for (offset, &expected) in checksum_indices(seed.as_bytes()).iter().enumerate() {
            let position = SEED_WORDS + offset;
            if words[position] != self.dictionary.word(expected) {
                return Err(PhraseError::ChecksumMismatch { position });
            }
        }

        Ok(seed)
    }
}

/// Encode with the default dictionary.
pub fn seed_to_phrase(seed: &Seed) -> String {
    MnemonicCodec::default().encode(seed)
}

/// Decode with the default dictionary.
pub fn phrase_to_seed(phrase: &str) -> Result<Seed, PhraseError> {
    MnemonicCodec::default().decode(phrase)
}

/// Generate a fresh seed and its phrase.
pub fn generate_phrase() -> (String, Seed) {
    let seed = Seed::generate();
    (seed_to_phrase(&seed), seed)
}

fn word_bits(word: usize) -> usize {
    if word == SEED_WORDS - 1 {
        8
    } else {
        10
    }
}

fn seed_to_indices(seed: &[u8; SEED_SIZE]) -> [u16; SEED_WORDS] {
    let mut indices = [0u16; SEED_WORDS];
    for bit in 0..SEED_SIZE * 8 {
        if (seed[bit / 8] >> (7 - bit % 8)) & 1 == 1 {
            let word = bit / 10;
            indices[word] |= 1 << (word_bits(word) - 1 - bit % 10);
        }
    }
    indices
}

fn indices_to_seed(indices: &[u16; SEED_WORDS]) -> [u8; SEED_SIZE] {
    let mut seed = [0u8; SEED_SIZE];
    for bit in 0..SEED_SIZE * 8 {
        let word = bit / 10;
        if (indices[word] >> (word_bits(word) - 1 - bit % 10)) & 1 == 1 {
            seed[bit / 8] |= 1 << (7 - bit % 8);
        }
    }
    seed
}

/// Dictionary indices of the two checksum words.
fn checksum_indices(seed: &[u8; SEED_SIZE]) -> [u16; 2] {
    let digest = Sha512::digest(seed);
    let (d0, d1, d2) = (
        u32::from(digest[0]),
        u32::from(digest[1]),
        u32::from(digest[2]),
    );
    let first = ((d0 << 8) | d1) >> 6;
    let second = (((d1 << 10) & 0xffff) | (d2 << 2)) >> 6;
    [first as u16, second as u16]
}
