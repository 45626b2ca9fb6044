use serde::{Deserialize, Serialize};

use crate::error::{SkykitError, SkykitResult};

/// Metadata section of a content block, describing the original file.
///
/// Serialized as compact JSON in field order: `filename`, `length`, `mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub length: u64,
    pub mode: u32,
}

impl FileMetadata {
    pub fn new(filename: impl Into<String>, length: u64, mode: u32) -> Self {
        Self {
            filename: filename.into(),
            length,
            mode,
        }
    }

    /// Reject names the portal would refuse to serve back.
    pub fn validate(&self) -> SkykitResult<()> {
        let name = self.filename.as_str();
        if name.is_empty() {
            return Err(SkykitError::Metadata("filename is empty".into()));
        }
        if name == "." || name == ".." {
            return Err(SkykitError::Metadata(format!(
                "filename '{name}' is a relative path component"
            )));
        }
        if name.contains('/') || name.contains('\0') {
            return Err(SkykitError::Metadata(format!(
                "filename '{}' contains a path separator or NUL",
                name.escape_debug()
            )));
        }
        Ok(())
    }

    /// Validated JSON encoding of the metadata section.
    pub fn to_bytes(&self) -> SkykitResult<Vec<u8>> {
        self.validate()?;
        serde_json::to_vec(self)
            .map_err(|e| SkykitError::Metadata(format!("metadata serialization: {e}")))
    }

    pub fn from_bytes(data: &[u8]) -> SkykitResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| SkykitError::Metadata(format!("metadata deserialization: {e}")))
    }
}

/// Type tag carried by every registry entry and covered by its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RegistryType {
    /// Plain entry: the payload is opaque to the network.
    WithoutPubkey = 1,
    /// Entry whose payload embeds the owner's public key.
    WithPubkey = 2,
}

impl RegistryType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<RegistryType> for u8 {
    fn from(t: RegistryType) -> u8 {
        t.as_u8()
    }
}

impl TryFrom<u8> for RegistryType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::WithoutPubkey),
            2 => Ok(Self::WithPubkey),
            other => Err(format!("unknown registry entry type {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_json_field_order() {
        let meta = FileMetadata::new("hello.txt", 5, 0o644);
        let json = String::from_utf8(meta.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"filename":"hello.txt","length":5,"mode":420}"#);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = FileMetadata::new("report.pdf", 1024, 0o600);
        let back = FileMetadata::from_bytes(&meta.to_bytes().unwrap()).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn test_metadata_rejects_bad_names() {
        for name in ["", ".", "..", "a/b", "nul\0byte"] {
            let meta = FileMetadata::new(name, 0, 0o644);
            assert!(meta.validate().is_err(), "'{}' must be rejected", name.escape_debug());
        }
    }

    #[test]
    fn test_registry_type_wire_values() {
        assert_eq!(RegistryType::WithoutPubkey.as_u8(), 1);
        assert_eq!(RegistryType::try_from(2u8).unwrap(), RegistryType::WithPubkey);
        assert!(RegistryType::try_from(0u8).is_err());
        assert_eq!(serde_json::to_string(&RegistryType::WithoutPubkey).unwrap(), "1");
    }
}
