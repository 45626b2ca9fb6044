pub mod config;
pub mod error;
pub mod types;

pub use error::{SkykitError, SkykitResult};
pub use types::{FileMetadata, RegistryType};
