//! skykit-portal: talking to a portal
//!
//! Every network call goes through a [`Transport`], so the registry and
//! upload logic can be exercised against an in-memory portal. Registry
//! reads are verified against the queried public key before anything is
//! returned, and uploads are checked against a locally computed address.

pub mod client;
pub mod error;
pub mod health;
pub mod registry;
pub mod transport;
pub mod upload;

pub use client::{ClientOptions, ContentMetadata, PortalClient};
pub use error::{PortalError, PortalResult};
pub use health::{check_health, is_healthy};
pub use registry::{
    RegistryClient, RegistryEntry, RegistryLookup, MAX_ENTRY_DATA, MAX_RESPONSE_BODY,
};
pub use transport::{HttpTransport, PortalRequest, PortalResponse, Transport, TransportError};
pub use upload::{
    backup_header, compute_address, file_address, prepare, PreparedUpload, SecureUploader,
    BACKUP_HEADER_SIZE,
};
