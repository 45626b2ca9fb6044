use skykit_chunks::{Address, BlockError};
use thiserror::Error;

use crate::transport::TransportError;

pub type PortalResult<T> = Result<T, PortalError>;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("portal returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("untrusted portal response: {0}")]
    UntrustedResponse(String),

    #[error("stale revision {revision}: {message}")]
    StaleRevision { revision: u64, message: String },

    #[error("portal address {remote} does not match locally computed {local}")]
    AddressMismatch { local: Address, remote: String },

    #[error("file too large: {size} bytes exceeds the {max}-byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("registry data too large: {size} bytes exceeds the {max}-byte limit")]
    EntryTooLarge { size: usize, max: usize },

    #[error("invalid block: {0}")]
    Block(BlockError),

    #[error("internal fault: {0}")]
    InternalFault(String),

    #[error("malformed portal response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// Failures that must abort the operation: an answer that cannot be
    /// trusted, or a write that lost a revision race.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            PortalError::UntrustedResponse(_)
                | PortalError::StaleRevision { .. }
                | PortalError::AddressMismatch { .. }
        )
    }
}

impl From<BlockError> for PortalError {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::FileTooLarge { size, max } => PortalError::FileTooLarge { size, max },
            other => PortalError::Block(other),
        }
    }
}
