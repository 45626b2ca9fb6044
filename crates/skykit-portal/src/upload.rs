//! Secure uploads: compute the address locally, then make the portal agree
//!
//! The block is sent through the restore endpoint together with a backup
//! header naming the expected address, so the portal stores exactly the
//! bytes that were hashed here. Whatever address the portal reports back is
//! compared against the local one; a mismatch is an integrity failure.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::Deserialize;
use skykit_chunks::{build_base_block, Address, BaseBlock, MAX_FILE_SIZE};
use skykit_core::FileMetadata;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::client::PortalClient;
use crate::error::{PortalError, PortalResult};
use crate::transport::{PortalRequest, Transport};

/// Fixed size of the backup header preceding the block in a restore upload
pub const BACKUP_HEADER_SIZE: usize = 92;

const BACKUP_MAGIC: &str = "Skyfile Backup\n";
const BACKUP_VERSION: &str = "1.0\n";
const RESTORE_PATH: &str = "/skynet/restore";

/// Mode recorded where the platform has no permission bits
#[cfg(not(unix))]
const DEFAULT_MODE: u32 = 0o644;

/// A file read into memory and serialized, ready to upload.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub metadata: FileMetadata,
    pub block: BaseBlock,
    pub address: Address,
}

#[derive(Deserialize)]
struct RestoreResponse {
    skylink: String,
}

/// Address of `file` uploaded with `metadata`, computed without a portal.
pub fn compute_address(file: &[u8], metadata: &FileMetadata) -> PortalResult<Address> {
    Ok(build_base_block(file, metadata)?.address()?)
}

/// Read `path` and build its base block and address.
///
/// The size is checked before reading, so oversized files are rejected
/// without being loaded.
pub async fn prepare(path: &Path) -> PortalResult<PreparedUpload> {
    let fs_meta = tokio::fs::metadata(path).await?;
    if !fs_meta.is_file() {
        return Err(PortalError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    if fs_meta.len() > MAX_FILE_SIZE as u64 {
        return Err(PortalError::FileTooLarge {
            size: fs_meta.len(),
            max: MAX_FILE_SIZE as u64,
        });
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PortalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no UTF-8 file name", path.display()),
            ))
        })?
        .to_string();

    let data = tokio::fs::read(path).await?;
    let metadata = FileMetadata::new(filename, data.len() as u64, permission_mode(&fs_meta));
    let block = build_base_block(&data, &metadata)?;
    let address = block.address()?;

    debug!(path = %path.display(), %address, size = data.len(), "prepared upload");
    Ok(PreparedUpload {
        metadata,
        block,
        address,
    })
}

#[cfg(unix)]
fn permission_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_mode(_meta: &std::fs::Metadata) -> u32 {
    DEFAULT_MODE
}

/// Address `path` would be uploaded under.
pub async fn file_address(path: &Path) -> PortalResult<Address> {
    Ok(prepare(path).await?.address)
}

/// Backup header: three length-prefixed strings (magic, version, address),
/// zero-padded to [`BACKUP_HEADER_SIZE`].
pub fn backup_header(address: &Address) -> PortalResult<[u8; BACKUP_HEADER_SIZE]> {
    let address_text = address.to_string();
    let mut encoded = Vec::with_capacity(BACKUP_HEADER_SIZE);
    for field in [BACKUP_MAGIC, BACKUP_VERSION, address_text.as_str()] {
        encoded.extend_from_slice(&(field.len() as u64).to_le_bytes());
        encoded.extend_from_slice(field.as_bytes());
    }
    if encoded.len() > BACKUP_HEADER_SIZE {
        return Err(PortalError::InternalFault(format!(
            "backup header is {} bytes, limit is {BACKUP_HEADER_SIZE}",
            encoded.len()
        )));
    }

    let mut header = [0u8; BACKUP_HEADER_SIZE];
    header[..encoded.len()].copy_from_slice(&encoded);
    Ok(header)
}

/// Uploads files so that the stored content is provably the local content.
pub struct SecureUploader<T> {
    portal: PortalClient<T>,
}

impl<T: Transport> SecureUploader<T> {
    pub fn new(portal: PortalClient<T>) -> Self {
        Self { portal }
    }

    pub fn portal(&self) -> &PortalClient<T> {
        &self.portal
    }

    /// Upload `path` and return its address once the portal confirms it.
    pub async fn upload_secure(&self, path: &Path) -> PortalResult<Address> {
        let prepared = prepare(path).await?;
        let header = backup_header(&prepared.address)?;

        let block = prepared.block.bytes();
        let mut body = Vec::with_capacity(BACKUP_HEADER_SIZE + block.len());
        body.extend_from_slice(&header);
        body.extend_from_slice(block);

        let request = PortalRequest::new(Method::POST, RESTORE_PATH)
            .with_header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            )
            .with_body(body);
        let response = self.portal.execute(request).await?;

        let parsed: RestoreResponse = serde_json::from_slice(&response.body)
            .map_err(|e| PortalError::Decode(format!("restore response: {e}")))?;

        let matches = parsed
            .skylink
            .parse::<Address>()
            .map(|remote| remote == prepared.address)
            .unwrap_or(false);
        if !matches {
            warn!(
                local = %prepared.address,
                remote = %parsed.skylink,
                "portal reported a different address for uploaded content"
            );
            return Err(PortalError::AddressMismatch {
                local: prepared.address,
                remote: parsed.skylink,
            });
        }

        info!(path = %path.display(), address = %prepared.address, "upload verified");
        Ok(prepared.address)
    }

    /// Everything [`upload_secure`](Self::upload_secure) does before the
    /// network call.
    pub async fn dry_run(&self, path: &Path) -> PortalResult<Address> {
        file_address(path).await
    }
}
