//! Signed, revisioned registry entries
//!
//! An entry is addressed by (public key, lookup key) and carries a small
//! payload plus a revision number. The portal keeps the entry with the
//! highest revision; the signature covers
//!
//! ```text
//! BLAKE3(lookup_key ‖ u64_le(len(data)) ‖ data ‖ u64_le(revision) ‖ type)
//! ```
//!
//! so a portal can neither forge nor replay an entry under a different
//! revision. Nothing read from the portal is surfaced before its signature
//! verifies against the public key that was asked for.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use skykit_chunks::blake3::hash_concat;
use skykit_chunks::Address;
use skykit_core::RegistryType;
use skykit_crypto::{KeyError, LookupKey, PublicKey, Signature, SigningKeys};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::client::PortalClient;
use crate::error::{PortalError, PortalResult};
use crate::transport::{PortalRequest, Transport};

/// Largest payload the network accepts in a registry entry.
pub const MAX_ENTRY_DATA: usize = 113;

/// Largest registry read response the client will download.
pub const MAX_RESPONSE_BODY: usize = 10 * 1024 * 1024;

const REGISTRY_PATH: &str = "/skynet/registry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub public_key: PublicKey,
    pub lookup_key: LookupKey,
    pub data: Vec<u8>,
    pub revision: u64,
    pub entry_type: RegistryType,
    pub signature: Signature,
}

impl RegistryEntry {
    /// Sign `data` at `revision` with `keys`.
    pub fn signed(
        keys: &SigningKeys,
        lookup_key: LookupKey,
        data: Vec<u8>,
        revision: u64,
        entry_type: RegistryType,
    ) -> PortalResult<Self> {
        if data.len() > MAX_ENTRY_DATA {
            return Err(PortalError::EntryTooLarge {
                size: data.len(),
                max: MAX_ENTRY_DATA,
            });
        }
        let digest = entry_hash(&lookup_key, &data, revision, entry_type);
        Ok(Self {
            public_key: keys.public_key(),
            lookup_key,
            signature: keys.sign(&digest),
            data,
            revision,
            entry_type,
        })
    }

    pub fn verify(&self) -> Result<(), KeyError> {
        let digest = entry_hash(&self.lookup_key, &self.data, self.revision, self.entry_type);
        self.public_key.verify(&digest, &self.signature)
    }
}

/// The message signed for a registry entry.
pub fn entry_hash(
    lookup_key: &LookupKey,
    data: &[u8],
    revision: u64,
    entry_type: RegistryType,
) -> [u8; 32] {
    let len = (data.len() as u64).to_le_bytes();
    let revision = revision.to_le_bytes();
    let tag = [entry_type.as_u8()];
    let parts: [&[u8]; 5] = [
        lookup_key.as_bytes(),
        &len,
        data,
        &revision,
        &tag,
    ];
    *hash_concat(&parts).as_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryLookup {
    Found(RegistryEntry),
    NotFound,
}

impl RegistryLookup {
    pub fn revision(&self) -> Option<u64> {
        match self {
            RegistryLookup::Found(entry) => Some(entry.revision),
            RegistryLookup::NotFound => None,
        }
    }

    pub fn into_entry(self) -> Option<RegistryEntry> {
        match self {
            RegistryLookup::Found(entry) => Some(entry),
            RegistryLookup::NotFound => None,
        }
    }
}

#[derive(Deserialize)]
struct ReadResponse {
    data: String,
    revision: u64,
    signature: String,
    #[serde(rename = "type")]
    entry_type: u8,
}

#[derive(Serialize)]
struct WriteRequest {
    publickey: String,
    datakey: String,
    revision: u64,
    data: String,
    signature: String,
    #[serde(rename = "type")]
    entry_type: u8,
}

impl From<&RegistryEntry> for WriteRequest {
    fn from(entry: &RegistryEntry) -> Self {
        Self {
            publickey: entry.public_key.to_string(),
            datakey: entry.lookup_key.to_string(),
            revision: entry.revision,
            data: hex::encode(&entry.data),
            signature: hex::encode(entry.signature.to_bytes()),
            entry_type: entry.entry_type.as_u8(),
        }
    }
}

type Slot = (PublicKey, LookupKey);

/// Reads and writes registry entries through a portal.
///
/// Each client remembers the highest revision it has seen per slot and
/// never writes at or below it. That only orders writes made through this
/// client; independent writers are arbitrated by the portal alone.
pub struct RegistryClient<T> {
    portal: PortalClient<T>,
    observed: Mutex<HashMap<Slot, u64>>,
}

impl<T: Transport> RegistryClient<T> {
    pub fn new(portal: PortalClient<T>) -> Self {
        Self {
            portal,
            observed: Mutex::new(HashMap::new()),
        }
    }

    pub fn portal(&self) -> &PortalClient<T> {
        &self.portal
    }

    /// Highest revision this client has read or written for the slot.
    pub fn observed_revision(&self, public_key: &PublicKey, lookup_key: &LookupKey) -> Option<u64> {
        self.observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(*public_key, *lookup_key))
            .copied()
    }

    fn observe(&self, public_key: &PublicKey, lookup_key: &LookupKey, revision: u64) {
        let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = observed.entry((*public_key, *lookup_key)).or_insert(revision);
        *slot = (*slot).max(revision);
    }

    /// Fetch and verify the entry for (public key, lookup key).
    pub async fn read(
        &self,
        public_key: &PublicKey,
        lookup_key: &LookupKey,
    ) -> PortalResult<RegistryLookup> {
        let request = PortalRequest::new(Method::GET, REGISTRY_PATH)
            .with_query("publickey", public_key.to_string())
            .with_query("datakey", lookup_key.to_string())
            .with_max_body(MAX_RESPONSE_BODY);
        let response = self
            .portal
            .execute_allowing(request, &[StatusCode::NOT_FOUND])
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            debug!(%public_key, %lookup_key, "registry entry not found");
            return Ok(RegistryLookup::NotFound);
        }

        let parsed: ReadResponse = serde_json::from_slice(&response.body)
            .map_err(|e| PortalError::Decode(format!("registry response: {e}")))?;

        let entry = decode_entry(public_key, lookup_key, parsed).map_err(|reason| {
            warn!(%public_key, %lookup_key, %reason, "rejecting registry entry from portal");
            PortalError::UntrustedResponse(reason)
        })?;

        self.observe(public_key, lookup_key, entry.revision);
        debug!(%public_key, revision = entry.revision, "registry entry verified");
        Ok(RegistryLookup::Found(entry))
    }

    /// Write `data` at an explicit `revision`.
    ///
    /// Rejected locally with [`PortalError::StaleRevision`] if this client
    /// has already observed `revision` or higher for the slot.
    pub async fn write(
        &self,
        keys: &SigningKeys,
        lookup_key: &LookupKey,
        data: &[u8],
        revision: u64,
    ) -> PortalResult<()> {
        let public_key = keys.public_key();
        if let Some(observed) = self.observed_revision(&public_key, lookup_key) {
            if observed >= revision {
                return Err(PortalError::StaleRevision {
                    revision,
                    message: format!("revision {observed} already observed for this entry"),
                });
            }
        }

        let entry = RegistryEntry::signed(
            keys,
            *lookup_key,
            data.to_vec(),
            revision,
            RegistryType::WithoutPubkey,
        )?;
        self.submit(&entry).await
    }

    /// Replace the entry with `data` at the next revision and return it.
    ///
    /// Read-then-write: two writers racing on the same slot can both read
    /// revision N, and only one of them wins N+1. The loser gets
    /// [`PortalError::StaleRevision`]; this method never retries.
    pub async fn overwrite(
        &self,
        keys: &SigningKeys,
        lookup_key: &LookupKey,
        data: &[u8],
    ) -> PortalResult<u64> {
        let public_key = keys.public_key();
        let current = self.read(&public_key, lookup_key).await?;

        let latest = current
            .revision()
            .max(self.observed_revision(&public_key, lookup_key));
        let revision = match latest {
            None => 0,
            Some(r) => r
                .checked_add(1)
                .ok_or_else(|| PortalError::InternalFault("registry revision exhausted".into()))?,
        };

        let entry = RegistryEntry::signed(
            keys,
            *lookup_key,
            data.to_vec(),
            revision,
            RegistryType::WithoutPubkey,
        )?;
        self.submit(&entry).await?;
        Ok(revision)
    }

    /// Point the slot at `address` and return the registry address that
    /// resolves to it.
    pub async fn publish(
        &self,
        keys: &SigningKeys,
        lookup_key: &LookupKey,
        address: &Address,
    ) -> PortalResult<Address> {
        let revision = self.overwrite(keys, lookup_key, &address.to_bytes()).await?;
        let registry_address = Address::registry(&keys.public_key(), lookup_key);
        info!(%address, %registry_address, revision, "published address to registry");
        Ok(registry_address)
    }

    async fn submit(&self, entry: &RegistryEntry) -> PortalResult<()> {
        let body = serde_json::to_vec(&WriteRequest::from(entry))
            .map_err(|e| PortalError::InternalFault(format!("encoding registry write: {e}")))?;
        let request = PortalRequest::new(Method::POST, REGISTRY_PATH)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body);

        match self.portal.execute(request).await {
            Ok(_) => {
                self.observe(&entry.public_key, &entry.lookup_key, entry.revision);
                info!(
                    public_key = %entry.public_key,
                    revision = entry.revision,
                    "registry entry written"
                );
                Ok(())
            }
            Err(PortalError::Status { status, message }) if is_stale_rejection(status, &message) => {
                warn!(revision = entry.revision, %message, "portal rejected stale revision");
                Err(PortalError::StaleRevision {
                    revision: entry.revision,
                    message,
                })
            }
            Err(e) => Err(e),
        }
    }
}

fn is_stale_rejection(status: u16, message: &str) -> bool {
    status == StatusCode::CONFLICT.as_u16()
        || (status == StatusCode::BAD_REQUEST.as_u16()
            && message.to_ascii_lowercase().contains("revision"))
}

/// Rebuild and verify an entry from the portal's answer. Errors are
/// reasons the answer cannot be trusted.
fn decode_entry(
    public_key: &PublicKey,
    lookup_key: &LookupKey,
    response: ReadResponse,
) -> Result<RegistryEntry, String> {
    let data = hex::decode(&response.data).map_err(|e| format!("data is not hex: {e}"))?;
    if data.len() > MAX_ENTRY_DATA {
        return Err(format!(
            "data of {} bytes exceeds {MAX_ENTRY_DATA}",
            data.len()
        ));
    }
    let signature_bytes =
        hex::decode(&response.signature).map_err(|e| format!("signature is not hex: {e}"))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| format!("signature has length {}", signature_bytes.len()))?;
    let entry_type = RegistryType::try_from(response.entry_type)?;

    let entry = RegistryEntry {
        public_key: *public_key,
        lookup_key: *lookup_key,
        data,
        revision: response.revision,
        entry_type,
        signature,
    };
    entry.verify().map_err(|e| e.to_string())?;
    Ok(entry)
}
