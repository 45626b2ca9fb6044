//! In-memory portal for integration tests.
//!
//! Serves the registry, restore, pin and HEAD endpoints the client uses,
//! enforcing strictly increasing revisions and verifying signatures the way
//! a real portal does. Fault switches let tests make it misbehave.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde_json::json;
use skykit_chunks::{hash_bytes, Address, BaseBlock};
use skykit_core::RegistryType;
use skykit_crypto::{LookupKey, PublicKey, Signature};
use skykit_portal::registry::entry_hash;
use skykit_portal::{
    ClientOptions, PortalClient, PortalRequest, PortalResponse, Transport, TransportError,
    BACKUP_HEADER_SIZE, MAX_RESPONSE_BODY,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub revision: u64,
    pub signature: Vec<u8>,
    pub entry_type: u8,
}

#[derive(Default)]
struct State {
    registry: HashMap<(String, String), StoredEntry>,
    blocks: HashMap<Address, Vec<u8>>,
    requests: Vec<(Method, String)>,
    tamper_signatures: bool,
    wrong_address: bool,
    time_out: bool,
    oversized_reads: bool,
}

/// Cloning shares state, so a test can keep a handle after giving one to a client.
#[derive(Clone, Default)]
pub struct MockPortal {
    state: Arc<Mutex<State>>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> PortalClient<MockPortal> {
        PortalClient::new(self.clone(), ClientOptions::default())
    }

    pub fn tamper_signatures(&self, on: bool) {
        self.state.lock().unwrap().tamper_signatures = on;
    }

    pub fn report_wrong_address(&self, on: bool) {
        self.state.lock().unwrap().wrong_address = on;
    }

    pub fn time_out(&self, on: bool) {
        self.state.lock().unwrap().time_out = on;
    }

    /// Answer registry reads with a body one byte over the client's limit.
    pub fn oversized_reads(&self, on: bool) {
        self.state.lock().unwrap().oversized_reads = on;
    }

    pub fn stored(&self, public_key: &PublicKey, lookup_key: &LookupKey) -> Option<StoredEntry> {
        let key = (public_key.to_string(), lookup_key.to_string());
        self.state.lock().unwrap().registry.get(&key).cloned()
    }

    /// Store an entry without any checks, as a misbehaving portal would.
    pub fn insert_raw(&self, public_key: &PublicKey, lookup_key: &LookupKey, entry: StoredEntry) {
        let key = (public_key.to_string(), lookup_key.to_string());
        self.state.lock().unwrap().registry.insert(key, entry);
    }

    pub fn block(&self, address: &Address) -> Option<Vec<u8>> {
        self.state.lock().unwrap().blocks.get(address).cloned()
    }

    /// Number of requests seen with this method and path prefix.
    pub fn count(&self, method: Method, path_prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, p)| *m == method && p.starts_with(path_prefix))
            .count()
    }

    fn handle(&self, request: &PortalRequest) -> PortalResponse {
        let path = request.path.as_str();
        match (&request.method, path) {
            (&Method::GET, "/skynet/registry") => self.registry_read(request),
            (&Method::POST, "/skynet/registry") => self.registry_write(request),
            (&Method::POST, "/skynet/restore") => self.restore(request),
            (&Method::HEAD, "/") => reply(StatusCode::OK, Bytes::new()),
            (&Method::POST, p) if p.starts_with("/skynet/pin/") => {
                self.pin(&p["/skynet/pin/".len()..])
            }
            (&Method::HEAD, p) => self.head(&p[1..]),
            _ => error(StatusCode::NOT_FOUND, "no such endpoint"),
        }
    }

    fn registry_read(&self, request: &PortalRequest) -> PortalResponse {
        let (Some(pk), Some(dk)) = (
            request.query_param("publickey"),
            request.query_param("datakey"),
        ) else {
            return error(StatusCode::BAD_REQUEST, "missing publickey or datakey");
        };

        let state = self.state.lock().unwrap();
        if state.oversized_reads {
            return reply(StatusCode::OK, Bytes::from(vec![b' '; MAX_RESPONSE_BODY + 1]));
        }
        let Some(entry) = state.registry.get(&(pk.to_string(), dk.to_string())) else {
            return error(StatusCode::NOT_FOUND, "registry entry not found");
        };

        let mut signature = entry.signature.clone();
        if state.tamper_signatures {
            signature[0] ^= 0x01;
        }
        json_reply(
            StatusCode::OK,
            json!({
                "data": hex::encode(&entry.data),
                "revision": entry.revision,
                "signature": hex::encode(&signature),
                "type": entry.entry_type,
            }),
        )
    }

    fn registry_write(&self, request: &PortalRequest) -> PortalResponse {
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            return error(StatusCode::BAD_REQUEST, "body is not json");
        };
        let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();
        let (pk_text, dk_text) = (field("publickey"), field("datakey"));
        let revision = body["revision"].as_u64().unwrap_or_default();
        let entry_type = body["type"].as_u64().unwrap_or_default() as u8;

        let (Ok(public_key), Ok(lookup_key), Ok(data), Ok(signature)) = (
            pk_text.parse::<PublicKey>(),
            dk_text.parse::<LookupKey>(),
            hex::decode(field("data")),
            hex::decode(field("signature")),
        ) else {
            return error(StatusCode::BAD_REQUEST, "malformed registry write");
        };
        let Ok(kind) = RegistryType::try_from(entry_type) else {
            return error(StatusCode::BAD_REQUEST, "unknown entry type");
        };
        let Ok(sig) = Signature::from_slice(&signature) else {
            return error(StatusCode::BAD_REQUEST, "bad signature length");
        };
        let digest = entry_hash(&lookup_key, &data, revision, kind);
        if public_key.verify(&digest, &sig).is_err() {
            return error(StatusCode::BAD_REQUEST, "invalid signature");
        }

        let mut state = self.state.lock().unwrap();
        let key = (pk_text, dk_text);
        if let Some(current) = state.registry.get(&key) {
            if revision <= current.revision {
                return error(
                    StatusCode::BAD_REQUEST,
                    &format!(
                        "provided revision number {revision} is not greater than current revision {}",
                        current.revision
                    ),
                );
            }
        }
        state.registry.insert(
            key,
            StoredEntry {
                data,
                revision,
                signature,
                entry_type,
            },
        );
        reply(StatusCode::NO_CONTENT, Bytes::new())
    }

    fn restore(&self, request: &PortalRequest) -> PortalResponse {
        if request.body.len() < BACKUP_HEADER_SIZE {
            return error(StatusCode::BAD_REQUEST, "missing backup header");
        }
        let block = request.body[BACKUP_HEADER_SIZE..].to_vec();
        if BaseBlock::parse(&block).is_err() {
            return error(StatusCode::BAD_REQUEST, "malformed base block");
        }

        let mut state = self.state.lock().unwrap();
        let hash = if state.wrong_address {
            hash_bytes(b"something else entirely")
        } else {
            hash_bytes(&block)
        };
        let Ok(address) = Address::content(&hash, 0, block.len() as u64) else {
            return error(StatusCode::BAD_REQUEST, "block too large");
        };
        state.blocks.insert(address, block);
        json_reply(StatusCode::OK, json!({ "skylink": address.to_string() }))
    }

    fn pin(&self, address: &str) -> PortalResponse {
        let Ok(address) = address.parse::<Address>() else {
            return error(StatusCode::BAD_REQUEST, "invalid skylink");
        };
        if !self.state.lock().unwrap().blocks.contains_key(&address) {
            return error(StatusCode::NOT_FOUND, "skylink not found");
        }
        let mut response = reply(StatusCode::NO_CONTENT, Bytes::new());
        response.headers.insert(
            "skynet-skylink",
            HeaderValue::from_str(&address.to_string()).unwrap(),
        );
        response
    }

    fn head(&self, address: &str) -> PortalResponse {
        let Ok(address) = address.parse::<Address>() else {
            return error(StatusCode::BAD_REQUEST, "invalid skylink");
        };
        let state = self.state.lock().unwrap();
        let Some(block) = state.blocks.get(&address) else {
            return error(StatusCode::NOT_FOUND, "skylink not found");
        };
        let Ok(parsed) = BaseBlock::parse(block) else {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "stored block is corrupt");
        };

        let mut response = reply(StatusCode::OK, Bytes::new());
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(parsed.file.len() as u64));
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        response.headers.insert(
            "skynet-skylink",
            HeaderValue::from_str(&address.to_string()).unwrap(),
        );
        response
    }
}

#[async_trait]
impl Transport for MockPortal {
    async fn execute(&self, request: PortalRequest) -> Result<PortalResponse, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            state
                .requests
                .push((request.method.clone(), request.path.clone()));
            if state.time_out {
                return Err(TransportError::Timeout);
            }
        }
        Ok(self.handle(&request))
    }
}

fn reply(status: StatusCode, body: Bytes) -> PortalResponse {
    let mut response = PortalResponse::new(status);
    response.body = body;
    response
}

fn json_reply(status: StatusCode, value: serde_json::Value) -> PortalResponse {
    let mut response = reply(status, Bytes::from(value.to_string()));
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error(status: StatusCode, message: &str) -> PortalResponse {
    json_reply(status, json!({ "message": message }))
}
