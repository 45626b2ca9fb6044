//! Portal client: request decoration, status handling, pin and metadata

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG, USER_AGENT};
use http::{Method, StatusCode};
use serde::Deserialize;
use skykit_chunks::Address;
use skykit_core::config::PortalConfig;
use std::fmt;
use tracing::{debug, info};

use crate::error::{PortalError, PortalResult};
use crate::transport::{HttpTransport, PortalRequest, PortalResponse, Transport, TransportError};

/// Header carrying the portal API key
pub const API_KEY_HEADER: &str = "skynet-api-key";

/// Header in which the portal echoes a content address
pub const SKYLINK_HEADER: &str = "skynet-skylink";

#[derive(Clone)]
pub struct ClientOptions {
    pub api_key: Option<String>,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        PortalConfig::default().into()
    }
}

impl From<PortalConfig> for ClientOptions {
    fn from(cfg: PortalConfig) -> Self {
        Self {
            api_key: cfg.api_key,
            user_agent: cfg.user_agent,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Headers the portal returns for a content address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMetadata {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub skylink: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct PortalClient<T> {
    transport: T,
    options: ClientOptions,
}

impl PortalClient<HttpTransport> {
    pub fn from_config(cfg: &PortalConfig) -> PortalResult<Self> {
        let transport = HttpTransport::from_config(cfg)?;
        Ok(Self::new(transport, cfg.clone().into()))
    }
}

impl<T: Transport> PortalClient<T> {
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute a request; any status >= 400 becomes [`PortalError::Status`].
    /// A body over the request's `max_body` becomes [`PortalError::Decode`].
    pub async fn execute(&self, request: PortalRequest) -> PortalResult<PortalResponse> {
        self.execute_allowing(request, &[]).await
    }

    /// Like [`execute`](Self::execute), but statuses in `allowed` are
    /// returned to the caller instead of being turned into errors.
    pub async fn execute_allowing(
        &self,
        mut request: PortalRequest,
        allowed: &[StatusCode],
    ) -> PortalResult<PortalResponse> {
        self.decorate(&mut request)?;
        debug!(method = %request.method, path = %request.path, "portal request");

        let max_body = request.max_body;
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| match e {
                TransportError::BodyTooLarge { .. } => PortalError::Decode(e.to_string()),
                other => PortalError::Transport(other),
            })?;
        if let Some(max) = max_body {
            if response.body.len() > max {
                return Err(PortalError::Decode(format!(
                    "response body of {} bytes exceeds the {max}-byte limit",
                    response.body.len()
                )));
            }
        }
        if response.status.as_u16() >= 400 && !allowed.contains(&response.status) {
            return Err(PortalError::Status {
                status: response.status.as_u16(),
                message: error_message(&response.body),
            });
        }
        Ok(response)
    }

    fn decorate(&self, request: &mut PortalRequest) -> PortalResult<()> {
        let user_agent = HeaderValue::from_str(&self.options.user_agent)
            .map_err(|_| PortalError::InternalFault("user agent is not a valid header value".into()))?;
        request.headers.insert(USER_AGENT, user_agent);

        if let Some(key) = &self.options.api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| PortalError::InternalFault("api key is not a valid header value".into()))?;
            value.set_sensitive(true);
            request
                .headers
                .insert(HeaderName::from_static(API_KEY_HEADER), value);
        }
        Ok(())
    }

    /// Ask the portal to keep `address` pinned. Returns the address the
    /// portal reports, or `address` itself when no header is sent.
    pub async fn pin(&self, address: &Address) -> PortalResult<Address> {
        let request = PortalRequest::new(Method::POST, format!("/skynet/pin/{address}"));
        let response = self.execute(request).await?;
        if response.status != StatusCode::NO_CONTENT {
            return Err(PortalError::Decode(format!(
                "pin: expected HTTP 204, got {}",
                response.status.as_u16()
            )));
        }

        let pinned = match response.header_str(SKYLINK_HEADER) {
            Some(text) => text
                .parse()
                .map_err(|e| PortalError::Decode(format!("pin: {SKYLINK_HEADER} header: {e}")))?,
            None => *address,
        };
        info!(%pinned, "content pinned");
        Ok(pinned)
    }

    /// HEAD the content at `address`.
    pub async fn metadata(&self, address: &Address) -> PortalResult<ContentMetadata> {
        let request = PortalRequest::new(Method::HEAD, format!("/{address}"));
        let response = self.execute(request).await?;

        let content_length = response
            .header_str(CONTENT_LENGTH.as_str())
            .ok_or_else(|| PortalError::Decode("metadata: missing content-length".into()))?
            .parse::<u64>()
            .map_err(|e| PortalError::Decode(format!("metadata: content-length: {e}")))?;

        let header = |name: &str| response.header_str(name).map(str::to_string);
        Ok(ContentMetadata {
            content_length,
            content_type: header(CONTENT_TYPE.as_str()),
            etag: header(ETAG.as_str()),
            skylink: header(SKYLINK_HEADER),
        })
    }
}

/// Portal error text: the JSON `message` field when present, else the body.
fn error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.message;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "no response body".into()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed response and remembers the last request.
    struct Canned {
        response: PortalResponse,
        seen: Mutex<Option<PortalRequest>>,
    }

    impl Canned {
        fn new(response: PortalResponse) -> Self {
            Self {
                response,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn execute(&self, request: PortalRequest) -> Result<PortalResponse, TransportError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(self.response.clone())
        }
    }

    fn response(status: u16, body: &str) -> PortalResponse {
        let mut r = PortalResponse::new(StatusCode::from_u16(status).unwrap());
        r.body = body.to_string().into();
        r
    }

    #[tokio::test]
    async fn test_headers_attached() {
        let options = ClientOptions {
            api_key: Some("k3y".into()),
            user_agent: "skykit-test".into(),
        };
        let client = PortalClient::new(Canned::new(response(200, "")), options);
        client
            .execute(PortalRequest::new(Method::GET, "/"))
            .await
            .unwrap();

        let seen = client.transport().seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.headers.get(API_KEY_HEADER).unwrap(), "k3y");
        assert_eq!(seen.headers.get(USER_AGENT).unwrap(), "skykit-test");
    }

    #[tokio::test]
    async fn test_no_api_key_header_by_default() {
        let client = PortalClient::new(Canned::new(response(200, "")), ClientOptions::default());
        client
            .execute(PortalRequest::new(Method::GET, "/"))
            .await
            .unwrap();
        let seen = client.transport().seen.lock().unwrap().take().unwrap();
        assert!(seen.headers.get(API_KEY_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_status_error_uses_json_message() {
        let client = PortalClient::new(
            Canned::new(response(400, r#"{"message":"bad datakey"}"#)),
            ClientOptions::default(),
        );
        let err = client
            .execute(PortalRequest::new(Method::GET, "/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::Status { status: 400, ref message } if message == "bad datakey"
        ));
    }

    #[tokio::test]
    async fn test_status_error_falls_back_to_body() {
        let client = PortalClient::new(
            Canned::new(response(502, "upstream down\n")),
            ClientOptions::default(),
        );
        let err = client
            .execute(PortalRequest::new(Method::GET, "/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::Status { status: 502, ref message } if message == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_allowed_status_passes_through() {
        let client = PortalClient::new(Canned::new(response(404, "")), ClientOptions::default());
        let resp = client
            .execute_allowing(PortalRequest::new(Method::GET, "/"), &[StatusCode::NOT_FOUND])
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pin_requires_no_content() {
        let client = PortalClient::new(Canned::new(response(200, "")), ClientOptions::default());
        let address = Address::content(&skykit_chunks::hash_bytes(b"pinned"), 0, 4096).unwrap();
        let err = client.pin(&address).await.unwrap_err();
        assert!(
            matches!(err, PortalError::Decode(ref m) if m.contains("204")),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_body_over_limit_is_decode_error() {
        let client = PortalClient::new(
            Canned::new(response(200, "0123456789abcdef!")),
            ClientOptions::default(),
        );
        let err = client
            .execute(PortalRequest::new(Method::GET, "/").with_max_body(16))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Decode(_)), "unexpected error: {err:?}");

        let ok = client
            .execute(PortalRequest::new(Method::GET, "/").with_max_body(17))
            .await
            .unwrap();
        assert_eq!(ok.body.len(), 17);
    }

    #[test]
    fn test_options_debug_redacts_key() {
        let options = ClientOptions {
            api_key: Some("super-secret".into()),
            user_agent: "ua".into(),
        };
        let shown = format!("{options:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("REDACTED"));
    }
}
