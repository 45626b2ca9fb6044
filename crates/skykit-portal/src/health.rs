//! Portal health check

use http::Method;

use crate::client::PortalClient;
use crate::error::PortalResult;
use crate::transport::{PortalRequest, Transport};

/// Verify the portal is reachable and answering with a non-error status.
pub async fn check_health<T: Transport>(client: &PortalClient<T>) -> PortalResult<()> {
    // HEAD on the root is the lightest request every portal serves
    client
        .execute(PortalRequest::new(Method::HEAD, "/"))
        .await
        .map(|_| ())
}

/// Returns true if the portal is reachable, false otherwise (non-panicking)
pub async fn is_healthy<T: Transport>(client: &PortalClient<T>) -> bool {
    check_health(client).await.is_ok()
}
