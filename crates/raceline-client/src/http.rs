//! Request/response plumbing shared by the REST clients.

use crate::ClientError;
use serde::de::DeserializeOwned;

/// Send `request` and decode a successful JSON answer.
///
/// Non-2xx answers become [`ClientError::Status`] carrying the body text.
pub(crate) async fn send_json<T: DeserializeOwned>(
    operation: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::from_reqwest(operation, e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::from_reqwest(operation, e))?;
    if !status.is_success() {
        return Err(ClientError::Status {
            operation,
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| ClientError::Decode { operation, source })
}
