//! Response envelopes shared by handlers.
//!
//! Successful payloads are wrapped as `{ "data": ... }`. The login token
//! response is the one exception: it is returned bare so OAuth-style clients
//! can read `access_token` at the top level.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: phases }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Human-readable acknowledgement for commands without a resource to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
