//! The single JSON boundary: requests are serialized here and every inbound
//! payload is parsed here.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a request to its JSON text.
pub fn encode_request<T: Serialize + ?Sized>(request: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(request)
}

/// Parse one framed payload.
///
/// An empty payload is not valid JSON and fails like any other malformed
/// body.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(payload)
}
