//! Wire codec for the WebSocket transport.
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.
//! Inbound frames are decoded into [`ClientMsg`] here, before anything reaches
//! the session, so malformed payloads never touch player state.

pub use skirmish_shared::protocol::*;

use crate::error::ProtocolError;

/// Decode one inbound text frame.
pub fn decode_client_msg(text: &str, max_bytes: usize) -> Result<ClientMsg, ProtocolError> {
    if text.len() > max_bytes {
        return Err(ProtocolError::TooLarge {
            size: text.len(),
            limit: max_bytes,
        });
    }
    Ok(serde_json::from_str(text)?)
}

pub fn encode_server_msg(msg: &ServerMsg) -> serde_json::Result<String> {
    serde_json::to_string(msg)
}

/// Build the `error` frame sent back to a client whose frame was rejected.
pub fn error_msg(err: &ProtocolError) -> ServerMsg {
    ServerMsg::Error(ErrorMsg {
        kind: err.kind(),
        message: err.to_string(),
    })
}
