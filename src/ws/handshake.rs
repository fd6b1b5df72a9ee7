use hyper::header::{HeaderMap, CONNECTION, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use sha1::{Digest, Sha1};

const WS_MAGIC_CONST: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const WS_VERSION: &str = "13";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("missing `Upgrade: websocket` header")]
    NotUpgrade,
    #[error("missing `Sec-WebSocket-Key` header")]
    MissingKey,
    #[error("unsupported websocket version, expected 13")]
    UnsupportedVersion,
}

pub fn generate_key_from(input: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input);
    hasher.update(WS_MAGIC_CONST);
    base64::encode(hasher.finalize())
}

fn header_has_token(headers: &HeaderMap, name: hyper::header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

/// Validates an upgrade request and returns the `Sec-WebSocket-Accept` value.
pub fn accept_key(headers: &HeaderMap) -> Result<String, HandshakeError> {
    if !header_has_token(headers, UPGRADE, "websocket")
        || !header_has_token(headers, CONNECTION, "upgrade")
    {
        return Err(HandshakeError::NotUpgrade);
    }
    if let Some(version) = headers.get(SEC_WEBSOCKET_VERSION) {
        if version.as_bytes() != WS_VERSION.as_bytes() {
            return Err(HandshakeError::UnsupportedVersion);
        }
    }
    let key = headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(HandshakeError::MissingKey)?;
    Ok(generate_key_from(key.as_bytes()))
}
