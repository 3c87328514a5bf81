//! Binary-safe keys.
//!
//! DeviceDB keys travel as text. Keys holding arbitrary bytes are base64 encoded first.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::Result;

/// encodes `key` as standard, padded base64
pub fn encode_key(key: impl AsRef<[u8]>) -> String {
    STANDARD.encode(key)
}

/// decodes a key produced by [`encode_key`]
/// # Errors
/// `DeviceDbError::Key` if `encoded` is not valid base64
pub fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded)?)
}
