//! Line framing for encrypted payloads
//!
//! Every encrypted message travels as one line of standard base64. The
//! newline itself is added by the transport.

use crate::{CosignError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Encode ciphertext as a single frame
pub fn encode_frame(ciphertext: &[u8]) -> String {
    STANDARD.encode(ciphertext)
}

/// Decode a frame back to ciphertext
pub fn decode_frame(frame: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(frame.trim())
        .map_err(|e| CosignError::decryption(format!("frame is not base64: {e}")))
}
