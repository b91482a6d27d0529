//! # Wire Codec
//!
//! Converts a flat message mapping to and from the bytes carried in a packet
//! payload.
//!
//! ```text
//! plain:     {"action":"login",...}
//! encrypted: base64( IV(16) || AES-256-CBC({"action":"login",...}) )
//! ```
//!
//! Only string keys with scalar values are accepted; arrays and nested objects
//! are rejected so that both ends agree on a flat schema.

use crate::error::{BankError, Result};
use crate::protocol::message::{Request, RequestKind, Response};
use crate::utils::crypto::SymmetricCipher;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Flat string-keyed mapping exchanged on the wire
pub type WireMessage = Map<String, Value>;

/// Encoder/decoder for one side of a connection.
///
/// Cheap to clone; the cipher is shared.
#[derive(Clone, Debug, Default)]
pub struct WireCodec {
    cipher: Option<Arc<SymmetricCipher>>,
}

impl WireCodec {
    /// Codec that sends JSON text as-is
    pub fn plain() -> Self {
        Self { cipher: None }
    }

    /// Codec that wraps every message in a base64 AES envelope
    pub fn encrypted(cipher: Arc<SymmetricCipher>) -> Self {
        Self {
            cipher: Some(cipher),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Serialize `message` into transport bytes
    pub fn encode(&self, message: &WireMessage) -> Result<Vec<u8>> {
        let text = serde_json::to_vec(message)
            .map_err(|e| BankError::Codec(format!("Failed to serialize message: {e}")))?;

        match &self.cipher {
            Some(cipher) => {
                let envelope = cipher.encrypt(&text)?;
                Ok(STANDARD.encode(envelope).into_bytes())
            }
            None => Ok(text),
        }
    }

    /// Parse transport bytes back into a mapping.
    ///
    /// # Errors
    /// `Codec` for non-UTF-8 or non-base64 input, an envelope that does not
    /// decrypt under this key, unparsable JSON, a non-object top level, or
    /// nested values. Envelope failures keep their cause in the message, see
    /// [`BankError::is_decryption_failure`].
    pub fn decode(&self, bytes: &[u8]) -> Result<WireMessage> {
        let text = match &self.cipher {
            Some(cipher) => {
                let transport = std::str::from_utf8(bytes)
                    .map_err(|_| BankError::Codec("Transport text is not UTF-8".to_string()))?;
                let envelope = STANDARD
                    .decode(transport.trim())
                    .map_err(|e| BankError::Codec(format!("Invalid base64 envelope: {e}")))?;
                cipher
                    .decrypt(&envelope)
                    .map_err(|e| BankError::Codec(e.to_string()))?
            }
            None => bytes.to_vec(),
        };

        let value: Value = serde_json::from_slice(&text)
            .map_err(|e| BankError::Codec(format!("Malformed message: {e}")))?;

        let Value::Object(map) = value else {
            return Err(BankError::Codec("Message must be a JSON object".to_string()));
        };

        if let Some((key, _)) = map
            .iter()
            .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
        {
            return Err(BankError::Codec(format!("Field '{key}' is not a scalar")));
        }

        debug!(fields = map.len(), "Decoded wire message");
        Ok(map)
    }

    pub fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        self.encode(&request.to_wire())
    }

    pub fn encode_response(&self, response: &Response) -> Result<Vec<u8>> {
        self.encode(&response.to_wire())
    }

    /// Decode and type a response to a request of kind `kind`
    pub fn decode_response(&self, kind: RequestKind, bytes: &[u8]) -> Result<Response> {
        let map = self.decode(bytes)?;
        Response::from_wire(kind, &map)
    }
}
