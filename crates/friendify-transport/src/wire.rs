//! Wire format
//!
//! Everything on the wire is an opaque byte payload. A credential record is
//! framed with [`CREDENTIAL_MAGIC`], whose first byte (`0xFF`) can never start
//! valid UTF-8, followed by a bincode-encoded [`CredentialRecord`]. Chat text
//! is sent as raw UTF-8.
//!
//! Decoding tries the credential frame first and falls back to text. A payload
//! that is neither is malformed.

use crate::error::WireError;
use friendify_core::DiscoveryToken;
use serde::{Deserialize, Serialize};

/// Frame prefix for credential records
pub const CREDENTIAL_MAGIC: [u8; 4] = [0xFF, b'F', b'D', b'T'];

/// Current credential record version
pub const WIRE_VERSION: u8 = 1;

/// Versioned credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Record version
    pub version: u8,
    /// Sender's ranging credential
    pub token: DiscoveryToken,
}

/// Decoded wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Peer's ranging credential
    Credential(DiscoveryToken),
    /// Chat text
    Text(String),
}

impl WireMessage {
    /// Encode for the transport
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            Self::Credential(token) => encode_credential(token),
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Decode a received payload, credential first
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        if let Some(token) = decode_credential(payload) {
            return Ok(Self::Credential(token));
        }
        match std::str::from_utf8(payload) {
            Ok(text) => Ok(Self::Text(text.to_string())),
            Err(_) => Err(WireError::Malformed { len: payload.len() }),
        }
    }
}

/// Frame a credential
pub fn encode_credential(token: &DiscoveryToken) -> Result<Vec<u8>, WireError> {
    let record = CredentialRecord {
        version: WIRE_VERSION,
        token: token.clone(),
    };
    let body = bincode::serialize(&record).map_err(|e| WireError::Encode(e.to_string()))?;

    let mut payload = Vec::with_capacity(CREDENTIAL_MAGIC.len() + body.len());
    payload.extend_from_slice(&CREDENTIAL_MAGIC);
    payload.extend_from_slice(&body);
    Ok(payload)
}

fn decode_credential(payload: &[u8]) -> Option<DiscoveryToken> {
    let body = payload.strip_prefix(&CREDENTIAL_MAGIC[..])?;
    let record: CredentialRecord = bincode::deserialize(body).ok()?;

    // Trailing garbage means the frame is not what it claims to be
    let consumed = bincode::serialized_size(&record).ok()?;
    if consumed != body.len() as u64 {
        return None;
    }
    if record.version != WIRE_VERSION || record.token.as_bytes().is_empty() {
        return None;
    }
    Some(record.token)
}
