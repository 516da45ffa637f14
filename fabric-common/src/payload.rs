//! Base64 segment payload encode/decode, per `spec.md` §6's `POST
//! /segments` body shape.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::FabricError;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(payload: &str) -> Result<Vec<u8>, FabricError> {
    STANDARD
        .decode(payload)
        .map_err(|e| FabricError::Corrupt(e.to_string()))
}
