use aide_de_camp::core::Bytes;
use bincode::error::{DecodeError, EncodeError};

use crate::types::JobPayload;

/// Encodes and decodes job payloads stored in [`JobRecord::payload`](crate::JobRecord).
#[derive(Clone, Copy)]
pub struct PayloadCodec {
    config: bincode::config::Configuration,
}

impl PayloadCodec {
    pub fn new() -> Self {
        Self {
            config: bincode::config::standard(),
        }
    }

    pub fn encode(&self, payload: &JobPayload) -> Result<Bytes, EncodeError> {
        let encoded = bincode::encode_to_vec(payload, self.config)?;
        Ok(encoded.into())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<JobPayload, DecodeError> {
        let (decoded, _) = bincode::decode_from_slice(bytes, self.config)?;
        Ok(decoded)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}
