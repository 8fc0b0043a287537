use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app::{ConduitError, Result};
use crate::domain::SortKey;

const DIGEST_HEX_LEN: usize = 16;

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    t: i64,
    id: Uuid,
}

/// Turns a resume position into an opaque page token and back.
///
/// Tokens are `hex(payload) "." digest`, where the digest is a truncated
/// SHA-256 over the secret and payload. Anything that does not verify is
/// rejected as `InvalidPageToken`.
#[derive(Debug, Clone)]
pub struct PageTokenCodec {
    secret: String,
}

impl PageTokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn encode(&self, last: &SortKey) -> Result<String> {
        let payload = serde_json::to_vec(&TokenPayload {
            t: last.created_at_ms,
            id: last.id,
        })?;
        Ok(format!("{}.{}", hex::encode(&payload), self.digest(&payload)))
    }

    pub fn decode(&self, token: &str) -> Result<SortKey> {
        let (payload_hex, digest) = token
            .split_once('.')
            .ok_or(ConduitError::InvalidPageToken)?;
        let payload = hex::decode(payload_hex).map_err(|_| ConduitError::InvalidPageToken)?;
        if digest != self.digest(&payload) {
            return Err(ConduitError::InvalidPageToken);
        }

        let decoded: TokenPayload =
            serde_json::from_slice(&payload).map_err(|_| ConduitError::InvalidPageToken)?;
        if decoded.t < 0 {
            return Err(ConduitError::InvalidPageToken);
        }
        Ok(SortKey {
            created_at_ms: decoded.t,
            id: decoded.id,
        })
    }

    fn digest(&self, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(payload);
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(DIGEST_HEX_LEN);
        digest
    }
}
