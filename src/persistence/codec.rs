//! JSON encoding of state documents

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{DecodeError, StoreError};
use crate::state::StateDocument;

/// Whole-buffer JSON codec
///
/// Output is human-inspectable; field order follows the struct definitions,
/// so the same document always encodes to the same bytes (as long as the
/// payload avoids unordered maps).
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    pretty: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonCodec {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn encode<P: Serialize>(&self, doc: &StateDocument<P>) -> Result<Vec<u8>, DecodeError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(doc)?
        } else {
            serde_json::to_vec(doc)?
        };
        Ok(bytes)
    }

    /// Parse a document; blank input is reported as [`DecodeError::Empty`]
    pub fn decode<P: DeserializeOwned>(&self, bytes: &[u8]) -> Result<StateDocument<P>, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read and decode a whole save file
    pub async fn read_file<P: DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<StateDocument<P>, StoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::io("reading save file", path, source))?;
        self.decode(&bytes).map_err(|e| StoreError::decode(path, e))
    }
}
