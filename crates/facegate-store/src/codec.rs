//! Embedding serialization.
//!
//! Embeddings are stored as little-endian `f32` blobs. The comma-delimited
//! text form is accepted for importing galleries exported as text.

use crate::StoreError;
use facegate_core::Embedding;

const F32_BYTES: usize = std::mem::size_of::<f32>();

pub fn encode_embedding(embedding: &Embedding) -> Vec<u8> {
    embedding.values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a blob written by [`encode_embedding`]. `None` if the length is
/// not a whole number of floats.
pub fn decode_embedding(blob: &[u8]) -> Option<Embedding> {
    if blob.len() % F32_BYTES != 0 {
        return None;
    }
    let values = blob
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Some(Embedding::new(values))
}

/// Parse `"0.12, -0.5,0.33"`. Blank fields are skipped; any other
/// unparsable field fails the whole parse.
pub fn parse_delimited(text: &str) -> Result<Embedding, StoreError> {
    let values = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .map_err(|e| StoreError::InvalidEmbedding(format!("{s:?}: {e}")))
        })
        .collect::<Result<Vec<f32>, _>>()?;
    Ok(Embedding::new(values))
}
