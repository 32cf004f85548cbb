pub mod context;
pub mod store;
pub mod types;

pub use context::{MemoryContext, SearchMode};
pub use store::{FetchRequest, Filter, MemoryStore, Mutation, Sort};
pub use types::{
    EpisodicMemory, Entity, InteractionRecord, LongTermMemory, MemoryItem, MemoryRecord,
    MemoryType, Note, Record, RecordKind, Relationship, ShortTermMemory,
};

/// Encode an f32 vector as little-endian bytes for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a little-endian BLOB back into an f32 vector. Trailing bytes are ignored.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_bytes_round_trip() {
        let v = vec![0.5f32, -1.25, 3.0];
        let bytes = embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_embedding(&bytes), v);
    }
}
