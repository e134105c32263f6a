//! Chunk corpus: the immutable page-addressable text records and their store.

mod chunk;
mod store;

pub use chunk::{compose_chunk_id, ChunkRecord};
pub use store::ChunkStore;
