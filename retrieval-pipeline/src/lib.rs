pub mod chunker;
pub mod index;
pub mod store;

pub use chunker::Chunker;
pub use index::FlatIndex;
pub use store::{IndexSummary, ScoredChunk, VectorStore, SECTION_DELIMITER};
