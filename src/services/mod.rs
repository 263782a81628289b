mod chunker;
mod embedding;
mod loader;
mod pipeline;
mod search;
mod uploader;
mod vector_store;

pub use chunker::{Chunk, TextChunker};
pub use embedding::{Embedder, EmbeddingClient, HealthResponse};
pub use loader::{DiscoveredFile, LoadOutcome, LoadStats, SkippedFile, VaultLoader};
pub use pipeline::{IndexReport, IndexingPipeline};
pub use search::Searcher;
pub use uploader::{BatchFailure, BatchUploader, UploadFailure, UploadReport};
pub use vector_store::{
    IndexDescription, IndexStats, PineconeStore, QueryMatch, VectorRecord, VectorStore,
    create_store,
};
