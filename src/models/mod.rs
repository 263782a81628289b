mod config;
mod document;
mod search;

pub use config::{
    Config, DEFAULT_CONTROL_PLANE_URL, DEFAULT_DIMENSION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBEDDING_URL, DEFAULT_INDEX_NAME, DEFAULT_VAULT_PATH, DimensionPolicy,
    EmbeddingConfig, IndexConfig, Metric, PerformanceConfig, RetrySettings, SearchConfig,
    StoreConfig, VaultConfig,
};
pub use document::{
    ChunkInfo, Document, FileType, METADATA_BUDGET_BYTES, METADATA_TEXT_PREVIEW_CHARS,
};
pub use search::{OutputFormat, SearchHit, SearchQuery, SearchResults};
