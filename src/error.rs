//! Error types for the vault search CLI.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to configuration resolution and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0} is required")]
    MissingCredential(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("vault path does not exist: {0}")]
    VaultPathMissing(String),

    #[error("path error: {0}")]
    Path(String),
}

/// Errors raised while walking the vault and extracting document text.
///
/// Per-file failures are collected by the loader and reported as skips;
/// only walk-level and worker-level failures abort a load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("PDF extraction failed for {path}: {reason}")]
    PdfExtract { path: String, reason: String },

    #[error("directory walk error: {0}")]
    Walk(String),

    #[error("loader worker failed: {0}")]
    Worker(String),
}

/// Errors related to the external embedding model service.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    Connection(String),

    #[error("embedding service error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding request timed out")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Connection(_) | EmbeddingError::Timeout => true,
            // Throttling and server-side failures are transient
            EmbeddingError::Server { status, .. } => *status == 429 || *status >= 500,
            EmbeddingError::Request(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to the managed vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    Connection(String),

    #[error("vector store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication rejected (status {0}): check PINECONE_API_KEY")]
    Auth(u16),

    #[error("vector store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("index '{0}' does not exist")]
    IndexNotFound(String),

    #[error(
        "embedding dimension {actual} does not match index dimension {expected}; \
         refusing to truncate or pad"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "index '{name}' already exists with dimension {existing}, but the configured \
         dimension is {requested} (set dimension_policy = \"reuse\" to accept it)"
    )]
    DimensionConflict {
        name: String,
        existing: usize,
        requested: usize,
    },

    #[error("index '{name}' not ready after {secs}s")]
    ReadyTimeout { name: String, secs: u64 },

    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::Connection(_) => true,
            VectorStoreError::Api { status, .. } => *status == 429 || *status >= 500,
            VectorStoreError::Request(e) => e.is_timeout() || e.is_connect(),
            // Bad credentials and contract violations must fail without
            // burning retry budget.
            VectorStoreError::Auth(_)
            | VectorStoreError::IndexNotFound(_)
            | VectorStoreError::DimensionMismatch { .. }
            | VectorStoreError::DimensionConflict { .. }
            | VectorStoreError::ReadyTimeout { .. }
            | VectorStoreError::InvalidResponse(_) => false,
        }
    }
}

/// Indexing pipeline failures, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load stage failed: {0}")]
    Load(#[from] LoadError),

    #[error("embed stage failed: {0}")]
    Embed(#[from] EmbeddingError),

    #[error("index setup failed: {0}")]
    EnsureIndex(VectorStoreError),

    #[error("upload stage failed: {0}")]
    Upload(#[from] crate::services::UploadFailure),

    #[error("verify stage failed: {0}")]
    Verify(VectorStoreError),
}

/// Errors related to search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}
