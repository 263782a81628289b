//! End-to-end indexing pipeline.
//!
//! Runs load, embed, ensure-index, upload, and verify in order. Each
//! stage either completes or fails the run with a stage-tagged error;
//! per-file and per-batch problems are absorbed by the load and upload
//! stages and surface in the final report instead.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{EmbeddingError, PipelineError};
use crate::models::{Config, DimensionPolicy};
use crate::services::embedding::{Embedder, EmbeddingClient};
use crate::services::loader::VaultLoader;
use crate::services::uploader::{BatchUploader, UploadFailure};
use crate::services::vector_store::{VectorRecord, VectorStore};

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub files_found: u64,
    pub files_loaded: u64,
    pub files_skipped: u64,
    pub documents: u64,
    pub total_batches: usize,
    pub successful_batches: usize,
    pub vectors_uploaded: usize,
    /// Vector count reported by the store after the run.
    pub index_vector_count: u64,
    pub duration_ms: u64,
}

impl IndexReport {
    pub fn is_empty_run(&self) -> bool {
        self.documents == 0
    }
}

/// Drives a full vault indexing run.
pub struct IndexingPipeline {
    loader: VaultLoader,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: Config,
}

impl IndexingPipeline {
    pub fn new(config: &Config, store: Arc<dyn VectorStore>) -> Result<Self, PipelineError> {
        let embedder = Arc::new(EmbeddingClient::new(config)?);
        Ok(Self::with_parts(config, embedder, store))
    }

    /// Assemble a pipeline from pre-built stages.
    pub fn with_parts(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            loader: VaultLoader::new(config),
            embedder,
            store,
            config: config.clone(),
        }
    }

    pub fn loader(&self) -> &VaultLoader {
        &self.loader
    }

    /// Run the pipeline once. An empty vault is a successful run that
    /// reports zero documents; it never touches the store.
    pub async fn run(&self) -> Result<IndexReport, PipelineError> {
        let started = Instant::now();

        let outcome = self.loader.load().await?;
        let mut report = IndexReport {
            files_found: outcome.stats.files_found,
            files_loaded: outcome.stats.files_loaded,
            files_skipped: outcome.stats.files_skipped,
            documents: outcome.stats.documents,
            ..Default::default()
        };
        if outcome.documents.is_empty() {
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let mut documents = outcome.documents;
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(PipelineError::Embed(EmbeddingError::InvalidResponse(
                format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    embeddings.len()
                ),
            )));
        }
        // Under the reuse policy the existing index's dimension is
        // authoritative and the uploader checks against it instead.
        if self.config.index.dimension_policy == DimensionPolicy::Strict
            && let Some(first) = embeddings.first()
            && first.len() != self.config.index.dimension
        {
            return Err(PipelineError::Embed(EmbeddingError::InvalidResponse(
                format!(
                    "model returned {}-dimensional vectors, configured dimension is {}",
                    first.len(),
                    self.config.index.dimension
                ),
            )));
        }
        for (document, vector) in documents.iter_mut().zip(embeddings) {
            document.embedding = vector;
        }

        let description = self
            .store
            .ensure_index()
            .await
            .map_err(PipelineError::EnsureIndex)?;

        let records: Vec<VectorRecord> = documents.into_iter().map(VectorRecord::from).collect();
        let uploader = BatchUploader::new(self.store.clone(), &self.config, description.dimension);
        let upload = uploader.upload(records).await.map_err(UploadFailure::Fatal)?;

        report.total_batches = upload.total_batches;
        report.successful_batches = upload.successful_batches;
        report.vectors_uploaded = upload.vectors_sent;
        if !upload.is_complete() {
            return Err(UploadFailure::Partial(upload).into());
        }

        let stats = self.store.stats().await.map_err(PipelineError::Verify)?;
        report.index_vector_count = stats.total_vector_count;
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }
}
