//! Batched vector upload with retry and pacing.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::error::VectorStoreError;
use crate::models::Config;
use crate::services::vector_store::{VectorRecord, VectorStore};
use crate::utils::retry::{RetryPolicy, RetryResult, with_retry};

/// Outcome of one upload run.
///
/// Batch failures do not abort the run; later batches are still sent,
/// and the report records exactly which batch indices failed so the
/// operation can be re-run (upserts are idempotent by id).
#[derive(Debug)]
pub struct UploadReport {
    pub total_batches: usize,
    pub successful_batches: usize,
    pub failed_batches: Vec<BatchFailure>,
    /// Vectors contained in the batches that succeeded.
    pub vectors_sent: usize,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed_batches.iter().map(|f| f.batch_index).collect()
    }
}

impl std::fmt::Display for UploadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_complete() {
            write!(
                f,
                "uploaded {}/{} batches ({} vectors)",
                self.successful_batches, self.total_batches, self.vectors_sent
            )
        } else {
            write!(
                f,
                "uploaded {}/{} batches ({} vectors); failed batch indices: {:?}",
                self.successful_batches,
                self.total_batches,
                self.vectors_sent,
                self.failed_indices()
            )
        }
    }
}

/// One batch that exhausted its attempts.
#[derive(Debug)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub attempts: u32,
    pub error: VectorStoreError,
}

/// Why an upload run did not complete.
#[derive(Debug, Error)]
pub enum UploadFailure {
    /// Pre-flight rejection; nothing was sent.
    #[error("{0}")]
    Fatal(#[from] VectorStoreError),

    /// Some batches exhausted their retries.
    #[error("{0}")]
    Partial(UploadReport),
}

/// Sends vectors to the store in fixed-size batches.
///
/// Each batch gets one retry budget of its own; a failing batch never
/// causes an already-acknowledged batch to be resent.
pub struct BatchUploader {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    delay: Duration,
    retry: RetryPolicy,
    /// Dimension of the target index, as reported by `ensure_index`.
    dimension: usize,
}

impl BatchUploader {
    pub fn new(store: Arc<dyn VectorStore>, config: &Config, dimension: usize) -> Self {
        Self {
            store,
            batch_size: config.performance.batch_size.max(1),
            delay: Duration::from_millis(config.performance.upload_delay_ms),
            retry: config.retry_policy(),
            dimension,
        }
    }

    /// Upload all records. Returns `Err` only for pre-flight failures;
    /// per-batch transport failures are collected in the report.
    pub async fn upload(&self, records: Vec<VectorRecord>) -> Result<UploadReport, VectorStoreError> {
        // Refuse mismatched vectors before anything is sent. Truncating
        // or padding would silently corrupt similarity scores.
        for record in &records {
            if record.values.len() != self.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: record.values.len(),
                });
            }
        }

        let total_batches = records.len().div_ceil(self.batch_size.max(1));
        let mut report = UploadReport {
            total_batches,
            successful_batches: 0,
            failed_batches: Vec::new(),
            vectors_sent: 0,
        };

        for (batch_index, chunk) in records.chunks(self.batch_size).enumerate() {
            match with_retry(&self.retry, || self.store.upsert(chunk.to_vec())).await {
                RetryResult::Success(()) => {
                    report.successful_batches += 1;
                    report.vectors_sent += chunk.len();
                }
                RetryResult::Failed {
                    last_error,
                    attempts,
                } => {
                    report.failed_batches.push(BatchFailure {
                        batch_index,
                        attempts,
                        error: last_error,
                    });
                }
            }

            if !self.delay.is_zero() && batch_index + 1 < total_batches {
                sleep(self.delay).await;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::vector_store::testing::MockStore;
    use crate::utils::retry::Retryable;
    use std::sync::atomic::Ordering;

    fn fast_config(batch_size: usize) -> Config {
        let mut config = Config::default();
        config.performance.batch_size = batch_size;
        config.performance.upload_delay_ms = 0;
        config.retry.max_attempts = 3;
        config.retry.base_delay_ms = 1;
        config
    }

    fn records(n: usize, dimension: usize) -> Vec<VectorRecord> {
        (0..n)
            .map(|i| VectorRecord {
                id: format!("r{i}"),
                values: vec![0.5; dimension],
                metadata: Default::default(),
            })
            .collect()
    }

    fn retryable() -> VectorStoreError {
        VectorStoreError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    async fn ready_store(dimension: usize) -> Arc<MockStore> {
        let store = Arc::new(MockStore::new(dimension));
        store.ensure_index().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_upload_partitions_into_batches() {
        let store = ready_store(3).await;
        let uploader = BatchUploader::new(store.clone(), &fast_config(50), 3);

        let report = uploader.upload(records(120, 3)).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.total_batches, 3);
        assert_eq!(report.successful_batches, 3);
        assert_eq!(report.vectors_sent, 120);
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.stored_count(), 120);
    }

    #[tokio::test]
    async fn test_upload_empty_is_a_no_op() {
        let store = ready_store(3).await;
        let uploader = BatchUploader::new(store.clone(), &fast_config(50), 3);

        let report = uploader.upload(Vec::new()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.total_batches, 0);
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_batch_is_retried_alone() {
        let store = ready_store(3).await;
        // Second batch fails twice, then succeeds.
        store.script_upserts([
            Ok(()),
            Err(retryable()),
            Err(retryable()),
            Ok(()),
            Ok(()),
        ]);
        let uploader = BatchUploader::new(store.clone(), &fast_config(2), 3);

        let report = uploader.upload(records(6, 3)).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 5);
        // Batches 0 and 2 are sent exactly once; batch 1 three times.
        let log = store.upsert_log.lock().unwrap().clone();
        assert_eq!(log, vec!["r0", "r2", "r2", "r2", "r4"]);
    }

    #[tokio::test]
    async fn test_exhausted_batch_lands_in_report() {
        let store = ready_store(3).await;
        store.script_upserts([
            Ok(()),
            Err(retryable()),
            Err(retryable()),
            Err(retryable()),
            Ok(()),
        ]);
        let uploader = BatchUploader::new(store.clone(), &fast_config(2), 3);

        let report = uploader.upload(records(6, 3)).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.successful_batches, 2);
        assert_eq!(report.vectors_sent, 4);
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(report.failed_batches[0].attempts, 3);
        // The surviving batches were stored despite the failure.
        assert_eq!(store.stored_ids(), vec!["r0", "r1", "r4", "r5"]);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_uses_one_attempt() {
        let store = ready_store(3).await;
        store.script_upserts([Err(VectorStoreError::Auth(401))]);
        let uploader = BatchUploader::new(store.clone(), &fast_config(2), 3);

        let report = uploader.upload(records(4, 3)).await.unwrap();

        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].attempts, 1);
        assert_eq!(report.successful_batches, 1);
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dimension_guard_rejects_before_any_call() {
        let store = ready_store(3).await;
        let uploader = BatchUploader::new(store.clone(), &fast_config(50), 3);

        let err = uploader.upload(records(5, 4)).await.unwrap_err();

        assert!(!err.is_retryable());
        match err {
            VectorStoreError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_report_display_names_failed_indices() {
        let report = UploadReport {
            total_batches: 4,
            successful_batches: 3,
            failed_batches: vec![BatchFailure {
                batch_index: 2,
                attempts: 3,
                error: retryable(),
            }],
            vectors_sent: 150,
        };
        let text = report.to_string();
        assert!(text.contains("3/4"));
        assert!(text.contains("[2]"));
    }
}
