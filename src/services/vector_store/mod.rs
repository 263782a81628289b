//! Vector store abstraction layer.
//!
//! The indexing pipeline and search facade talk to the store through
//! the [`VectorStore`] trait, so tests can substitute an in-memory
//! implementation for the remote backend.

mod pinecone;

pub use pinecone::PineconeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::VectorStoreError;
use crate::models::{Config, DimensionPolicy, Document};

/// Metadata payload stored next to a vector.
pub type Metadata = serde_json::Map<String, Value>;

/// A vector with its id and metadata, as upserted and fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<Document> for VectorRecord {
    fn from(doc: Document) -> Self {
        let id = doc.vector_id();
        let metadata = doc.upsert_metadata();
        Self {
            id,
            values: doc.embedding,
            metadata,
        }
    }
}

/// A scored match returned by a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Shape and readiness of an index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub ready: bool,
}

/// Aggregate index statistics.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: Option<usize>,
    pub index_fullness: f32,
    /// Vector counts per namespace, sorted by name.
    pub namespaces: BTreeMap<String, u64>,
}

/// Abstract trait for vector index operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Describe the index, or `None` if it does not exist.
    async fn describe_index(&self) -> Result<Option<IndexDescription>, VectorStoreError>;

    /// Make sure the index exists and is ready, creating it if needed.
    /// Idempotent: an existing compatible index is adopted without a
    /// create call.
    async fn ensure_index(&self) -> Result<IndexDescription, VectorStoreError>;

    /// Insert or overwrite vectors by id. One call, one attempt;
    /// batching and retry live in the uploader.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError>;

    /// Similarity query, best matches first.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Fetch vectors by id. Unknown ids are silently absent.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorRecord>, VectorStoreError>;

    /// Aggregate statistics for the index.
    async fn stats(&self) -> Result<IndexStats, VectorStoreError>;

    /// Delete the index. Deleting an absent index is not an error.
    async fn delete_index(&self) -> Result<(), VectorStoreError>;

    /// Get the target index name.
    fn index_name(&self) -> &str;
}

/// Create the configured store backend.
pub fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    Ok(Arc::new(PineconeStore::new(config)?))
}

/// What `ensure_index` should do given the current index state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPlan {
    /// No index yet; create one with the configured dimension.
    Create,
    /// A compatible index exists; adopt its dimension.
    Use { dimension: usize },
}

/// Reconcile the configured dimension with an existing index.
///
/// Under the strict policy a dimension disagreement is an error; under
/// the reuse policy the existing dimension wins.
pub fn plan_index(
    existing: Option<&IndexDescription>,
    requested: usize,
    policy: DimensionPolicy,
    name: &str,
) -> Result<IndexPlan, VectorStoreError> {
    match existing {
        None => Ok(IndexPlan::Create),
        Some(desc) if desc.dimension == requested => Ok(IndexPlan::Use {
            dimension: desc.dimension,
        }),
        Some(desc) => match policy {
            DimensionPolicy::Reuse => Ok(IndexPlan::Use {
                dimension: desc.dimension,
            }),
            DimensionPolicy::Strict => Err(VectorStoreError::DimensionConflict {
                name: name.to_string(),
                existing: desc.dimension,
                requested,
            }),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store with scripted failures for pipeline tests.
    pub(crate) struct MockStore {
        name: String,
        configured_dimension: usize,
        policy: DimensionPolicy,
        /// `Some(dim)` when the index exists.
        state: Mutex<Option<usize>>,
        records: Mutex<HashMap<String, VectorRecord>>,
        pub(crate) create_calls: AtomicUsize,
        pub(crate) upsert_calls: AtomicUsize,
        /// First record id of every upsert call, in order.
        pub(crate) upsert_log: Mutex<Vec<String>>,
        /// Scripted outcome per upsert call; unscripted calls succeed.
        upsert_script: Mutex<VecDeque<Result<(), VectorStoreError>>>,
    }

    impl MockStore {
        pub(crate) fn new(dimension: usize) -> Self {
            Self {
                name: "test-index".to_string(),
                configured_dimension: dimension,
                policy: DimensionPolicy::Strict,
                state: Mutex::new(None),
                records: Mutex::new(HashMap::new()),
                create_calls: AtomicUsize::new(0),
                upsert_calls: AtomicUsize::new(0),
                upsert_log: Mutex::new(Vec::new()),
                upsert_script: Mutex::new(VecDeque::new()),
            }
        }

        pub(crate) fn with_existing(mut self, existing_dimension: usize) -> Self {
            self.state = Mutex::new(Some(existing_dimension));
            self
        }

        pub(crate) fn with_policy(mut self, policy: DimensionPolicy) -> Self {
            self.policy = policy;
            self
        }

        pub(crate) fn script_upserts(
            &self,
            outcomes: impl IntoIterator<Item = Result<(), VectorStoreError>>,
        ) {
            self.upsert_script.lock().unwrap().extend(outcomes);
        }

        pub(crate) fn stored_count(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        pub(crate) fn stored_ids(&self) -> Vec<String> {
            let mut ids: Vec<String> = self.records.lock().unwrap().keys().cloned().collect();
            ids.sort();
            ids
        }

        fn description(&self, dimension: usize) -> IndexDescription {
            IndexDescription {
                name: self.name.clone(),
                dimension,
                metric: "cosine".to_string(),
                ready: true,
            }
        }
    }

    #[async_trait]
    impl VectorStore for MockStore {
        async fn describe_index(&self) -> Result<Option<IndexDescription>, VectorStoreError> {
            Ok(self.state.lock().unwrap().map(|dim| self.description(dim)))
        }

        async fn ensure_index(&self) -> Result<IndexDescription, VectorStoreError> {
            let existing = self.describe_index().await?;
            let plan = plan_index(
                existing.as_ref(),
                self.configured_dimension,
                self.policy,
                &self.name,
            )?;
            let dimension = match plan {
                IndexPlan::Create => {
                    self.create_calls.fetch_add(1, Ordering::SeqCst);
                    *self.state.lock().unwrap() = Some(self.configured_dimension);
                    self.configured_dimension
                }
                IndexPlan::Use { dimension } => dimension,
            };
            Ok(self.description(dimension))
        }

        async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(first) = records.first() {
                self.upsert_log.lock().unwrap().push(first.id.clone());
            }

            if let Some(outcome) = self.upsert_script.lock().unwrap().pop_front() {
                outcome?;
            }

            let dimension = self
                .state
                .lock()
                .unwrap()
                .ok_or_else(|| VectorStoreError::IndexNotFound(self.name.clone()))?;
            for record in &records {
                if record.values.len() != dimension {
                    return Err(VectorStoreError::Api {
                        status: 400,
                        message: format!(
                            "vector dimension {} does not match index dimension {}",
                            record.values.len(),
                            dimension
                        ),
                    });
                }
            }

            let mut map = self.records.lock().unwrap();
            for record in records {
                map.insert(record.id.clone(), record);
            }
            Ok(())
        }

        async fn query(
            &self,
            vector: Vec<f32>,
            top_k: u32,
            filter: Option<Value>,
        ) -> Result<Vec<QueryMatch>, VectorStoreError> {
            let records = self.records.lock().unwrap();
            let mut matches: Vec<QueryMatch> = records
                .values()
                .filter(|r| matches_filter(&r.metadata, filter.as_ref()))
                .map(|r| QueryMatch {
                    id: r.id.clone(),
                    score: cosine(&vector, &r.values),
                    metadata: r.metadata.clone(),
                })
                .collect();
            matches.sort_by(|a, b| b.score.total_cmp(&a.score));
            matches.truncate(top_k as usize);
            Ok(matches)
        }

        async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorRecord>, VectorStoreError> {
            let records = self.records.lock().unwrap();
            Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
        }

        async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
            let dimension = self
                .state
                .lock()
                .unwrap()
                .ok_or_else(|| VectorStoreError::IndexNotFound(self.name.clone()))?;
            let count = self.records.lock().unwrap().len() as u64;
            let mut namespaces = BTreeMap::new();
            namespaces.insert(String::new(), count);
            Ok(IndexStats {
                total_vector_count: count,
                dimension: Some(dimension),
                index_fullness: 0.0,
                namespaces,
            })
        }

        async fn delete_index(&self) -> Result<(), VectorStoreError> {
            *self.state.lock().unwrap() = None;
            self.records.lock().unwrap().clear();
            Ok(())
        }

        fn index_name(&self) -> &str {
            &self.name
        }
    }

    /// Metadata filter supporting `{"field": {"$eq": value}}`, the
    /// shorthand `{"field": value}`, and `{"$and": [..]}` conjunction.
    fn matches_filter(metadata: &Metadata, filter: Option<&Value>) -> bool {
        let Some(Value::Object(conditions)) = filter else {
            return true;
        };
        conditions.iter().all(|(field, condition)| {
            if field == "$and" {
                return match condition {
                    Value::Array(parts) => {
                        parts.iter().all(|part| matches_filter(metadata, Some(part)))
                    }
                    _ => false,
                };
            }
            let expected = match condition {
                Value::Object(op) => op.get("$eq").unwrap_or(condition),
                other => other,
            };
            metadata.get(field) == Some(expected)
        })
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        dot / (na * nb)
    }
}
