//! Semantic search over the vector index.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

use crate::error::SearchError;
use crate::models::{SearchHit, SearchQuery, SearchResults};
use crate::services::embedding::Embedder;
use crate::services::vector_store::{QueryMatch, VectorStore};

/// Executes natural language queries against the index.
pub struct Searcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Searcher {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed the query and return the best matches. An empty index
    /// yields an empty result, not an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        let started = Instant::now();

        let text = query.query.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query text is empty".to_string(),
            ));
        }

        let vector = self.embedder.embed_query(text).await?;
        let filter = metadata_filter(query.category.as_deref(), query.filter.clone());
        let matches = self.store.query(vector, query.top_k, filter).await?;

        let mut hits: Vec<SearchHit> = matches.into_iter().map(hit_from_match).collect();
        if let Some(min_score) = query.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }

        Ok(SearchResults::new(
            text.to_string(),
            hits,
            started.elapsed().as_millis() as u64,
        ))
    }
}

/// Combine the category restriction with a caller-supplied filter.
/// Both present means both must hold.
fn metadata_filter(category: Option<&str>, extra: Option<Value>) -> Option<Value> {
    let category_filter = category.map(|c| json!({ "category": { "$eq": c } }));
    match (category_filter, extra) {
        (None, None) => None,
        (Some(filter), None) => Some(filter),
        (None, Some(filter)) => Some(filter),
        (Some(category), Some(extra)) => Some(json!({ "$and": [category, extra] })),
    }
}

fn hit_from_match(m: QueryMatch) -> SearchHit {
    let get = |key: &str| {
        m.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    SearchHit {
        filename: get("filename").unwrap_or_else(|| "Unknown".to_string()),
        text: get("text").unwrap_or_default(),
        category: get("category").unwrap_or_else(|| "unknown".to_string()),
        id: m.id,
        score: m.score,
    }
}
