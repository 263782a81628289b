//! Pinecone-style REST backend.
//!
//! Control-plane calls (index lifecycle) go to the configured control
//! URL; data-plane calls (upsert, query, fetch, stats) go to the
//! per-index host returned by the control plane. The host is resolved
//! once and cached for the life of the store.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;

use super::{
    IndexDescription, IndexPlan, IndexStats, Metadata, QueryMatch, VectorRecord, VectorStore,
    plan_index,
};
use crate::error::VectorStoreError;
use crate::models::{Config, DimensionPolicy, Metric};
use crate::utils::retry::{RetryPolicy, Retryable, with_retry};

const API_VERSION: &str = "2024-07";

/// REST client for a serverless vector index.
pub struct PineconeStore {
    http: Client,
    control_url: String,
    name: String,
    dimension: usize,
    metric: Metric,
    cloud: String,
    region: String,
    namespace: Option<String>,
    dimension_policy: DimensionPolicy,
    ready_timeout: Duration,
    retry: RetryPolicy,
    /// Cached data-plane base URL. Cleared when the index is deleted.
    host: RwLock<Option<String>>,
}

impl PineconeStore {
    pub fn new(config: &Config) -> Result<Self, VectorStoreError> {
        let api_key = config
            .store
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VectorStoreError::Connection("PINECONE_API_KEY is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key).map_err(|_| {
            VectorStoreError::Connection("API key contains invalid header characters".to_string())
        })?;
        key_value.set_sensitive(true);
        headers.insert("Api-Key", key_value);
        headers.insert(
            "X-Pinecone-API-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(config.store.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            control_url: config.store.control_url.trim_end_matches('/').to_string(),
            name: config.index.name.clone(),
            dimension: config.index.dimension,
            metric: config.index.metric,
            cloud: config.index.cloud.clone(),
            region: config.index.region.clone(),
            namespace: config.index.namespace.clone(),
            dimension_policy: config.index.dimension_policy,
            ready_timeout: Duration::from_secs(config.index.ready_timeout_secs),
            retry: config.retry_policy(),
            host: RwLock::new(None),
        })
    }

    /// Resolve the data-plane base URL, describing the index on first
    /// use so searches work without a prior `ensure_index`.
    async fn data_url(&self) -> Result<String, VectorStoreError> {
        if let Some(host) = self.host.read().await.clone() {
            return Ok(host);
        }

        let desc = with_retry(&self.retry, || self.describe_raw())
            .await
            .into_result()?
            .ok_or_else(|| VectorStoreError::IndexNotFound(self.name.clone()))?;
        if desc.host.is_empty() {
            return Err(VectorStoreError::InvalidResponse(
                "index description is missing a host".to_string(),
            ));
        }

        let url = data_plane_url(&desc.host);
        *self.host.write().await = Some(url.clone());
        Ok(url)
    }

    async fn describe_raw(&self) -> Result<Option<ApiIndexDescription>, VectorStoreError> {
        let url = format!("{}/indexes/{}", self.control_url, self.name);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        let desc: ApiIndexDescription = response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?;
        Ok(Some(desc))
    }

    async fn create_index(&self) -> Result<(), VectorStoreError> {
        let url = format!("{}/indexes", self.control_url);
        let body = CreateIndexRequest {
            name: &self.name,
            dimension: self.dimension,
            metric: self.metric.to_string(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        let response = self.http.post(&url).json(&body).send().await?;
        // Someone else created it between describe and create.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    /// Poll until the index reports ready and has a host, reusing the
    /// retry policy's backoff curve for poll spacing.
    async fn wait_until_ready(&self) -> Result<ApiIndexDescription, VectorStoreError> {
        let deadline = Instant::now() + self.ready_timeout;
        let mut attempt: u32 = 1;

        loop {
            match self.describe_raw().await {
                Ok(Some(desc)) if desc.status.ready && !desc.host.is_empty() => return Ok(desc),
                Ok(_) => {}
                Err(e) if e.is_retryable() => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(VectorStoreError::ReadyTimeout {
                    name: self.name.clone(),
                    secs: self.ready_timeout.as_secs(),
                });
            }

            sleep(self.retry.delay_for(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn query_once(
        &self,
        url: &str,
        request: &QueryRequest<'_>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let response = self.http.post(url).json(request).send().await?;
        let response = check(response).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchResponse, VectorStoreError> {
        let response = self.http.get(url).send().await?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))
    }

    async fn stats_once(&self, url: &str) -> Result<StatsResponse, VectorStoreError> {
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn describe_index(&self) -> Result<Option<IndexDescription>, VectorStoreError> {
        let raw = with_retry(&self.retry, || self.describe_raw())
            .await
            .into_result()?;
        Ok(raw.map(|d| d.into_description()))
    }

    async fn ensure_index(&self) -> Result<IndexDescription, VectorStoreError> {
        let existing = with_retry(&self.retry, || self.describe_raw())
            .await
            .into_result()?;
        let existing_desc = existing.as_ref().map(|d| d.clone().into_description());
        let plan = plan_index(
            existing_desc.as_ref(),
            self.dimension,
            self.dimension_policy,
            &self.name,
        )?;

        let raw = match (plan, existing) {
            (IndexPlan::Create, _) => {
                with_retry(&self.retry, || self.create_index())
                    .await
                    .into_result()?;
                self.wait_until_ready().await?
            }
            (IndexPlan::Use { .. }, Some(desc)) if desc.status.ready && !desc.host.is_empty() => {
                desc
            }
            // Exists but still initializing
            (IndexPlan::Use { .. }, _) => self.wait_until_ready().await?,
        };

        *self.host.write().await = Some(data_plane_url(&raw.host));
        Ok(raw.into_description())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let sent = records.len() as u64;
        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let body = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let response = check(response).await?;
        let parsed: UpsertResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?;

        if parsed.upserted_count != sent {
            return Err(VectorStoreError::InvalidResponse(format!(
                "upserted {} of {} vectors",
                parsed.upserted_count, sent
            )));
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let url = format!("{}/query", self.data_url().await?);
        let request = QueryRequest {
            vector: &vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter: filter.as_ref(),
            namespace: self.namespace.as_deref(),
        };

        with_retry(&self.retry, || self.query_once(&url, &request))
            .await
            .into_result()
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorRecord>, VectorStoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        if let Some(ns) = self.namespace.as_deref() {
            params.push(("namespace", ns));
        }
        let base = format!("{}/vectors/fetch", self.data_url().await?);
        let url = reqwest::Url::parse_with_params(&base, &params)
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?;

        let parsed = with_retry(&self.retry, || self.fetch_once(url.as_str()))
            .await
            .into_result()?;

        // Preserve request order; unknown ids are simply absent.
        let mut vectors = parsed.vectors;
        Ok(ids.iter().filter_map(|id| vectors.remove(id)).collect())
    }

    async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
        let url = format!("{}/describe_index_stats", self.data_url().await?);
        let parsed = with_retry(&self.retry, || self.stats_once(&url))
            .await
            .into_result()?;

        Ok(IndexStats {
            total_vector_count: parsed.total_vector_count,
            dimension: parsed.dimension,
            index_fullness: parsed.index_fullness,
            namespaces: parsed
                .namespaces
                .into_iter()
                .map(|(name, ns)| (name, ns.vector_count))
                .collect(),
        })
    }

    async fn delete_index(&self) -> Result<(), VectorStoreError> {
        let url = format!("{}/indexes/{}", self.control_url, self.name);
        let response = self.http.delete(&url).send().await?;
        // Already gone is fine.
        if response.status() != StatusCode::NOT_FOUND {
            check(response).await?;
        }
        *self.host.write().await = None;
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.name
    }
}

/// Map non-success statuses onto the error taxonomy. Auth failures get
/// their own variant so they are never retried.
async fn check(response: Response) -> Result<Response, VectorStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(VectorStoreError::Auth(status.as_u16()));
    }
    let message = response.text().await.unwrap_or_default();
    Err(VectorStoreError::Api {
        status: status.as_u16(),
        message,
    })
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: String,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiIndexDescription {
    name: String,
    dimension: usize,
    #[serde(default)]
    metric: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: ApiIndexStatus,
}

impl ApiIndexDescription {
    fn into_description(self) -> IndexDescription {
        IndexDescription {
            name: self.name,
            dimension: self.dimension,
            metric: self.metric,
            ready: self.status.ready,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiIndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    #[allow(dead_code)]
    state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    vectors: Vec<VectorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, VectorRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    index_fullness: f32,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_config() -> Config {
        let mut config = Config::default();
        config.store.api_key = Some("pk-test".to_string());
        config
    }

    #[test]
    fn test_store_requires_api_key() {
        let config = Config::default();
        assert!(PineconeStore::new(&config).is_err());
        assert!(PineconeStore::new(&store_config()).is_ok());
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let vector = vec![0.1_f32, 0.2];
        let filter = json!({"category": {"$eq": "projects"}});
        let request = QueryRequest {
            vector: &vector,
            top_k: 5,
            include_metadata: true,
            include_values: false,
            filter: Some(&filter),
            namespace: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 5);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["includeValues"], false);
        assert_eq!(value["filter"]["category"]["$eq"], "projects");
        assert!(value.get("namespace").is_none());
    }

    #[test]
    fn test_create_request_shape() {
        let body = CreateIndexRequest {
            name: "semantic-search-demo",
            dimension: 384,
            metric: Metric::Cosine.to_string(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: "us-west-2",
                },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["name"], "semantic-search-demo");
        assert_eq!(value["dimension"], 384);
        assert_eq!(value["metric"], "cosine");
        assert_eq!(value["spec"]["serverless"]["cloud"], "aws");
        assert_eq!(value["spec"]["serverless"]["region"], "us-west-2");
    }

    #[test]
    fn test_describe_response_parsing() {
        let body = json!({
            "name": "semantic-search-demo",
            "dimension": 384,
            "metric": "cosine",
            "host": "semantic-search-demo-abc123.svc.aped-4627-b74a.pinecone.io",
            "spec": {"serverless": {"cloud": "aws", "region": "us-west-2"}},
            "status": {"ready": true, "state": "Ready"}
        });
        let desc: ApiIndexDescription = serde_json::from_value(body).unwrap();
        assert!(desc.status.ready);
        assert_eq!(desc.dimension, 384);

        let desc = desc.into_description();
        assert_eq!(desc.name, "semantic-search-demo");
        assert!(desc.ready);
    }

    #[test]
    fn test_stats_response_parsing() {
        let body = json!({
            "namespaces": {"": {"vectorCount": 120}, "drafts": {"vectorCount": 7}},
            "dimension": 384,
            "indexFullness": 0.01,
            "totalVectorCount": 127
        });
        let parsed: StatsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.total_vector_count, 127);
        assert_eq!(parsed.namespaces["drafts"].vector_count, 7);
        assert_eq!(parsed.dimension, Some(384));
    }

    #[test]
    fn test_upsert_response_count_field() {
        let parsed: UpsertResponse = serde_json::from_str(r#"{"upsertedCount": 50}"#).unwrap();
        assert_eq!(parsed.upserted_count, 50);
    }

    #[test]
    fn test_data_plane_url_normalization() {
        assert_eq!(
            data_plane_url("index-abc.svc.pinecone.io"),
            "https://index-abc.svc.pinecone.io"
        );
        assert_eq!(
            data_plane_url("http://localhost:5080/"),
            "http://localhost:5080"
        );
    }
}
