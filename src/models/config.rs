use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::search::OutputFormat;
use crate::error::ConfigError;
use crate::utils::file::expand_tilde;
use crate::utils::retry::RetryPolicy;

pub const DEFAULT_INDEX_NAME: &str = "semantic-search-demo";
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8080";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_VAULT_PATH: &str = "~/Markdown";
pub const DEFAULT_DIMENSION: usize = 384;

/// Resolved application configuration.
///
/// Precedence: explicit CLI arguments > environment variables > config
/// file > built-in defaults. `load` resolves the file and environment
/// layers; commands apply their own argument overrides on top and then
/// call `validate` before building any client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vsearch").join("config.toml"))
    }

    /// Load configuration from the config file (if present) and overlay
    /// environment variables on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str::<Config>(&content)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::Path("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Overlay process environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay environment variables from an arbitrary lookup.
    pub fn apply_env_from(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = get("PINECONE_API_KEY") {
            self.store.api_key = Some(v);
        }
        if let Some(v) = get("PINECONE_CONTROL_URL") {
            self.store.control_url = v;
        }
        if let Some(v) = get("INDEX_NAME") {
            self.index.name = v;
        }
        if let Some(v) = get("DIMENSION") {
            self.index.dimension = parse_env("DIMENSION", &v)?;
        }
        if let Some(v) = get("DIMENSION_POLICY") {
            self.index.dimension_policy = v
                .parse()
                .map_err(|reason| ConfigError::Invalid {
                    field: "DIMENSION_POLICY",
                    reason,
                })?;
        }
        if let Some(v) = get("PINECONE_NAMESPACE") {
            self.index.namespace = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = get("VAULT_PATH") {
            self.vault.path = v;
        }
        if let Some(v) = get("EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = get("BATCH_SIZE") {
            self.performance.batch_size = parse_env("BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_WORKERS") {
            self.performance.max_workers = parse_env("MAX_WORKERS", &v)?;
        }
        Ok(())
    }

    /// Check internal consistency. Must pass before any client is built,
    /// so no partially valid configuration reaches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_api_key()?;

        if self.index.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "index.name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.index.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "index.dimension",
                reason: "must be positive".to_string(),
            });
        }
        if !(1..=100).contains(&self.performance.batch_size) {
            return Err(ConfigError::Invalid {
                field: "performance.batch_size",
                reason: format!(
                    "must be between 1 and 100, got {}",
                    self.performance.batch_size
                ),
            });
        }
        if self.performance.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "performance.max_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.vault.chunk_window == 0 {
            return Err(ConfigError::Invalid {
                field: "vault.chunk_window",
                reason: "must be positive".to_string(),
            });
        }
        if self.vault.chunk_overlap >= self.vault.chunk_window {
            return Err(ConfigError::Invalid {
                field: "vault.chunk_overlap",
                reason: format!(
                    "must be smaller than chunk_window ({} >= {})",
                    self.vault.chunk_overlap, self.vault.chunk_window
                ),
            });
        }
        if self.vault.max_text_length == 0 {
            return Err(ConfigError::Invalid {
                field: "vault.max_text_length",
                reason: "must be positive".to_string(),
            });
        }
        for pattern in &self.vault.exclude_patterns {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::Invalid {
                field: "vault.exclude_patterns",
                reason: format!("bad pattern '{pattern}': {e}"),
            })?;
        }
        if let Some(score) = self.search.default_min_score
            && !(0.0..=1.0).contains(&score)
        {
            return Err(ConfigError::Invalid {
                field: "search.default_min_score",
                reason: format!("must be between 0.0 and 1.0, got {score}"),
            });
        }

        let vault = self.vault_root();
        if !vault.exists() {
            return Err(ConfigError::VaultPathMissing(
                vault.to_string_lossy().into_owned(),
            ));
        }

        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.store.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential("PINECONE_API_KEY")),
        }
    }

    /// Vault path with `~` expanded.
    pub fn vault_root(&self) -> PathBuf {
        expand_tilde(&self.vault.path)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.multiplier,
        }
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| ConfigError::Invalid {
        field: name,
        reason: format!("cannot parse '{value}': {e}"),
    })
}

/// Connection settings for the managed vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// API credential. Usually supplied via `PINECONE_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_control_url")]
    pub control_url: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_control_url() -> String {
    DEFAULT_CONTROL_PLANE_URL.to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            control_url: default_control_url(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Identity and shape of the target index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub metric: Metric,

    #[serde(default = "default_cloud")]
    pub cloud: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub dimension_policy: DimensionPolicy,

    /// How long to wait for a fresh index to become ready.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_ready_timeout() -> u64 {
    300
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            dimension: default_dimension(),
            metric: Metric::default(),
            cloud: default_cloud(),
            region: default_region(),
            namespace: None,
            dimension_policy: DimensionPolicy::default(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

/// Distance metric for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dotproduct,
    Euclidean,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Dotproduct => write!(f, "dotproduct"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "dotproduct" => Ok(Metric::Dotproduct),
            "euclidean" => Ok(Metric::Euclidean),
            _ => Err(format!(
                "unknown metric: {s} (expected cosine, dotproduct, or euclidean)"
            )),
        }
    }
}

/// What to do when the index already exists with a different dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Fail unless the existing dimension matches the configured one.
    #[default]
    Strict,
    /// Adopt the existing index dimension.
    Reuse,
}

impl std::fmt::Display for DimensionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionPolicy::Strict => write!(f, "strict"),
            DimensionPolicy::Reuse => write!(f, "reuse"),
        }
    }
}

impl FromStr for DimensionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(DimensionPolicy::Strict),
            "reuse" => Ok(DimensionPolicy::Reuse),
            _ => Err(format!(
                "unknown dimension policy: {s} (expected strict or reuse)"
            )),
        }
    }
}

/// Where documents come from and how they are split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_path")]
    pub path: String,

    /// Documents longer than this (in characters) are chunked.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_chunk_window")]
    pub chunk_window: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Index image files with a synthetic caption.
    #[serde(default)]
    pub index_images: bool,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_vault_path() -> String {
    DEFAULT_VAULT_PATH.to_string()
}

fn default_max_text_length() -> usize {
    3000
}

fn default_chunk_window() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.obsidian/**".to_string(),
        "**/.trash/**".to_string(),
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            max_text_length: default_max_text_length(),
            chunk_window: default_chunk_window(),
            chunk_overlap: default_chunk_overlap(),
            index_images: false,
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Connection settings for the embedding model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Batch sizing and parallelism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Shared batch size for embedding calls and vector upserts.
    /// Must stay within [1, 100].
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent file-reading workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Pause between consecutive upsert batches.
    #[serde(default = "default_upload_delay")]
    pub upload_delay_ms: u64,
}

fn default_batch_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    4
}

fn default_upload_delay() -> u64 {
    500
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            upload_delay_ms: default_upload_delay(),
        }
    }
}

/// Shared backoff settings for both remote clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_retry_delay() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_retry_delay(),
            multiplier: default_multiplier(),
        }
    }
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub default_min_score: Option<f32>,
}

fn default_top_k() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_format: OutputFormat::Text,
            default_min_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.index.name, DEFAULT_INDEX_NAME);
        assert_eq!(config.index.dimension, DEFAULT_DIMENSION);
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.index.dimension_policy, DimensionPolicy::Strict);
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.performance.batch_size, 50);
        assert_eq!(config.performance.max_workers, 4);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_env_overlay_precedence() {
        let mut env = HashMap::new();
        env.insert("PINECONE_API_KEY", "pk-test");
        env.insert("INDEX_NAME", "notes");
        env.insert("DIMENSION", "768");
        env.insert("DIMENSION_POLICY", "reuse");
        env.insert("BATCH_SIZE", "25");
        env.insert("VAULT_PATH", "/tmp/vault");

        let mut config = Config::default();
        config
            .apply_env_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store.api_key.as_deref(), Some("pk-test"));
        assert_eq!(config.index.name, "notes");
        assert_eq!(config.index.dimension, 768);
        assert_eq!(config.index.dimension_policy, DimensionPolicy::Reuse);
        assert_eq!(config.performance.batch_size, 25);
        assert_eq!(config.vault.path, "/tmp/vault");
    }

    #[test]
    fn test_env_overlay_rejects_garbage() {
        let mut config = Config::default();
        let result = config.apply_env_from(|name| {
            (name == "DIMENSION").then(|| "not-a-number".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "DIMENSION",
                ..
            })
        ));
    }

    fn valid_config(vault: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.store.api_key = Some("pk-test".to_string());
        config.vault.path = vault.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(valid_config(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credential() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.store.api_key = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential("PINECONE_API_KEY"))
        ));

        config.store.api_key = Some("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_batch_size_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());

        config.performance.batch_size = 0;
        assert!(config.validate().is_err());

        config.performance.batch_size = 101;
        assert!(config.validate().is_err());

        config.performance.batch_size = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.index.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_vault() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.vault.path = dir.path().join("does-not-exist").to_string_lossy().into_owned();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::VaultPathMissing(_))
        ));
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.vault.chunk_window = 200;
        config.vault.chunk_overlap = 200;
        assert!(config.validate().is_err());

        config.vault.chunk_overlap = 199;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_metric_and_policy_parsing() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("DOTPRODUCT".parse::<Metric>().unwrap(), Metric::Dotproduct);
        assert!("manhattan".parse::<Metric>().is_err());
        assert_eq!(Metric::Euclidean.to_string(), "euclidean");

        assert_eq!(
            "reuse".parse::<DimensionPolicy>().unwrap(),
            DimensionPolicy::Reuse
        );
        assert!("lenient".parse::<DimensionPolicy>().is_err());
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let mut config = Config::default();
        config.retry.max_attempts = 5;
        config.retry.base_delay_ms = 250;

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_toml_round_trip_keeps_sections() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[index]"));
        assert!(text.contains("[vault]"));
        assert!(text.contains("[performance]"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.index.name, config.index.name);
        assert_eq!(parsed.vault.chunk_window, config.vault.chunk_window);
    }
}
