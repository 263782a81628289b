use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;

use crate::utils::file::calculate_checksum;

/// Character budget for the text preview stored as vector metadata.
pub const METADATA_TEXT_PREVIEW_CHARS: usize = 1000;

/// Serialized metadata must stay under the store-side record limit.
pub const METADATA_BUDGET_BYTES: usize = 40 * 1024;

/// Kind of source file a document was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Text,
    Pdf,
    Image,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Text => write!(f, "text"),
            FileType::Pdf => write!(f, "pdf"),
            FileType::Image => write!(f, "image"),
        }
    }
}

/// Position of a chunk within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: u32,
    pub total: u32,
    /// Character offset of the chunk start in the source text.
    pub start: usize,
    /// Character offset one past the chunk end.
    pub end: usize,
}

/// A unit of indexable text extracted from the vault.
///
/// Short files produce one document; long files produce one document
/// per chunk, all sharing the same path-derived `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the vault-relative path.
    pub id: String,
    pub text: String,
    /// Vault-relative path with the extension stripped.
    pub filename: String,
    pub full_path: String,
    /// Top-level vault folder, or a generic bucket for root files.
    pub category: String,
    pub file_type: FileType,
    /// SHA-256 of `text`.
    pub checksum: String,
    pub chunk: Option<ChunkInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Document {
    /// Derive the document id from the vault-relative path, so
    /// re-indexing the same file overwrites its vectors in place.
    pub fn generate_id(relative_path: &str) -> String {
        use sha2::{Digest, Sha256};
        let input = format!("vault:{relative_path}");
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }

    /// Deterministic per-chunk vector id.
    pub fn chunk_vector_id(document_id: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{document_id}:{chunk_index}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(
        text: String,
        relative_path: &str,
        full_path: String,
        category: String,
        file_type: FileType,
    ) -> Self {
        let id = Self::generate_id(relative_path);
        let checksum = calculate_checksum(&text);
        let filename = Path::new(relative_path)
            .with_extension("")
            .to_string_lossy()
            .into_owned();
        Self {
            id,
            text,
            filename,
            full_path,
            category,
            file_type,
            checksum,
            chunk: None,
            embedding: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_chunk(mut self, chunk: ChunkInfo) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Id under which this document is upserted. Chunked documents get
    /// a UUIDv5 derived from the document id and chunk index.
    pub fn vector_id(&self) -> String {
        match &self.chunk {
            Some(chunk) => Self::chunk_vector_id(&self.id, chunk.index),
            None => self.id.clone(),
        }
    }

    /// Metadata payload stored next to the vector. The text field is a
    /// preview, never the full document, and the whole payload is kept
    /// under `METADATA_BUDGET_BYTES`.
    pub fn upsert_metadata(&self) -> Map<String, Value> {
        let preview: String = self.text.chars().take(METADATA_TEXT_PREVIEW_CHARS).collect();

        let mut map = Map::new();
        map.insert("text".to_string(), json!(preview));
        map.insert("filename".to_string(), json!(self.filename));
        map.insert("category".to_string(), json!(self.category));
        map.insert("file_type".to_string(), json!(self.file_type.to_string()));
        map.insert("text_hash".to_string(), json!(self.checksum));
        map.insert(
            "text_length".to_string(),
            json!(self.text.chars().count() as u64),
        );
        map.insert(
            "indexed_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        if let Some(chunk) = &self.chunk {
            map.insert("chunk_index".to_string(), json!(chunk.index));
            map.insert("chunk_count".to_string(), json!(chunk.total));
        }

        fit_metadata_budget(&mut map);
        map
    }
}

/// Shrink the text preview until the serialized payload fits the
/// store-side metadata limit.
fn fit_metadata_budget(map: &mut Map<String, Value>) {
    loop {
        let size = serde_json::to_vec(map).map(|v| v.len()).unwrap_or(0);
        if size <= METADATA_BUDGET_BYTES {
            return;
        }
        let Some(Value::String(text)) = map.get("text") else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let keep = text.chars().count() / 2;
        let shrunk: String = text.chars().take(keep).collect();
        map.insert("text".to_string(), json!(shrunk));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str) -> Document {
        Document::new(
            text.to_string(),
            "projects/notes.md",
            "/vault/projects/notes.md".to_string(),
            "projects".to_string(),
            FileType::Text,
        )
    }

    #[test]
    fn test_generate_id_is_stable() {
        let a = Document::generate_id("projects/notes.md");
        let b = Document::generate_id("projects/notes.md");
        let c = Document::generate_id("projects/other.md");
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_chunk_vector_id_is_deterministic() {
        let id = Document::chunk_vector_id("abc123", 5);
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|c| *c == '-').count(), 4);
        assert_eq!(id, Document::chunk_vector_id("abc123", 5));
        assert_ne!(id, Document::chunk_vector_id("abc123", 6));
    }

    #[test]
    fn test_vector_id_dispatch() {
        let doc = sample("short text");
        assert_eq!(doc.vector_id(), doc.id);

        let chunked = sample("long text").with_chunk(ChunkInfo {
            index: 2,
            total: 3,
            start: 1600,
            end: 2500,
        });
        assert_eq!(
            chunked.vector_id(),
            Document::chunk_vector_id(&chunked.id, 2)
        );
    }

    #[test]
    fn test_filename_strips_extension() {
        let doc = sample("text");
        assert_eq!(doc.filename, "projects/notes");
    }

    #[test]
    fn test_metadata_text_is_a_preview() {
        let long_text = "x".repeat(5000);
        let doc = sample(&long_text);
        let meta = doc.upsert_metadata();

        let Some(Value::String(preview)) = meta.get("text") else {
            panic!("text metadata missing");
        };
        assert_eq!(preview.chars().count(), METADATA_TEXT_PREVIEW_CHARS);
        assert_eq!(meta["text_length"], json!(5000));
        assert_eq!(meta["filename"], json!("projects/notes"));
        assert_eq!(meta["file_type"], json!("text"));
    }

    #[test]
    fn test_metadata_carries_chunk_position() {
        let doc = sample("text").with_chunk(ChunkInfo {
            index: 1,
            total: 4,
            start: 800,
            end: 1800,
        });
        let meta = doc.upsert_metadata();
        assert_eq!(meta["chunk_index"], json!(1));
        assert_eq!(meta["chunk_count"], json!(4));
    }

    #[test]
    fn test_metadata_budget_shrinks_oversized_payload() {
        let mut map = Map::new();
        map.insert("text".to_string(), json!("y".repeat(100_000)));
        map.insert("filename".to_string(), json!("big"));

        fit_metadata_budget(&mut map);
        let size = serde_json::to_vec(&map).unwrap().len();
        assert!(size <= METADATA_BUDGET_BYTES);
        assert!(!map["text"].as_str().unwrap().is_empty());
    }
}
