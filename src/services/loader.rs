//! Vault document loading.
//!
//! Walks the vault directory, extracts text from the files it
//! understands, and fans long documents out into overlapping chunks.
//! File reads run on a bounded pool of blocking workers; a file that
//! cannot be read is recorded and skipped, never aborting the walk.

use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::error::LoadError;
use crate::models::{ChunkInfo, Config, Document, FileType};
use crate::services::chunker::TextChunker;
use crate::utils::file::{detect_file_type, get_relative_path, read_text_lossy};

/// Category assigned to files sitting at the vault root.
pub const DEFAULT_CATEGORY: &str = "note";

/// Counters for one load run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    pub files_found: u64,
    pub files_loaded: u64,
    pub files_skipped: u64,
    pub documents: u64,
}

/// A file that was not loaded, with the reason.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one load run. Documents are sorted by path and chunk
/// index, so repeated runs over the same vault produce the same order.
#[derive(Debug)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub stats: LoadStats,
    pub skipped: Vec<SkippedFile>,
}

/// An indexable file found during discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub file_type: FileType,
}

/// Reads documents out of the vault directory.
pub struct VaultLoader {
    root: PathBuf,
    max_text_length: usize,
    max_file_size: u64,
    index_images: bool,
    exclude_patterns: Vec<String>,
    max_workers: usize,
    chunker: TextChunker,
}

impl VaultLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.vault_root(),
            max_text_length: config.vault.max_text_length,
            max_file_size: config.vault.max_file_size,
            index_images: config.vault.index_images,
            exclude_patterns: config.vault.exclude_patterns.clone(),
            max_workers: config.performance.max_workers.max(1),
            chunker: TextChunker::new(config.vault.chunk_window, config.vault.chunk_overlap),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List indexable files without reading them. Walk entries that
    /// cannot be visited are returned as skips.
    pub fn discover(&self) -> Result<(Vec<DiscoveredFile>, Vec<SkippedFile>), LoadError> {
        let patterns: Vec<Pattern> = self
            .exclude_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        let mut files = Vec::new();
        let mut skipped = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let path_str = path.to_string_lossy();
            if patterns.iter().any(|p| p.matches(&path_str)) {
                continue;
            }

            let Some(file_type) = detect_file_type(&path) else {
                continue;
            };
            if file_type == FileType::Image && !self.index_images {
                continue;
            }

            files.push(DiscoveredFile { path, file_type });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((files, skipped))
    }

    /// Load every indexable file into documents.
    pub async fn load(&self) -> Result<LoadOutcome, LoadError> {
        let (files, mut skipped) = self.discover()?;

        let mut stats = LoadStats {
            files_found: files.len() as u64,
            ..Default::default()
        };
        stats.files_skipped = skipped.len() as u64;

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<(PathBuf, Result<Vec<Document>, LoadError>)> = JoinSet::new();

        for file in files {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| LoadError::Worker("worker pool closed".to_string()))?;
            let root = self.root.clone();
            let chunker = self.chunker;
            let max_text_length = self.max_text_length;
            let max_file_size = self.max_file_size;

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = extract_documents(
                    &file.path,
                    &root,
                    file.file_type,
                    chunker,
                    max_text_length,
                    max_file_size,
                );
                (file.path, result)
            });
        }

        let mut documents = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (path, result) = joined.map_err(|e| LoadError::Worker(e.to_string()))?;
            match result {
                Ok(docs) if docs.is_empty() => {
                    stats.files_skipped += 1;
                    skipped.push(SkippedFile {
                        path,
                        reason: "empty file".to_string(),
                    });
                }
                Ok(docs) => {
                    stats.files_loaded += 1;
                    documents.extend(docs);
                }
                Err(e) => {
                    stats.files_skipped += 1;
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        documents.sort_by(|a, b| {
            a.full_path.cmp(&b.full_path).then_with(|| {
                let ai = a.chunk.map(|c| c.index).unwrap_or(0);
                let bi = b.chunk.map(|c| c.index).unwrap_or(0);
                ai.cmp(&bi)
            })
        });
        stats.documents = documents.len() as u64;

        Ok(LoadOutcome {
            documents,
            stats,
            skipped,
        })
    }
}

/// Extract one file into documents. Runs on a blocking worker.
fn extract_documents(
    path: &Path,
    root: &Path,
    file_type: FileType,
    chunker: TextChunker,
    max_text_length: usize,
    max_file_size: u64,
) -> Result<Vec<Document>, LoadError> {
    let relative = get_relative_path(root, path).ok_or_else(|| LoadError::FileRead {
        path: path.to_string_lossy().into_owned(),
        reason: "outside the vault root".to_string(),
    })?;

    let raw = match file_type {
        FileType::Text => {
            read_text_lossy(path, max_file_size).map_err(|e| LoadError::FileRead {
                path: relative.clone(),
                reason: e.to_string(),
            })?
        }
        FileType::Pdf => extract_pdf(path, &relative, max_file_size)?,
        FileType::Image => format!("Image file: {relative}"),
    };

    let text = raw.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let category = category_for(&relative);
    let full_path = path.to_string_lossy().into_owned();

    if text.chars().count() <= max_text_length {
        return Ok(vec![Document::new(
            text.to_string(),
            &relative,
            full_path,
            category,
            file_type,
        )]);
    }

    let chunks = chunker.split(text);
    let total = chunks.len() as u32;
    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            Document::new(
                chunk.text,
                &relative,
                full_path.clone(),
                category.clone(),
                file_type,
            )
            .with_chunk(ChunkInfo {
                index: index as u32,
                total,
                start: chunk.start,
                end: chunk.end,
            })
        })
        .collect())
}

fn extract_pdf(path: &Path, relative: &str, max_file_size: u64) -> Result<String, LoadError> {
    let metadata = fs::metadata(path).map_err(|e| LoadError::FileRead {
        path: relative.to_string(),
        reason: e.to_string(),
    })?;
    if metadata.len() > max_file_size {
        return Err(LoadError::FileRead {
            path: relative.to_string(),
            reason: format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_file_size
            ),
        });
    }

    let bytes = fs::read(path).map_err(|e| LoadError::FileRead {
        path: relative.to_string(),
        reason: e.to_string(),
    })?;
    let pages =
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| LoadError::PdfExtract {
            path: relative.to_string(),
            reason: e.to_string(),
        })?;
    Ok(pages.join("\n\n"))
}

fn category_for(relative: &str) -> String {
    match relative.split('/').next() {
        Some(first) if first != relative => first.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}
