use std::fmt::Write as FmtWrite;

use crate::models::{OutputFormat, SearchResults};
use crate::services::{IndexReport, VectorRecord};

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_index_report(&self, report: &IndexReport) -> String;
    fn format_vectors(&self, requested: usize, vectors: &[VectorRecord]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_healthy: bool,
    pub index_name: String,
    pub store_connected: bool,
    pub index_exists: bool,
    pub index_ready: bool,
    pub dimension: Option<usize>,
    pub metric: Option<String>,
    pub vector_count: Option<u64>,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.hits.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.total, results.duration_ms
        )
        .unwrap();

        for (i, hit) in results.hits.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}] {}", i + 1, hit.score, hit.filename).unwrap();
            writeln!(output, "   Category: {}", hit.category).unwrap();
            writeln!(output, "   ---").unwrap();

            let preview: String = hit.text.chars().take(200).collect();
            let preview = if hit.text.chars().count() > 200 {
                format!("{}...", preview)
            } else {
                preview
            };
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let embedding = if status.embedding_healthy {
            "[UP]"
        } else {
            "[DOWN]"
        };
        writeln!(output, "Embedding:     {}", embedding).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        writeln!(output, "  Model:       {}", status.embedding_model).unwrap();
        writeln!(output).unwrap();

        let store = if status.store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(output, "Vector Store:  {}", store).unwrap();
        let index = if !status.store_connected {
            "[UNKNOWN]"
        } else if !status.index_exists {
            "[MISSING]"
        } else if status.index_ready {
            "[READY]"
        } else {
            "[NOT READY]"
        };
        writeln!(output, "  Index:       {} {}", status.index_name, index).unwrap();
        if let Some(dimension) = status.dimension {
            writeln!(output, "  Dimension:   {}", dimension).unwrap();
        }
        if let Some(ref metric) = status.metric {
            writeln!(output, "  Metric:      {}", metric).unwrap();
        }
        if let Some(count) = status.vector_count {
            writeln!(output, "  Vectors:     {}", count).unwrap();
        }

        output
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        let mut output = String::new();
        writeln!(output, "Indexing Complete").unwrap();
        writeln!(output, "-----------------").unwrap();
        writeln!(output, "Files found:   {}", report.files_found).unwrap();
        writeln!(output, "Files loaded:  {}", report.files_loaded).unwrap();
        writeln!(output, "Files skipped: {}", report.files_skipped).unwrap();
        writeln!(output, "Documents:     {}", report.documents).unwrap();
        writeln!(
            output,
            "Batches:       {}/{}",
            report.successful_batches, report.total_batches
        )
        .unwrap();
        writeln!(output, "Vectors sent:  {}", report.vectors_uploaded).unwrap();
        writeln!(output, "Index vectors: {}", report.index_vector_count).unwrap();
        writeln!(output, "Duration:      {}ms", report.duration_ms).unwrap();
        output
    }

    fn format_vectors(&self, requested: usize, vectors: &[VectorRecord]) -> String {
        let mut output = String::new();
        writeln!(output, "Fetched {} of {} vector(s)", vectors.len(), requested).unwrap();
        for record in vectors {
            writeln!(output, "\n{}", record.id).unwrap();
            writeln!(output, "  Dimension: {}", record.values.len()).unwrap();
            for key in ["filename", "category", "file_type", "chunk_index"] {
                if let Some(value) = record.metadata.get(key) {
                    writeln!(output, "  {}: {}", key, value).unwrap();
                }
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if self.pretty {
            serde_json::to_string_pretty(results)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(results).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "url": status.embedding_url,
                "model": status.embedding_model,
                "healthy": status.embedding_healthy,
            },
            "vector_store": {
                "connected": status.store_connected,
                "index": status.index_name,
                "exists": status.index_exists,
                "ready": status.index_ready,
                "dimension": status.dimension,
                "metric": status.metric,
                "vector_count": status.vector_count,
            }
        });
        self.render(&json)
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        let json = serde_json::to_value(report).unwrap_or_default();
        self.render(&json)
    }

    fn format_vectors(&self, requested: usize, vectors: &[VectorRecord]) -> String {
        let entries: Vec<serde_json::Value> = vectors
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id,
                    "dimension": record.values.len(),
                    "metadata": record.metadata,
                })
            })
            .collect();
        let json = serde_json::json!({
            "requested": requested,
            "fetched": vectors.len(),
            "vectors": entries,
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.hits.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Search Results\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.total, results.duration_ms
        )
        .unwrap();

        for (i, hit) in results.hits.iter().enumerate() {
            writeln!(
                output,
                "### {}. `{}` (score {:.3})\n",
                i + 1,
                hit.filename,
                hit.score
            )
            .unwrap();
            writeln!(output, "**Category:** {}\n", hit.category).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", hit.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let embedding = if status.embedding_healthy {
            "✅"
        } else {
            "❌"
        };
        writeln!(output, "### Embedding {}\n", embedding).unwrap();
        writeln!(output, "- **URL:** `{}`", status.embedding_url).unwrap();
        writeln!(output, "- **Model:** {}", status.embedding_model).unwrap();
        writeln!(output).unwrap();

        let store = if status.store_connected { "✅" } else { "❌" };
        writeln!(output, "### Vector Store {}\n", store).unwrap();
        writeln!(output, "- **Index:** `{}`", status.index_name).unwrap();
        writeln!(output, "- **Exists:** {}", status.index_exists).unwrap();
        writeln!(output, "- **Ready:** {}", status.index_ready).unwrap();
        if let Some(dimension) = status.dimension {
            writeln!(output, "- **Dimension:** {}", dimension).unwrap();
        }
        if let Some(ref metric) = status.metric {
            writeln!(output, "- **Metric:** {}", metric).unwrap();
        }
        if let Some(count) = status.vector_count {
            writeln!(output, "- **Vectors:** {}", count).unwrap();
        }

        output
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Indexing Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Files found | {} |", report.files_found).unwrap();
        writeln!(output, "| Files loaded | {} |", report.files_loaded).unwrap();
        writeln!(output, "| Files skipped | {} |", report.files_skipped).unwrap();
        writeln!(output, "| Documents | {} |", report.documents).unwrap();
        writeln!(
            output,
            "| Batches | {}/{} |",
            report.successful_batches, report.total_batches
        )
        .unwrap();
        writeln!(output, "| Vectors sent | {} |", report.vectors_uploaded).unwrap();
        writeln!(output, "| Index vectors | {} |", report.index_vector_count).unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms).unwrap();
        output
    }

    fn format_vectors(&self, requested: usize, vectors: &[VectorRecord]) -> String {
        let mut output = String::new();
        writeln!(
            output,
            "## Fetched {} of {} vector(s)\n",
            vectors.len(),
            requested
        )
        .unwrap();
        writeln!(output, "| Id | Dimension | Filename | Category |").unwrap();
        writeln!(output, "|----|-----------|----------|----------|").unwrap();
        for record in vectors {
            let field = |key: &str| {
                record
                    .metadata
                    .get(key)
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-")
                    .to_string()
            };
            writeln!(
                output,
                "| `{}` | {} | {} | {} |",
                record.id,
                record.values.len(),
                field("filename"),
                field("category")
            )
            .unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
