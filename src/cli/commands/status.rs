use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, create_store};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedding_healthy = match EmbeddingClient::new(&config) {
        Ok(client) => client.health().await.is_ok(),
        Err(_) => false,
    };

    let mut store_connected = false;
    let mut description = None;
    let mut vector_count = None;
    if let Ok(store) = create_store(&config)
        && let Ok(desc) = store.describe_index().await
    {
        store_connected = true;
        if desc.is_some() {
            vector_count = store.stats().await.ok().map(|s| s.total_vector_count);
        }
        description = desc;
    }

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_healthy,
        index_name: config.index.name.clone(),
        store_connected,
        index_exists: description.is_some(),
        index_ready: description.as_ref().is_some_and(|d| d.ready),
        dimension: description.as_ref().map(|d| d.dimension),
        metric: description.as_ref().map(|d| d.metric.clone()),
        vector_count,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_healthy || !store_connected {
        eprintln!();
        if !embedding_healthy {
            eprintln!(
                "Hint: embedding service unreachable at {}.",
                config.embedding.url
            );
            eprintln!("      Check that the model server is running.");
        }
        if !store_connected {
            eprintln!("Warning: vector store unreachable. Check PINECONE_API_KEY and network.");
        }
    }

    Ok(())
}
