//! Fetch stored vectors by id.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::create_store;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Vector ids to fetch (comma-separated)
    #[arg(long, required = true, value_delimiter = ',')]
    pub ids: Vec<String>,
}

pub async fn handle_fetch(args: FetchArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let ids: Vec<String> = args
        .ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        anyhow::bail!("no vector ids given");
    }

    let store = create_store(&config).context("failed to create vector store client")?;
    let vectors = store.fetch(&ids).await.context("fetch failed")?;

    print!("{}", formatter.format_vectors(ids.len(), &vectors));
    Ok(())
}
