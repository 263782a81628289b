//! Delete and recreate the index.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::create_store;

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Recreate with this dimension instead of the configured one
    #[arg(long)]
    pub dimension: Option<usize>,
}

pub async fn handle_reset(args: ResetArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(dimension) = args.dimension {
        config.index.dimension = dimension;
    }
    let formatter = get_formatter(format);

    if !args.yes {
        println!(
            "This will delete and recreate index '{}'. All vectors will be lost. Continue? [y/N]",
            config.index.name
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let store = create_store(&config).context("failed to create vector store client")?;

    if verbose {
        eprintln!("Deleting index '{}'...", config.index.name);
    }
    store.delete_index().await.context("failed to delete index")?;

    if verbose {
        eprintln!("Recreating index '{}'...", config.index.name);
    }
    let description = store
        .ensure_index()
        .await
        .context("failed to recreate index")?;

    println!(
        "{}",
        formatter.format_message(&format!(
            "Index '{}' recreated (dimension {}, metric {})",
            description.name, description.dimension, description.metric
        ))
    );
    Ok(())
}
