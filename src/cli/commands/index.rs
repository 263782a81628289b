//! Vault indexing command.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{IndexingPipeline, VaultLoader, create_store};

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Vault directory to index (overrides configuration)
    #[arg(long)]
    pub vault: Option<String>,

    /// Target index name (overrides configuration)
    #[arg(long)]
    pub index: Option<String>,

    /// List the files that would be indexed without indexing them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_index(args: IndexArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(vault) = args.vault {
        config.vault.path = vault;
    }
    if let Some(index) = args.index {
        config.index.name = index;
    }
    config.validate().context("invalid configuration")?;

    let formatter = get_formatter(format);
    let loader = VaultLoader::new(&config);

    if verbose {
        eprintln!("Vault: {}", loader.root().display());
        eprintln!("Index: {}", config.index.name);
        eprintln!("Model: {}", config.embedding.model);
    }

    if args.dry_run {
        let (files, skipped) = loader.discover()?;
        if files.is_empty() {
            println!("{}", formatter.format_message("No files found to index."));
            return Ok(());
        }
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: would index {} file(s)", files.len()))
        );
        for file in &files {
            println!("  [{}] {}", file.file_type, file.path.display());
        }
        for skip in &skipped {
            println!("  skipped {}: {}", skip.path.display(), skip.reason);
        }
        return Ok(());
    }

    let store = create_store(&config).context("failed to create vector store client")?;
    let pipeline =
        IndexingPipeline::new(&config, store).context("failed to build indexing pipeline")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Indexing vault into '{}'...", config.index.name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = pipeline.run().await;
    spinner.finish_and_clear();

    let report = result.context("indexing failed")?;
    if report.is_empty_run() {
        println!(
            "{}",
            formatter.format_message("No documents found to index.")
        );
        return Ok(());
    }

    print!("{}", formatter.format_index_report(&report));
    Ok(())
}
