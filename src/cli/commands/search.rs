//! Search command, one-shot and interactive.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat, SearchQuery};
use crate::services::{EmbeddingClient, Searcher, create_store};

const INTERACTIVE_MAX_RESULTS: u32 = 20;

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query text
    #[arg(required_unless_present = "interactive")]
    pub query: Option<String>,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub top_k: Option<u32>,

    #[arg(long, short = 'c', help = "Restrict results to one vault category")]
    pub category: Option<String>,

    #[arg(long, help = "Raw metadata filter as JSON")]
    pub filter: Option<String>,

    #[arg(long, help = "Minimum similarity score threshold (0.0-1.0)")]
    pub min_score: Option<f32>,

    #[arg(long, short = 'i', help = "Run an interactive query loop")]
    pub interactive: bool,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let top_k = args.top_k.unwrap_or(config.search.default_top_k);
    if top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }

    let min_score = args.min_score.or(config.search.default_min_score);
    if let Some(score) = min_score
        && !(0.0..=1.0).contains(&score)
    {
        anyhow::bail!("min-score must be between 0.0 and 1.0");
    }

    let filter: Option<Value> = args
        .filter
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("filter must be valid JSON")?;

    let embedder = Arc::new(EmbeddingClient::new(&config)?);
    let store = create_store(&config).context("failed to create vector store client")?;
    let searcher = Searcher::new(embedder, store);

    if args.interactive {
        return run_interactive(
            &searcher,
            formatter.as_ref(),
            top_k,
            args.category,
            filter,
            min_score,
        )
        .await;
    }

    let query = build_query(
        args.query.unwrap_or_default(),
        top_k,
        args.category,
        filter,
        min_score,
    );
    if query.query.trim().is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    if verbose {
        eprintln!("Query: \"{}\"", query.query);
        eprintln!("  Top k: {}", query.top_k);
        if let Some(ref category) = query.category {
            eprintln!("  Category: {category}");
        }
        if let Some(score) = query.min_score {
            eprintln!("  Min score: {score:.3}");
        }
    }

    let results = searcher.search(&query).await.context("search failed")?;
    print!("{}", formatter.format_search_results(&results));
    if format == OutputFormat::Text && !results.hits.is_empty() {
        print_score_guide();
    }

    Ok(())
}

fn build_query(
    text: String,
    top_k: u32,
    category: Option<String>,
    filter: Option<Value>,
    min_score: Option<f32>,
) -> SearchQuery {
    let mut query = SearchQuery::new(text).with_top_k(top_k);
    if let Some(category) = category {
        query = query.with_category(category);
    }
    if let Some(filter) = filter {
        query = query.with_filter(filter);
    }
    if let Some(score) = min_score {
        query = query.with_min_score(score);
    }
    query
}

fn print_score_guide() {
    println!("Score guide: 0.6+ strong match, 0.4-0.6 related, below 0.4 weak");
}

/// Read queries from stdin until EOF or a quit word.
async fn run_interactive(
    searcher: &Searcher,
    formatter: &dyn Formatter,
    default_top_k: u32,
    category: Option<String>,
    filter: Option<Value>,
    min_score: Option<f32>,
) -> Result<()> {
    println!("Interactive search. Type a query, or 'quit' to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("\nquery> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "quit" | "exit" | "q") {
            break;
        }

        print!(
            "results [1-{INTERACTIVE_MAX_RESULTS}, default {default_top_k}]> "
        );
        std::io::stdout().flush()?;
        let mut count_line = String::new();
        stdin.lock().read_line(&mut count_line)?;
        let top_k = count_line
            .trim()
            .parse::<u32>()
            .ok()
            .map(|n| n.clamp(1, INTERACTIVE_MAX_RESULTS))
            .unwrap_or(default_top_k);

        let query = build_query(
            text.to_string(),
            top_k,
            category.clone(),
            filter.clone(),
            min_score,
        );
        match searcher.search(&query).await {
            Ok(results) => {
                print!("{}", formatter.format_search_results(&results));
                if !results.hits.is_empty() {
                    print_score_guide();
                }
            }
            Err(e) => eprint!("{}", formatter.format_error(&e.to_string())),
        }
    }

    println!("Bye.");
    Ok(())
}
