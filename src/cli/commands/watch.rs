//! Poll the index vector count at a fixed interval.

use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;

use crate::models::{Config, OutputFormat};
use crate::services::create_store;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds
    #[arg(long, default_value_t = 10)]
    pub interval: u64,
}

pub async fn handle_watch(args: WatchArgs, _format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let store = create_store(&config).context("failed to create vector store client")?;

    // Fail up front if the index is unreachable; later poll errors are
    // transient and only logged.
    let initial = store.stats().await.context("failed to read index stats")?;
    let mut last_count = initial.total_vector_count;

    println!(
        "Watching index '{}' every {}s (Ctrl+C to stop)",
        store.index_name(),
        args.interval.max(1)
    );
    println!("[{}] vectors: {}", timestamp(), last_count);

    loop {
        tokio::time::sleep(Duration::from_secs(args.interval.max(1))).await;

        match store.stats().await {
            Ok(stats) => {
                let count = stats.total_vector_count;
                let delta = count as i64 - last_count as i64;
                if delta == 0 {
                    println!("[{}] vectors: {}", timestamp(), count);
                } else {
                    println!("[{}] vectors: {} ({:+})", timestamp(), count, delta);
                }
                last_count = count;
            }
            Err(e) => {
                eprintln!("[{}] stats error: {}", timestamp(), e);
            }
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
