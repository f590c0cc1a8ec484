use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use talos_client::HttpProductFetcher;
use talos_core::checkpoint::CheckpointStore;
use talos_core::config::RunConfig;
use talos_core::plan::WorkPlan;
use talos_core::sink::JsonDirSink;
use talos_core::worker::{TracingWorkerReporter, run_pool};
use talos_db::config::DEFAULT_CHECKPOINT_URL;
use talos_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "talos", version, about = "Checkpointed storefront product scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all domain × product combinations, resuming prior progress
    Run {
        /// CSV file with a `domains` column
        #[arg(long)]
        domains: PathBuf,

        /// CSV file with a `pid` column
        #[arg(long)]
        products: PathBuf,

        /// Directory for the per-unit JSON output files
        #[arg(short, long, default_value = "output")]
        out: PathBuf,

        /// Number of concurrent workers
        #[arg(short, long, default_value_t = 3)]
        workers: usize,

        /// Total fetch attempts per unit before it is marked failed
        #[arg(long, default_value_t = 5)]
        max_retries: u32,

        /// Base retry backoff in milliseconds (doubles per failed attempt)
        #[arg(long, default_value_t = 5000)]
        backoff_base_ms: u64,

        /// Minimum pause between requests from one worker, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,

        /// Checkpoint database URL
        #[arg(long, env = "CHECKPOINT_DATABASE_URL", default_value = DEFAULT_CHECKPOINT_URL)]
        checkpoint_db: String,
    },

    /// Show checkpoint statistics for the current/previous run
    Status {
        /// Checkpoint database URL
        #[arg(long, env = "CHECKPOINT_DATABASE_URL", default_value = DEFAULT_CHECKPOINT_URL)]
        checkpoint_db: String,
    },

    /// Clear all checkpoint records
    Reset {
        /// Checkpoint database URL
        #[arg(long, env = "CHECKPOINT_DATABASE_URL", default_value = DEFAULT_CHECKPOINT_URL)]
        checkpoint_db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("talos_core=info".parse()?)
                .add_directive("talos_client=info".parse()?)
                .add_directive("talos_db=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            domains,
            products,
            out,
            workers,
            max_retries,
            backoff_base_ms,
            delay_ms,
            checkpoint_db,
        } => {
            let config = RunConfig::default()
                .with_worker_count(workers)
                .with_max_retries(max_retries)
                .with_retry_backoff_base(Duration::from_millis(backoff_base_ms))
                .with_inter_request_delay(Duration::from_millis(delay_ms));
            cmd_run(&domains, &products, &out, &config, &checkpoint_db).await?;
        }
        Commands::Status { checkpoint_db } => {
            cmd_status(&checkpoint_db).await?;
        }
        Commands::Reset { checkpoint_db } => {
            cmd_reset(&checkpoint_db).await?;
        }
    }

    Ok(())
}

/// Open the checkpoint database and run migrations.
async fn connect_db(url: &str) -> Result<Database> {
    let config = DatabaseConfig::new(url);
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to open checkpoint database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

/// Read one named column from a CSV file, skipping empty cells.
fn load_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let headers = reader.headers().context("Missing CSV header row")?;
    let index = headers
        .iter()
        .position(|h| h.trim() == column)
        .with_context(|| format!("No '{column}' column in {}", path.display()))?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        if let Some(value) = record.get(index) {
            let value = value.trim();
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

async fn cmd_run(
    domains_path: &Path,
    products_path: &Path,
    out_dir: &Path,
    config: &RunConfig,
    checkpoint_db: &str,
) -> Result<()> {
    let domains = load_column(domains_path, "domains")?;
    let products = load_column(products_path, "pid")?;

    let plan = WorkPlan::new(&domains, &products);
    tracing::info!(
        domains = domains.len(),
        products = products.len(),
        units = plan.len(),
        "Loaded input lists"
    );
    if plan.is_empty() {
        println!("Nothing to do: {} domains x {} products", domains.len(), products.len());
        return Ok(());
    }

    let db = connect_db(checkpoint_db).await?;
    let store = db.checkpoint_repo();

    // A crashed run leaves in_progress rows behind; they are re-attempted.
    let recovered = store.recover_stale().await.map_err(|e| anyhow::anyhow!(e))?;
    if recovered > 0 {
        tracing::info!(recovered, "Re-queued units from an interrupted run");
    }

    let fetcher = HttpProductFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
    let sink = JsonDirSink::new(out_dir).map_err(|e| anyhow::anyhow!(e))?;

    // First Ctrl-C stops claiming new units; in-flight units finish and
    // everything else resumes on the next invocation.
    let cancel_token = CancellationToken::new();
    {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight units");
                cancel_token.cancel();
            }
        });
    }

    let summary = run_pool(
        &plan,
        fetcher,
        store,
        sink,
        config,
        cancel_token,
        Arc::new(TracingWorkerReporter),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e))?;

    println!("\nRun summary:");
    println!("  Done:   {}", summary.done);
    println!("  Failed: {}", summary.failed);
    if !summary.failed_units.is_empty() {
        println!("\nFailed units:");
        for (unit_id, error) in &summary.failed_units {
            println!("  {unit_id}: {}", error.as_deref().unwrap_or("unknown error"));
        }
        println!("\nRe-run the same command to retry only the failures.");
    }
    if summary.store_reset {
        println!("\nAll units reached a terminal state; checkpoint store cleared.");
    } else {
        println!("\nRun interrupted; progress kept. Re-run to resume.");
    }

    Ok(())
}

async fn cmd_status(checkpoint_db: &str) -> Result<()> {
    let db = connect_db(checkpoint_db).await?;
    let store = db.checkpoint_repo();

    let counts = store.status_counts().await.map_err(|e| anyhow::anyhow!(e))?;
    if counts.is_empty() {
        println!("Checkpoint store is empty.");
        return Ok(());
    }

    let total: i64 = counts.iter().map(|(_, n)| n).sum();
    println!("Checkpoint records: {total}");
    for (status, count) in &counts {
        println!("  {status}: {count}");
    }

    let failed = store.failed_records().await.map_err(|e| anyhow::anyhow!(e))?;
    if !failed.is_empty() {
        println!("\nRecent failures:");
        for record in failed.iter().take(5) {
            println!(
                "  {}: {} (attempts: {})",
                record.unit_id,
                record.last_error.as_deref().unwrap_or("unknown error"),
                record.attempt_count,
            );
        }
    }

    Ok(())
}

async fn cmd_reset(checkpoint_db: &str) -> Result<()> {
    let db = connect_db(checkpoint_db).await?;
    let store = db.checkpoint_repo();

    store.reset().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("Checkpoint store cleared.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_column_reads_named_column() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "domains.csv",
            "domains,country\nshop.example.de,DE\nshop.example.fr,FR\n",
        );

        let domains = load_column(&path, "domains").unwrap();
        assert_eq!(domains, vec!["shop.example.de", "shop.example.fr"]);
    }

    #[test]
    fn test_load_column_skips_blank_cells() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(tmp.path(), "products.csv", "pid\n110478\n\n  \n99\n");

        let products = load_column(&path, "pid").unwrap();
        assert_eq!(products, vec!["110478", "99"]);
    }

    #[test]
    fn test_load_column_missing_column_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(tmp.path(), "bad.csv", "url\nhttps://example.com\n");

        let err = load_column(&path, "domains").unwrap_err();
        assert!(err.to_string().contains("domains"));
    }
}
