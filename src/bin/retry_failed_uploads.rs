//! `retry-failed-uploads [--dry-run] [--engine E] [--company S] [--limit N]`.

use std::sync::Arc;

use clap::Parser;
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::domain::models::Engine;
use leadforge_pipeline::lifecycle;
use leadforge_pipeline::retry::{RetryCoordinator, RetryFilter};

#[derive(Parser)]
struct Args {
    /// List what would be retried without writing anything.
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    engine: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() {
    lifecycle::init_logging();
    let args = Args::parse();

    let engine = match args.engine.as_deref().map(str::parse::<Engine>) {
        Some(Ok(e)) => Some(e),
        Some(Err(())) => {
            eprintln!("unknown engine {:?}", args.engine.unwrap());
            std::process::exit(1);
        }
        None => None,
    };

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let backup = Arc::new(BackupStore::new(&config.backup_root));
    let remote = match lifecycle::build_remote_store(&config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to connect to remote store: {e}");
            std::process::exit(1);
        }
    };
    let coordinator = RetryCoordinator::new(backup, remote);

    let filter = RetryFilter {
        engine,
        company_contains: args.company,
        limit: args.limit,
    };

    let outcomes = if args.dry_run {
        coordinator.plan(&filter)
    } else {
        coordinator.run(&filter).await
    };

    match outcomes {
        Ok(outcomes) => {
            let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
            println!("{}", serde_json::to_string_pretty(&outcomes).unwrap());
            if args.dry_run {
                eprintln!("{} record(s) would be retried", outcomes.len());
            } else {
                eprintln!("{}/{} retries succeeded", succeeded, outcomes.len());
                if succeeded < outcomes.len() {
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("retry run failed: {e}");
            std::process::exit(1);
        }
    }
}
