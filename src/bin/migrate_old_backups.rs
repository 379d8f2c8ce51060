//! `migrate-old-backups [--dry-run] [--upload-only] [--force]`: rewrites
//! legacy flat-shape backup files into the canonical `BackupRecord` envelope.
//! `--upload-only` additionally attempts the remote upsert for every record
//! left `pending` afterward, so a single run can both fix shape and catch up
//! on uploads a prior crash left behind.

use clap::Parser;
use leadforge_pipeline::backup::migrate::{migrate_engine_dir_with, MigrateOptions};
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::domain::models::Engine;
use leadforge_pipeline::lifecycle;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    upload_only: bool,
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    lifecycle::init_logging();
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let options = MigrateOptions {
        dry_run: args.dry_run,
        force: args.force,
    };

    let mut total_migrated = 0u64;
    let mut total_skipped = 0usize;

    for engine in Engine::ALL {
        let report = match migrate_engine_dir_with(&config.backup_root, engine, options) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("migration of {engine} failed: {e}");
                std::process::exit(1);
            }
        };
        println!(
            "{engine}: scanned={} migrated={} already_canonical={} skipped={}",
            report.scanned,
            report.migrated,
            report.already_canonical,
            report.skipped.len()
        );
        for (path, reason) in &report.skipped {
            eprintln!("  skipped {}: {reason}", path.display());
        }
        total_migrated += report.migrated;
        total_skipped += report.skipped.len();
    }

    if args.upload_only && !args.dry_run {
        let backup = BackupStore::new(&config.backup_root);
        let remote = match lifecycle::build_remote_store(&config).await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("failed to connect to remote store: {e}");
                std::process::exit(1);
            }
        };

        for engine in Engine::ALL {
            let pending = match backup.list_pending(engine) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("failed to list pending {engine}: {e}");
                    std::process::exit(1);
                }
            };
            for (path, record) in pending {
                let natural_key = record.url.clone().unwrap_or_else(|| record.file_id.clone());
                match remote.upsert(engine, &natural_key, &record.data).await {
                    Ok(database_id) => {
                        if let Err(e) = backup.mark_uploaded(&path, &database_id) {
                            eprintln!("failed to mark {} uploaded: {e}", path.display());
                        }
                    }
                    Err(e) => {
                        eprintln!("upload failed for {}: {e}", path.display());
                        let _ = backup.mark_failed(&path, e.to_string());
                    }
                }
            }
        }
    }

    println!("total migrated={total_migrated} skipped={total_skipped}");
    if total_skipped > 0 {
        std::process::exit(1);
    }
}
