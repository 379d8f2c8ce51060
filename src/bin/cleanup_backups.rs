//! `cleanup-backups --days N [--dry-run]`: deletes only `uploaded`
//! records older than N days; `pending` and `failed` records are never touched.

use clap::Parser;
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::lifecycle;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    days: i64,
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    lifecycle::init_logging();
    let args = Args::parse();

    if args.days < 0 {
        eprintln!("--days must be non-negative");
        std::process::exit(1);
    }

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let store = BackupStore::new(&config.backup_root);
    let removed = match store.cleanup_uploaded(None, chrono::Duration::days(args.days), args.dry_run) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("cleanup failed: {e}");
            std::process::exit(1);
        }
    };

    for path in &removed {
        println!("{}{}", if args.dry_run { "would remove " } else { "removed " }, path.display());
    }
    eprintln!("{} record(s) {}", removed.len(), if args.dry_run { "eligible for removal" } else { "removed" });
}
