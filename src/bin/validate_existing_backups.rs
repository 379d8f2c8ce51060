//! `validate-existing-backups`: walks every backup record and reports
//! any whose `upload_status` disagrees with its directory placement or whose
//! `data` is empty. Exits 1 if any invalid record is found.

use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::domain::models::Engine;
use leadforge_pipeline::lifecycle;

fn main() {
    lifecycle::init_logging();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let store = BackupStore::new(&config.backup_root);
    let mut total = 0usize;
    let mut invalid = Vec::new();

    for engine in Engine::ALL {
        let records = match store.list_all(engine) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("failed to scan {engine}: {e}");
                std::process::exit(1);
            }
        };
        for (path, _) in records {
            total += 1;
            let result = store.validate(&path);
            if !result.valid {
                invalid.push((path, result.reason.unwrap_or_default()));
            }
        }
    }

    for (path, reason) in &invalid {
        println!("INVALID {}: {reason}", path.display());
    }
    eprintln!("{}/{total} record(s) invalid", invalid.len());

    if !invalid.is_empty() {
        std::process::exit(1);
    }
}
