//! `backup-stats [--detailed]`: prints `{total, uploaded, pending,
//! failed, success_rate}` overall, and per engine with `--detailed`.

use clap::Parser;
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::domain::models::Engine;
use leadforge_pipeline::lifecycle;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    detailed: bool,
}

fn main() {
    lifecycle::init_logging();
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let store = BackupStore::new(&config.backup_root);

    let overall = match store.stats(None) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to compute stats: {e}");
            std::process::exit(1);
        }
    };

    let mut per_engine = serde_json::Map::new();
    if args.detailed {
        for engine in Engine::ALL {
            match store.stats(Some(engine)) {
                Ok(s) => {
                    per_engine.insert(engine.to_string(), serde_json::to_value(s).unwrap());
                }
                Err(e) => {
                    eprintln!("failed to compute stats for {engine}: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    let mut output = serde_json::json!({ "overall": overall });
    if args.detailed {
        output["by_engine"] = per_engine.into();
    }
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}
