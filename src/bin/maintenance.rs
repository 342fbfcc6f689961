use std::env;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use pdf_ingest::{config::AppConfig, db, service::PdfStore, storage::Storage};

const USAGE: &str = "Usage: maintenance <purge-orphans|queue-depth>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("purge-orphans") => purge_orphans().await?,
        Some("queue-depth") => queue_depth().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<PdfStore> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    Ok(PdfStore::new(Storage::new(pool, config.operation_timeout)))
}

async fn purge_orphans() -> Result<()> {
    let store = connect()?;
    let removed = store.purge_orphaned_files().await?;
    if removed == 0 {
        println!("No orphaned files found.");
    } else {
        println!("Removed {removed} orphaned queued files.");
    }
    Ok(())
}

async fn queue_depth() -> Result<()> {
    let store = connect()?;
    let depth = store.queue_depth().await?;
    println!("{depth} files waiting for the parser.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
