use std::env;
use std::path::PathBuf;

use msc_receipts::db::{self, DonationStore};
use msc_receipts::import::{import_rows, read_sheet};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "msc_receipts=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(file) = env::args().nth(1).map(PathBuf::from) else {
        anyhow::bail!("Usage: import-donations <path-to-excel-file>");
    };
    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string());

    let pool = db::open(&db_path)?;
    let store = DonationStore::new(pool);

    tracing::info!("Reading {}", file.display());
    let rows = {
        let file = file.clone();
        tokio::task::spawn_blocking(move || read_sheet(&file)).await??
    };
    tracing::info!("Found {} rows to import", rows.len());

    let summary = import_rows(rows, &store).await;
    println!("Import complete!");
    println!("   Imported: {}", summary.imported);
    println!("   Skipped:  {}", summary.skipped);
    Ok(())
}
