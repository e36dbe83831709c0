use std::sync::Arc;

use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::{seed_catalog, PgStore, Store};

pub async fn migrate(store: &PgStore, output_format: OutputFormat) -> anyhow::Result<()> {
    store.migrate().await?;
    match output_format {
        OutputFormat::Json => println!("{}", json!({ "migrated": true })),
        OutputFormat::Text => println!("Migrations applied"),
    }
    Ok(())
}

pub async fn seed(store: Arc<dyn Store>, output_format: OutputFormat) -> anyhow::Result<()> {
    let report = seed_catalog(store).await?;
    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "plans": report.plans, "templates": report.templates }))?
        ),
        OutputFormat::Text => println!("Seeded {} plans and {} templates", report.plans, report.templates),
    }
    Ok(())
}
