pub mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::database::{PgStore, Store};

#[derive(Parser)]
#[command(name = "moove")]
#[command(about = "MooveLabs CLI - database and catalog administration")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Postgres connection string (defaults to DATABASE_URL)")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending schema migrations")]
    Migrate,

    #[command(about = "Upsert the default plans and automation templates")]
    Seed,

    #[command(about = "List public plans, cheapest first")]
    Plans,

    #[command(about = "List active automation templates")]
    Templates,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let store = connect(cli.database_url.as_deref()).await?;

    match cli.command {
        Commands::Migrate => commands::database::migrate(&store, output_format).await,
        Commands::Seed => commands::database::seed(Arc::new(store), output_format).await,
        Commands::Plans => commands::catalog::plans(Arc::new(store), output_format).await,
        Commands::Templates => commands::catalog::templates(Arc::new(store), output_format).await,
    }
}

async fn connect(url: Option<&str>) -> anyhow::Result<PgStore> {
    let config = config::config();
    let url = url
        .or(config.database.url.as_deref())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set; pass --database-url or set it in .env"))?;
    let store = PgStore::connect(url, &config.database).await?;
    store.ping().await?;
    Ok(store)
}
