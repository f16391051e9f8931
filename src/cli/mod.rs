pub mod commands;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::database::{DataStore, DatabaseManager, PgStore};

#[derive(Parser)]
#[command(name = "expert-match-admin")]
#[command(about = "Operator commands for the expert match platform database")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "User accounts and privileges")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UserCommands,
    },

    #[command(about = "Platform counters")]
    Stats,

    #[command(about = "Housekeeping jobs")]
    Maintenance {
        #[command(subcommand)]
        cmd: commands::maintenance::MaintenanceCommands,
    },
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

/// Connect to the platform database the environment points at.
async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn DataStore>> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the platform database")?;
    Ok(Arc::new(PgStore::new(pool)))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();
    let store = connect(&config).await?;

    match cli.command {
        Commands::Users { cmd } => {
            commands::users::handle(cmd, &config, store.as_ref(), output_format).await
        }
        Commands::Stats => commands::stats::handle(store.as_ref(), output_format).await,
        Commands::Maintenance { cmd } => {
            commands::maintenance::handle(cmd, store.as_ref(), output_format).await
        }
    }
}
