use anyhow::bail;
use chrono::{Duration, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DataStore;

#[derive(Subcommand)]
pub enum MaintenanceCommands {
    #[command(about = "Delete old notifications")]
    PruneNotifications {
        #[arg(long, help = "Delete notifications older than this many days")]
        older_than_days: i64,

        #[arg(long, help = "Only delete notifications already read")]
        read_only: bool,
    },

    #[command(about = "Close open campaigns whose deadline has passed")]
    CloseExpiredCampaigns,
}

pub async fn handle(
    cmd: MaintenanceCommands,
    store: &dyn DataStore,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        MaintenanceCommands::PruneNotifications { older_than_days, read_only } => {
            if older_than_days < 1 {
                bail!("--older-than-days must be at least 1");
            }
            let cutoff = Utc::now() - Duration::days(older_than_days);
            let deleted = store.prune_notifications(cutoff, read_only).await?;
            tracing::info!(deleted, %cutoff, read_only, "Pruned notifications");
            output_success(
                output_format,
                &format!(
                    "Deleted {} notifications older than {}",
                    deleted,
                    cutoff.format("%Y-%m-%d")
                ),
                Some(json!({ "deleted": deleted })),
            )
        }
        MaintenanceCommands::CloseExpiredCampaigns => {
            let today = Utc::now().date_naive();
            let closed = store.close_expired_campaigns(today).await?;
            tracing::info!(closed, %today, "Closed expired campaigns");
            output_success(
                output_format,
                &format!("Closed {} campaigns past their deadline", closed),
                Some(json!({ "closed": closed })),
            )
        }
    }
}
