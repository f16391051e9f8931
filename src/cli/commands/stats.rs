use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;
use crate::database::DataStore;

pub async fn handle(store: &dyn DataStore, output_format: OutputFormat) -> anyhow::Result<()> {
    let stats = store.platform_stats().await?;
    output_fields(
        output_format,
        "stats",
        &[
            ("users", stats.users.to_string()),
            ("experts", stats.experts.to_string()),
            ("organizations", stats.organizations.to_string()),
            ("admins", stats.admins.to_string()),
            ("open_campaigns", stats.open_campaigns.to_string()),
            ("total_campaigns", stats.total_campaigns.to_string()),
            ("pending_proposals", stats.pending_proposals.to_string()),
            ("unread_notifications", stats.unread_notifications.to_string()),
        ],
    )
}
