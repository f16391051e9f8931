use anyhow::{anyhow, bail, Context};
use clap::Subcommand;
use serde_json::json;

use crate::auth::HostedAuth;
use crate::cli::utils::{output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::{NewAdminLog, NewProfile, Page, PrivilegeUpdate, Profile};
use crate::database::DataStore;
use crate::types::Role;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List users, newest first")]
    List {
        #[arg(long, default_value_t = 50, help = "Maximum rows to show")]
        limit: i64,
    },

    #[command(about = "Show one user")]
    Show {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Give a user admin access")]
    GrantAdmin {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Remove a user's admin access")]
    RevokeAdmin {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Create a confirmed account and its profile")]
    Create {
        #[arg(help = "Account email")]
        email: String,

        #[arg(long, help = "Initial password")]
        password: String,

        #[arg(long, default_value = "expert", help = "expert, organization or admin")]
        role: Role,

        #[arg(long, help = "Display name")]
        full_name: Option<String>,
    },
}

pub async fn handle(
    cmd: UserCommands,
    config: &AppConfig,
    store: &dyn DataStore,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        UserCommands::List { limit } => {
            let users = store.list_profiles(Page::new(limit, 0)).await?;
            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
                }
                OutputFormat::Text => {
                    println!(
                        "{:<38} {:<32} {:<13} {:<6} {}",
                        "ID", "EMAIL", "ROLE", "ADMIN", "JOINED"
                    );
                    println!("{}", "-".repeat(100));
                    for user in &users {
                        println!(
                            "{:<38} {:<32} {:<13} {:<6} {}",
                            user.id,
                            user.email,
                            user.role,
                            if user.is_admin { "yes" } else { "no" },
                            user.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
        UserCommands::Show { email } => {
            let user = find_user(store, &email).await?;
            output_fields(output_format, "user", &profile_fields(&user))
        }
        UserCommands::GrantAdmin { email } => {
            let user = set_admin(store, &email, true).await?;
            output_success(
                output_format,
                &format!("{} is now an admin", user.email),
                Some(json!({ "user": user })),
            )
        }
        UserCommands::RevokeAdmin { email } => {
            let user = set_admin(store, &email, false).await?;
            output_success(
                output_format,
                &format!("{} is no longer an admin", user.email),
                Some(json!({ "user": user })),
            )
        }
        UserCommands::Create { email, password, role, full_name } => {
            let auth = HostedAuth::from_config(&config.backend)
                .context("hosted auth is not configured")?;
            let identity = auth.admin_create_user(&email, &password).await?;
            let profile = store
                .create_profile(&NewProfile {
                    id: identity.id,
                    email: identity.email.unwrap_or(email),
                    full_name,
                    role,
                    is_admin: role == Role::Admin,
                })
                .await?;
            output_success(
                output_format,
                &format!("Created {} ({})", profile.email, profile.role),
                Some(json!({ "user": profile })),
            )
        }
    }
}

async fn find_user(store: &dyn DataStore, email: &str) -> anyhow::Result<Profile> {
    store
        .find_profile_by_email(email)
        .await?
        .ok_or_else(|| anyhow!("no user with email '{}'", email))
}

/// Flip the admin flag and leave an audit entry with no acting admin.
pub async fn set_admin(
    store: &dyn DataStore,
    email: &str,
    is_admin: bool,
) -> anyhow::Result<Profile> {
    let user = find_user(store, email).await?;
    if user.is_admin == is_admin {
        bail!("{} already has admin = {}", user.email, is_admin);
    }

    let update = PrivilegeUpdate { role: None, is_admin: Some(is_admin) };
    let updated = store.update_privileges(user.id, &update).await?;
    store
        .record_admin_action(&NewAdminLog {
            admin_id: None,
            action: if is_admin { "cli_grant_admin" } else { "cli_revoke_admin" }.to_string(),
            target_type: "profile".to_string(),
            target_id: Some(user.id),
            details: json!({ "email": updated.email, "is_admin": is_admin }),
        })
        .await?;

    tracing::info!(
        target: "audit",
        user_id = %user.id,
        is_admin,
        "Admin flag changed from the CLI"
    );
    Ok(updated)
}

fn profile_fields(user: &Profile) -> Vec<(&'static str, String)> {
    vec![
        ("id", user.id.to_string()),
        ("email", user.email.clone()),
        ("full_name", user.full_name.clone().unwrap_or_default()),
        ("role", user.role.to_string()),
        ("is_admin", user.is_admin.to_string()),
        ("created_at", user.created_at.to_rfc3339()),
    ]
}
