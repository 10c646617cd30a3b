use anyhow::anyhow;
use serde_json::json;

use crate::app::AppState;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StoreBackend};
use crate::database::open_store;

pub async fn create_super_admin(
    config: AppConfig,
    email: &str,
    password: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("Seeding the in-memory store: the user is gone when this process exits");
    }

    let store = open_store(&config.store).await?;
    let state = AppState::new(config, store)?;
    let created = state
        .users
        .seed_super_admin(email, password)
        .await
        .map_err(|e| anyhow!("{}", e.to_json()))?;

    match (output_format, created) {
        (OutputFormat::Json, Some(user)) => println!("{}", json!({ "created": true, "user": user })),
        (OutputFormat::Json, None) => println!("{}", json!({ "created": false, "email": email })),
        (OutputFormat::Text, Some(user)) => println!("Created super admin {} ({})", user.email, user.id),
        (OutputFormat::Text, None) => println!("A user with email {} already exists", email),
    }
    Ok(())
}
