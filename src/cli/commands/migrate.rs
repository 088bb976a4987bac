use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    DatabaseManager::migrate().await?;
    DatabaseManager::close().await;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": true, "data": { "migrated": true } })),
        OutputFormat::Text => println!("Migrations applied"),
    }
    Ok(())
}
