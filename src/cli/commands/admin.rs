use serde_json::json;

use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(email: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (_, services) = super::services(config::config())?;
    let user = services.auth.promote_to_admin(email).await?;
    DatabaseManager::close().await;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": true, "data": user })),
        OutputFormat::Text => println!("{} is now an ADMIN", user.email),
    }
    Ok(())
}
