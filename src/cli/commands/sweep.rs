use serde_json::json;

use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;
use crate::scheduler::{SweepKind, Sweeper};

pub async fn handle(kind: SweepKind, output_format: OutputFormat) -> anyhow::Result<()> {
    let (store, services) = super::services(config::config())?;
    let sweeper = Sweeper::new(store, services.email.clone());

    let report = sweeper.run(kind).await?;
    DatabaseManager::close().await;

    // None only when another run in this process holds the guard.
    let report = report.unwrap_or_default();
    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": true, "data": { "sweep": kind.as_str(), "report": report } })),
        OutputFormat::Text => println!(
            "{} sweep: examined {}, processed {}, failed {}",
            kind.as_str(),
            report.examined,
            report.processed,
            report.failed
        ),
    }
    Ok(())
}
