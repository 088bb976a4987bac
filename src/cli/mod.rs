pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::scheduler::SweepKind;

#[derive(Parser)]
#[command(name = "cleanbook-api")]
#[command(about = "CleanBook API - multi-tenant backend for cleaning businesses")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server and background sweeps (default)")]
    Serve,

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,

    #[command(about = "Run one background sweep immediately and exit")]
    Sweep {
        #[arg(value_enum, help = "Which sweep to run")]
        kind: SweepKind,
    },

    #[command(about = "Grant the ADMIN role to an existing account")]
    CreateAdmin {
        #[arg(long, help = "Email address of the account to promote")]
        email: String,
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

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::handle().await,
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Sweep { kind } => commands::sweep::handle(kind, output_format).await,
        Commands::CreateAdmin { email } => commands::admin::handle(&email, output_format).await,
    }
}
