//! # ccloud-secret-sync
//!
//! One-shot CI/CD reconciler that converges Confluent Cloud service
//! accounts and API keys with a declarative definitions file, storing the
//! generated credentials in AWS Secrets Manager and maintaining the shared
//! per-cluster REST proxy credential documents.

use anyhow::Result;
use ccloud_secret_sync::cli::{Cli, Commands};
use ccloud_secret_sync::runner::{self, RunOptions};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccloud_secret_sync=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            definitions,
            dry_run,
            skip_api_keys,
            show_orphan_keys,
            plan_out,
        } => {
            let options = RunOptions {
                dry_run,
                skip_api_keys,
                show_orphan_keys,
                plan_out,
            };
            let outcome = runner::run_sync(&cli.config, &definitions, &options).await?;
            if outcome.report.has_failures() {
                for task in outcome.report.failed_tasks() {
                    error!("Failed: {task}");
                }
                std::process::exit(1);
            }
            info!(
                "Run complete: {} task(s), {} REST proxy document(s) written",
                outcome.report.tasks.len(),
                outcome.rest_proxy_documents
            );
        }
        Commands::GenerateDefinitions { output } => {
            runner::run_generate_definitions(&cli.config, &output).await?;
        }
        Commands::OrphanKeys => {
            runner::run_orphan_keys(&cli.config).await?;
        }
    }
    Ok(())
}
