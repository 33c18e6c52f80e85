//! # Run Orchestration
//!
//! Wires one invocation end to end: load and cross-validate the YAML inputs,
//! snapshot both backing systems, plan, optionally stop at the printed plan
//! (dry run), execute, and finish with the shared REST proxy document pass.
//! Everything here is request-scoped; nothing survives the process.

use crate::ccloud::{CCloudClient, DirectoryCache};
use crate::config::{AppConfig, Definitions, SecretStoreConfig, SUPPORTED_STORES};
use crate::error::SyncError;
use crate::exec::{Executor, RunReport};
use crate::orphans::{self, OrphanKey};
use crate::plan::{Plan, Planner};
use crate::restproxy::sync_rest_proxy_secrets;
use crate::scaffold;
use crate::store::{AwsSecretStore, SecretCache, SecretStore};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default)]
pub struct RunOptions {
    /// Print the plan without executing any task.
    pub dry_run: bool,
    /// Reconcile service accounts only; drop API key and secret tasks.
    pub skip_api_keys: bool,
    /// Also print API keys that no stored secret references.
    pub show_orphan_keys: bool,
    /// Also write the plan as JSON to this path.
    pub plan_out: Option<PathBuf>,
}

/// What one reconciliation run did.
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: RunReport,
    /// Shared REST proxy documents written in the final pass.
    pub rest_proxy_documents: usize,
}

async fn build_store(config: &SecretStoreConfig) -> Result<Box<dyn SecretStore>> {
    if !config.enabled {
        return Err(SyncError::config(
            "secret_store.enabled is false; nothing to reconcile against",
        )
        .into());
    }
    match config.store_type.as_str() {
        "aws-secretsmanager" => Ok(Box::new(
            AwsSecretStore::new(config.region.as_deref()).await?,
        )),
        other => Err(SyncError::UnsupportedStore(
            other.to_string(),
            SUPPORTED_STORES.join(","),
        )
        .into()),
    }
}

fn write_plan_file(plan: &Plan, path: &Path) -> Result<()> {
    let tasks: Vec<_> = plan.all_tasks().collect();
    let json = serde_json::to_string_pretty(&tasks)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write plan file: {}", path.display()))?;
    info!("Plan written to {}", path.display());
    Ok(())
}

fn print_orphans(found: &[OrphanKey]) {
    if found.is_empty() {
        println!("No deletion eligible keys detected.");
    } else {
        print!("{}", orphans::render_table(found));
    }
}

fn print_plan(plan: &Plan) {
    println!("Planned {} task(s):", plan.len());
    for task in plan.all_tasks() {
        println!("{task}");
    }
}

/// Run the full reconciliation.
pub async fn run_sync(
    config_path: &Path,
    definitions_path: &Path,
    options: &RunOptions,
) -> Result<SyncOutcome> {
    let config = AppConfig::load(config_path)?;
    let definitions = Definitions::load(definitions_path)?;
    config.validate_against_definitions(&definitions)?;
    let ccloud_config = &config.configs.ccloud;
    let store_config = &config.configs.secret_store;

    let client = CCloudClient::new(&ccloud_config.api_key, &ccloud_config.api_secret)?;
    let mut directory_cache = DirectoryCache::build(
        &client,
        &ccloud_config.ignore_service_account_ids,
        ccloud_config.detect_internal_accounts,
    )
    .await?;

    let store = build_store(store_config).await?;
    let mut secret_cache = SecretCache::build(store.as_ref()).await?;

    if options.show_orphan_keys {
        // Computed against the initial snapshot, before any task runs.
        print_orphans(&orphans::find_orphan_keys(&directory_cache, &secret_cache));
    }

    let mut plan =
        Planner::new(&definitions, ccloud_config, &directory_cache, &secret_cache).plan()?;
    if options.skip_api_keys {
        info!("--skip-api-keys: dropping API key and secret tasks from the plan");
        plan.api_key_creates.clear();
        plan.api_key_deletes.clear();
        plan.secret_creates.clear();
        plan.secret_updates.clear();
    }
    if let Some(path) = &options.plan_out {
        write_plan_file(&plan, path)?;
    }
    print_plan(&plan);

    if options.dry_run {
        info!("Dry run requested; no task was executed");
        return Ok(SyncOutcome {
            report: RunReport {
                tasks: plan.all_tasks().cloned().collect(),
                secrets_changed: false,
            },
            rest_proxy_documents: 0,
        });
    }

    let executor = Executor::new(
        &client,
        store.as_ref(),
        &mut directory_cache,
        &mut secret_cache,
        store_config,
    );
    let report = executor.execute(plan).await;

    let rest_proxy_documents = if report.secrets_changed {
        sync_rest_proxy_secrets(
            &definitions,
            ccloud_config,
            store_config,
            &directory_cache,
            &mut secret_cache,
            store.as_ref(),
        )
        .await?
    } else {
        info!("No secret was written; skipping the REST proxy document pass");
        0
    };

    for task in &report.tasks {
        println!("{task}");
    }
    Ok(SyncOutcome {
        report,
        rest_proxy_documents,
    })
}

/// Scaffold a definitions file from the observed service accounts.
pub async fn run_generate_definitions(config_path: &Path, output_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let ccloud_config = &config.configs.ccloud;
    let client = CCloudClient::new(&ccloud_config.api_key, &ccloud_config.api_secret)?;
    let directory_cache = DirectoryCache::build(
        &client,
        &ccloud_config.ignore_service_account_ids,
        ccloud_config.detect_internal_accounts,
    )
    .await?;
    scaffold::write_definitions_file(&directory_cache, output_path)
}

/// List API keys present in the cloud but absent from the secret store.
pub async fn run_orphan_keys(config_path: &Path) -> Result<Vec<OrphanKey>> {
    let config = AppConfig::load(config_path)?;
    let ccloud_config = &config.configs.ccloud;
    let client = CCloudClient::new(&ccloud_config.api_key, &ccloud_config.api_secret)?;
    let directory_cache = DirectoryCache::build(
        &client,
        &ccloud_config.ignore_service_account_ids,
        ccloud_config.detect_internal_accounts,
    )
    .await?;
    let store = build_store(&config.configs.secret_store).await?;
    let secret_cache = SecretCache::build(store.as_ref()).await?;

    let found = orphans::find_orphan_keys(&directory_cache, &secret_cache);
    print_orphans(&found);
    Ok(found)
}
