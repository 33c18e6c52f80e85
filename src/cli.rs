//! # Command-Line Interface
//!
//! ```bash
//! # Full reconciliation
//! ccloud-secret-sync --config config.yaml sync --definitions definitions.yaml
//!
//! # Show what would change without touching anything
//! ccloud-secret-sync --config config.yaml sync --definitions definitions.yaml --dry-run
//!
//! # Bootstrap a definitions file from the live estate
//! ccloud-secret-sync --config config.yaml generate-definitions --output definitions.yaml
//!
//! # List API keys the secret store knows nothing about
//! ccloud-secret-sync --config config.yaml orphan-keys
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reconcile Confluent Cloud service accounts, API keys and their secrets
/// into the configured secret store.
#[derive(Debug, Parser)]
#[command(name = "ccloud-secret-sync", version, about)]
pub struct Cli {
    /// Path to the connection/settings YAML file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the reconciliation: diff desired definitions against the observed
    /// estate and apply the resulting tasks in order
    Sync {
        /// Path to the desired-state definitions YAML file
        #[arg(short, long)]
        definitions: PathBuf,

        /// Print the task plan without executing anything
        #[arg(long)]
        dry_run: bool,

        /// Reconcile service accounts only; skip API key and secret tasks
        #[arg(long)]
        skip_api_keys: bool,

        /// Also print API keys that no stored secret references
        #[arg(long)]
        show_orphan_keys: bool,

        /// Also write the task plan as JSON to this path
        #[arg(long, value_name = "PATH")]
        plan_out: Option<PathBuf>,
    },
    /// Generate a definitions file from the observed service accounts
    GenerateDefinitions {
        /// Where to write the generated YAML
        #[arg(short, long, default_value = "definitions.yaml")]
        output: PathBuf,
    },
    /// List API keys that exist in the cloud but are absent from the secret
    /// store
    OrphanKeys,
}
