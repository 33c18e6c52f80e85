//! # Configuration Loading
//!
//! Parses the two YAML inputs: the connection/settings file (Confluent Cloud
//! credentials plus secret store selection) and the desired-state definitions
//! file. String values in either file may use `env::NAME` indirection, which
//! is resolved from the process environment before deserialization so that
//! credentials never need to live in the file itself.

use crate::error::SyncError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

pub mod definitions;

pub use definitions::{ClusterScope, Definitions, ServiceAccountDefinition};

/// Prefix marking a value that must be read from the environment.
const ENV_PREFIX: &str = "env::";

/// Secret store types with a backend implementation.
pub const SUPPORTED_STORES: &[&str] = &["aws-secretsmanager"];

/// Top-level shape of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub configs: ConfigSections,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSections {
    #[serde(rename = "ccloud_configs")]
    pub ccloud: CCloudConfig,
    #[serde(rename = "secret_store")]
    pub secret_store: SecretStoreConfig,
}

/// Confluent Cloud connection settings and run toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct CCloudConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Postfix of the per-cluster shared REST proxy secret. Mandatory as soon
    /// as any definition carries a REST proxy flag.
    #[serde(default)]
    pub rest_proxy_secret_name: Option<String>,
    /// Path the REST proxy mounts its basic-auth file at; baked into the
    /// JAAS prefix when a shared secret is created from scratch.
    #[serde(default = "default_basic_auth_path")]
    pub rest_proxy_basic_auth_path: String,
    /// Service account resource ids that must never be touched.
    #[serde(default, rename = "ignore_service_account_list")]
    pub ignore_service_account_ids: Vec<String>,
    /// Heuristically mark platform-internal accounts (Connect, ksqlDB) as
    /// ignored by their name prefix.
    #[serde(default, rename = "detect_ignore_ccloud_internal_accounts")]
    pub detect_internal_accounts: bool,
    /// Allow deletion of service accounts absent from the definitions.
    #[serde(default)]
    pub enable_sa_cleanup: bool,
    /// Allow deletion of API keys absent from the definitions.
    #[serde(default)]
    pub enable_api_key_cleanup: bool,
}

fn default_basic_auth_path() -> String {
    "/mnt/secrets/rest-proxy-users/basic.txt".to_string()
}

/// Secret store backend selection and naming scheme.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretStoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "type")]
    pub store_type: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_true() -> bool {
    true
}

fn default_separator() -> String {
    "/".to_string()
}

impl AppConfig {
    /// Load and validate the settings file.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Parsing configuration file: {}", path.display());
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("Config file is not valid YAML")?;
        resolve_env_refs(&mut value)?;
        let config: AppConfig =
            serde_yaml::from_value(value).context("Config file has an unexpected shape")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SyncError> {
        check_pair(
            "api_key",
            &self.configs.ccloud.api_key,
            "api_secret",
            &self.configs.ccloud.api_secret,
        )?;
        let store = &self.configs.secret_store;
        if !SUPPORTED_STORES.contains(&store.store_type.as_str()) {
            return Err(SyncError::UnsupportedStore(
                store.store_type.clone(),
                SUPPORTED_STORES.join(","),
            ));
        }
        if store.separator.is_empty() {
            return Err(SyncError::config("secret_store.separator must not be empty"));
        }
        Ok(())
    }

    /// REST proxy flags in the definitions require a shared secret name in
    /// the settings. Raised at load time, before any directory call.
    pub fn validate_against_definitions(&self, defs: &Definitions) -> Result<(), SyncError> {
        let needs_rp = defs
            .service_accounts
            .iter()
            .any(|sa| sa.is_rest_proxy_user || sa.rest_proxy_access);
        if needs_rp && self.configs.ccloud.rest_proxy_secret_name.is_none() {
            return Err(SyncError::config(
                "rest_proxy_secret_name is required when enable_rest_proxy_access or \
                 is_rest_proxy_user is set in the definitions",
            ));
        }
        Ok(())
    }
}

fn check_pair(key_a: &str, val_a: &str, key_b: &str, val_b: &str) -> Result<(), SyncError> {
    if val_a.is_empty() || val_b.is_empty() {
        return Err(SyncError::config(format!(
            "{key_a} and {key_b} are a mandatory pair. Please populate both."
        )));
    }
    Ok(())
}

/// Walk a YAML document and replace every `env::NAME` string with the value
/// of the environment variable `NAME`. A missing variable is a fatal
/// configuration error.
pub fn resolve_env_refs(value: &mut serde_yaml::Value) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => {
            if let Some(var_name) = s.strip_prefix(ENV_PREFIX) {
                let resolved = std::env::var(var_name).with_context(|| {
                    format!("Cannot find environment variable {var_name} referenced in config")
                })?;
                *s = resolved;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                resolve_env_refs(item)?;
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                resolve_env_refs(v)?;
            }
        }
        _ => {}
    }
    Ok(())
}
