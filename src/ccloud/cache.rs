//! # Directory Cache
//!
//! Request-scoped snapshot of the Confluent Cloud inventory, built once at
//! run start and mutated by the executor as creates and deletes succeed so
//! that later lookups within the same run see the new objects. There is no
//! ambient global state; the cache is constructed explicitly and passed by
//! reference into the planner and executor.

use crate::ccloud::types::{ApiKey, Cluster, Environment, ServiceAccount};
use crate::ccloud::ResourceDirectory;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Name prefixes of accounts the platform manages itself (managed Connect
/// and ksqlDB workers). Touching these breaks the managed services.
const INTERNAL_NAME_PREFIXES: &[&str] = &["Connect.", "KSQL."];

#[derive(Debug, Default)]
pub struct DirectoryCache {
    pub environments: HashMap<String, Environment>,
    pub clusters: HashMap<String, Cluster>,
    pub service_accounts: HashMap<String, ServiceAccount>,
    /// Keyed by API key id.
    pub api_keys: HashMap<String, ApiKey>,
}

impl DirectoryCache {
    /// Snapshot the directory: environments, clusters per environment,
    /// service accounts (with ignore marking) and the API keys owned by the
    /// observed accounts.
    pub async fn build(
        directory: &dyn ResourceDirectory,
        ignore_ids: &[String],
        detect_internal_accounts: bool,
    ) -> Result<Self> {
        let mut cache = DirectoryCache::default();
        let ignore_set: HashSet<&str> = ignore_ids.iter().map(String::as_str).collect();

        info!("Gathering all environments from Confluent Cloud");
        for env in directory.list_environments().await? {
            debug!("Found environment {} ({})", env.id, env.display_name);
            cache.environments.insert(env.id.clone(), env);
        }

        info!("Gathering clusters for every environment");
        let env_ids: Vec<String> = cache.environments.keys().cloned().collect();
        for env_id in env_ids {
            for cluster in directory.list_clusters(&env_id).await? {
                debug!("Found cluster {} ({})", cluster.id, cluster.name);
                cache.clusters.insert(cluster.id.clone(), cluster);
            }
        }

        info!("Gathering service accounts");
        for mut sa in directory.list_service_accounts().await? {
            sa.is_ignored = ignore_set.contains(sa.id.as_str())
                || (detect_internal_accounts && is_internal_name(&sa.name));
            if sa.is_ignored {
                debug!("Service account {} ({}) is ignored", sa.id, sa.name);
            }
            cache.service_accounts.insert(sa.id.clone(), sa);
        }

        info!("Gathering API keys for all observed service accounts");
        let owner_ids: Vec<String> = cache.service_accounts.keys().cloned().collect();
        for key in directory.list_api_keys(&owner_ids).await? {
            debug!(
                "Found API key {} for {} on cluster {}",
                key.id, key.owner_id, key.cluster_id
            );
            cache.api_keys.insert(key.id.clone(), key);
        }

        info!(
            "Directory snapshot complete: {} environments, {} clusters, {} service accounts, {} API keys",
            cache.environments.len(),
            cache.clusters.len(),
            cache.service_accounts.len(),
            cache.api_keys.len()
        );
        Ok(cache)
    }

    pub fn find_environment(&self, env_id: &str) -> Option<&Environment> {
        self.environments.get(env_id)
    }

    pub fn find_cluster(&self, cluster_id: &str) -> Option<&Cluster> {
        self.clusters.get(cluster_id)
    }

    pub fn find_service_account(&self, id: &str) -> Option<&ServiceAccount> {
        self.service_accounts.get(id)
    }

    pub fn find_service_account_by_name(&self, name: &str) -> Option<&ServiceAccount> {
        self.service_accounts.values().find(|sa| sa.name == name)
    }

    pub fn keys_for_owner(&self, owner_id: &str) -> Vec<&ApiKey> {
        self.api_keys
            .values()
            .filter(|k| k.owner_id == owner_id)
            .collect()
    }

    pub fn keys_for_owner_and_cluster(&self, owner_id: &str, cluster_id: &str) -> Vec<&ApiKey> {
        self.api_keys
            .values()
            .filter(|k| k.owner_id == owner_id && k.cluster_id == cluster_id)
            .collect()
    }

    /// Observed account names taking part in the diff (ignored accounts are
    /// invisible to it).
    pub fn observed_sa_names(&self) -> HashSet<String> {
        self.service_accounts
            .values()
            .filter(|sa| !sa.is_ignored)
            .map(|sa| sa.name.clone())
            .collect()
    }

    pub fn ignored_sa_names(&self) -> HashSet<String> {
        self.service_accounts
            .values()
            .filter(|sa| sa.is_ignored)
            .map(|sa| sa.name.clone())
            .collect()
    }

    pub fn insert_service_account(&mut self, sa: ServiceAccount) {
        self.service_accounts.insert(sa.id.clone(), sa);
    }

    /// The platform cascades account deletion to the account's API keys, so
    /// the snapshot drops them too.
    pub fn remove_service_account(&mut self, id: &str) {
        self.service_accounts.remove(id);
        self.api_keys.retain(|_, key| key.owner_id != id);
    }

    pub fn insert_api_key(&mut self, key: ApiKey) {
        self.api_keys.insert(key.id.clone(), key);
    }

    pub fn remove_api_key(&mut self, id: &str) {
        self.api_keys.remove(id);
    }
}

fn is_internal_name(name: &str) -> bool {
    INTERNAL_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
