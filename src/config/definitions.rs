//! # Desired-State Definitions
//!
//! The definitions file enumerates the service accounts that should exist,
//! the clusters each one needs an API key on, and the REST proxy flags.
//! Definitions are immutable for the duration of a run.

use crate::config::resolve_env_refs;
use crate::error::SyncError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Sentinel in the `api_key_access` list meaning "every known cluster".
pub const ALL_CLUSTERS_SENTINEL: &str = "FORCE_ALL_CLUSTERS";

/// The cluster scope of one service account definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterScope {
    /// Expand to every cluster the directory knows at plan time.
    All,
    /// A literal list of cluster ids.
    List(Vec<String>),
}

impl ClusterScope {
    fn from_raw(raw: Vec<String>) -> Self {
        if raw.iter().any(|c| c == ALL_CLUSTERS_SENTINEL) {
            ClusterScope::All
        } else {
            ClusterScope::List(raw)
        }
    }
}

/// One declared service account.
#[derive(Debug, Clone)]
pub struct ServiceAccountDefinition {
    pub name: String,
    pub description: String,
    pub team_email: Option<String>,
    pub clusters: ClusterScope,
    /// This account *is* the REST proxy identity for its clusters.
    pub is_rest_proxy_user: bool,
    /// This account's credentials must be merged into the shared REST proxy
    /// secret. Implied true for REST proxy users.
    pub rest_proxy_access: bool,
}

#[derive(Debug, Deserialize)]
struct RawDefinitionsFile {
    service_accounts: Vec<RawServiceAccount>,
}

#[derive(Debug, Deserialize)]
struct RawServiceAccount {
    name: String,
    description: String,
    #[serde(default, rename = "team_email_address")]
    team_email: Option<String>,
    #[serde(default, rename = "api_key_access")]
    cluster_list: Vec<String>,
    #[serde(default)]
    is_rest_proxy_user: bool,
    #[serde(default, rename = "enable_rest_proxy_access")]
    rest_proxy_access: bool,
}

/// The full desired state for a run.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub service_accounts: Vec<ServiceAccountDefinition>,
}

impl Definitions {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Parsing definitions file: {}", path.display());
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read definitions file: {}", path.display()))?;
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("Definitions file is not valid YAML")?;
        resolve_env_refs(&mut value)?;
        let parsed: RawDefinitionsFile =
            serde_yaml::from_value(value).context("Definitions file has an unexpected shape")?;

        let mut seen = HashSet::new();
        let mut service_accounts = Vec::with_capacity(parsed.service_accounts.len());
        for raw_sa in parsed.service_accounts {
            if !seen.insert(raw_sa.name.clone()) {
                return Err(SyncError::config(format!(
                    "duplicate service account definition '{}'",
                    raw_sa.name
                ))
                .into());
            }
            service_accounts.push(ServiceAccountDefinition {
                rest_proxy_access: raw_sa.rest_proxy_access || raw_sa.is_rest_proxy_user,
                name: raw_sa.name,
                description: raw_sa.description,
                team_email: raw_sa.team_email,
                clusters: ClusterScope::from_raw(raw_sa.cluster_list),
                is_rest_proxy_user: raw_sa.is_rest_proxy_user,
            });
        }
        Ok(Definitions { service_accounts })
    }

    pub fn find(&self, sa_name: &str) -> Option<&ServiceAccountDefinition> {
        self.service_accounts.iter().find(|sa| sa.name == sa_name)
    }

    /// The definitions that designate a REST proxy user covering the given
    /// cluster.
    pub fn rest_proxy_user_for_cluster(&self, cluster_id: &str) -> Option<&ServiceAccountDefinition> {
        self.service_accounts
            .iter()
            .find(|sa| sa.is_rest_proxy_user && sa.covers_cluster(cluster_id))
    }
}

impl ServiceAccountDefinition {
    pub fn covers_cluster(&self, cluster_id: &str) -> bool {
        match &self.clusters {
            ClusterScope::All => true,
            ClusterScope::List(list) => list.iter().any(|c| c == cluster_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_definitions(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write definitions");
        file
    }

    #[test]
    fn test_load_definitions() {
        let file = write_definitions(
            r"
service_accounts:
  - name: svc-a
    description: Service A
    team_email_address: team-a@example.com
    api_key_access: [lkc-1, lkc-2]
    enable_rest_proxy_access: true
  - name: rest-proxy
    description: REST proxy identity
    api_key_access: [FORCE_ALL_CLUSTERS]
    is_rest_proxy_user: true
",
        );
        let defs = Definitions::load(file.path()).expect("definitions should load");
        assert_eq!(defs.service_accounts.len(), 2);

        let svc_a = defs.find("svc-a").expect("svc-a present");
        assert_eq!(
            svc_a.clusters,
            ClusterScope::List(vec!["lkc-1".into(), "lkc-2".into()])
        );
        assert!(svc_a.rest_proxy_access);
        assert!(!svc_a.is_rest_proxy_user);

        let rp = defs.find("rest-proxy").expect("rest-proxy present");
        assert_eq!(rp.clusters, ClusterScope::All);
        // is_rest_proxy_user implies rest_proxy_access
        assert!(rp.rest_proxy_access);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let file = write_definitions(
            r"
service_accounts:
  - name: svc-a
    description: first
  - name: svc-a
    description: second
",
        );
        let err = Definitions::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate service account"));
    }

    #[test]
    fn test_rest_proxy_user_lookup_respects_cluster_scope() {
        let file = write_definitions(
            r"
service_accounts:
  - name: rp-east
    description: REST proxy for lkc-1
    api_key_access: [lkc-1]
    is_rest_proxy_user: true
",
        );
        let defs = Definitions::load(file.path()).expect("definitions should load");
        assert!(defs.rest_proxy_user_for_cluster("lkc-1").is_some());
        assert!(defs.rest_proxy_user_for_cluster("lkc-2").is_none());
    }
}
