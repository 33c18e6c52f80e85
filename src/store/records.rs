//! # Secret Records
//!
//! The reconciler's view of what the secret store already holds. Records are
//! reconstructed from tag metadata alone (listing never fetches values), so
//! the diff can run without touching a single secret payload.

use crate::plan::CompositeKey;
use crate::store::{SecretMetadata, SecretStore};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

pub const TAG_SECRET_MANAGER: &str = "secret_manager";
pub const TAG_SECRET_MANAGER_VALUE: &str = "confluent_cloud";
pub const TAG_ENV_NAME: &str = "env_name";
pub const TAG_ENV_ID: &str = "env_id";
pub const TAG_CLUSTER_NAME: &str = "cluster_name";
pub const TAG_CLUSTER_ID: &str = "cluster_id";
pub const TAG_SA_NAME: &str = "sa_name";
pub const TAG_SA_ID: &str = "sa_id";
pub const TAG_API_KEY: &str = "api_key";
pub const TAG_REST_PROXY_ACCESS: &str = "rest_proxy_access";
pub const TAG_IS_REST_PROXY_USER: &str = "is_rest_proxy_user";
pub const TAG_SYNC_NEEDED_FOR_RP: &str = "sync_needed_for_rp";
pub const TAG_API_KEYS_COUNT: &str = "api_keys_count";

/// One stored secret, as reconstructed from its tags.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub secret_name: String,
    pub sa_id: String,
    pub sa_name: String,
    pub cluster_id: String,
    pub env_id: String,
    /// Credentials in this secret must be merged into the shared REST proxy
    /// document.
    pub rest_proxy_access: bool,
    /// This secret *is* a per-cluster shared REST proxy document.
    pub is_rest_proxy_user: bool,
    pub api_key_id: String,
    /// REST-proxy-bound credentials not yet merged into the shared document.
    pub sync_pending: bool,
}

impl SecretRecord {
    /// Rebuild a record from tag metadata. Returns `None` when the required
    /// identity tags are absent (a foreign secret that slipped through the
    /// filter).
    fn from_metadata(meta: &SecretMetadata) -> Option<Self> {
        let tags = &meta.tags;
        let is_rest_proxy_user = tags
            .get(TAG_IS_REST_PROXY_USER)
            .is_some_and(|v| v == "True");
        // The shared document itself never needs syncing; anything else is
        // pending until explicitly tagged complete.
        let sync_pending = if is_rest_proxy_user {
            false
        } else {
            tags.get(TAG_SYNC_NEEDED_FOR_RP)
                .map_or(true, |v| v == "True")
        };
        Some(SecretRecord {
            secret_name: meta.name.clone(),
            sa_id: tags.get(TAG_SA_ID)?.clone(),
            sa_name: tags.get(TAG_SA_NAME)?.clone(),
            cluster_id: tags.get(TAG_CLUSTER_ID)?.clone(),
            env_id: tags.get(TAG_ENV_ID)?.clone(),
            rest_proxy_access: tags
                .get(TAG_REST_PROXY_ACCESS)
                .is_some_and(|v| v == "True"),
            is_rest_proxy_user,
            api_key_id: tags.get(TAG_API_KEY).cloned().unwrap_or_default(),
            sync_pending,
        })
    }

    pub fn composite(&self) -> CompositeKey {
        CompositeKey::new(self.sa_name.clone(), self.cluster_id.clone())
    }
}

/// Request-scoped cache of the store's records, keyed by secret name.
#[derive(Debug, Default)]
pub struct SecretCache {
    pub records: HashMap<String, SecretRecord>,
}

impl SecretCache {
    /// List every secret carrying the reconciler's marker tag and rebuild
    /// the record set from the tag metadata.
    pub async fn build(store: &dyn SecretStore) -> Result<Self> {
        info!("Gathering managed secrets from the secret store");
        let listed = store
            .list_secrets(&[(TAG_SECRET_MANAGER, TAG_SECRET_MANAGER_VALUE)])
            .await?;
        let mut cache = SecretCache::default();
        for meta in &listed {
            match SecretRecord::from_metadata(meta) {
                Some(record) => {
                    cache.records.insert(record.secret_name.clone(), record);
                }
                None => warn!(
                    "Secret '{}' carries the manager tag but is missing identity tags, skipping",
                    meta.name
                ),
            }
        }
        info!("Found {} managed secrets", cache.records.len());
        Ok(cache)
    }

    pub fn insert(&mut self, record: SecretRecord) {
        self.records.insert(record.secret_name.clone(), record);
    }

    pub fn find(&self, secret_name: &str) -> Option<&SecretRecord> {
        self.records.get(secret_name)
    }

    /// Composite keys of every per-account credential secret. Shared REST
    /// proxy documents are excluded; they are not part of the API-key diff.
    pub fn composites(&self) -> BTreeSet<CompositeKey> {
        self.records
            .values()
            .filter(|r| !r.is_rest_proxy_user)
            .map(SecretRecord::composite)
            .collect()
    }

    /// Per-account secrets whose REST-proxy-bound credentials still await a
    /// merge into the shared document.
    pub fn pending_rest_proxy_sync(&self) -> Vec<&SecretRecord> {
        self.records
            .values()
            .filter(|r| r.rest_proxy_access && !r.is_rest_proxy_user && r.sync_pending)
            .collect()
    }

    /// API key ids referenced by any record.
    pub fn known_api_key_ids(&self) -> BTreeSet<String> {
        self.records
            .values()
            .filter(|r| !r.api_key_id.is_empty())
            .map(|r| r.api_key_id.clone())
            .collect()
    }
}

/// Deterministic secret name for a (service account, environment, cluster)
/// triple: `[<sep><prefix>]<sep>ccloud<sep><sa_id><sep><env_id><sep><cluster_id>[<sep><postfix>]`.
pub fn secret_name(
    prefix: &str,
    separator: &str,
    env_id: &str,
    cluster_id: &str,
    sa_id: &str,
    postfix: Option<&str>,
) -> String {
    let mut name = String::new();
    if !prefix.is_empty() {
        name.push_str(separator);
        name.push_str(prefix);
    }
    for part in ["ccloud", sa_id, env_id, cluster_id] {
        name.push_str(separator);
        name.push_str(part);
    }
    if let Some(postfix) = postfix {
        name.push_str(separator);
        name.push_str(postfix);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta(name: &str, pairs: &[(&str, &str)]) -> SecretMetadata {
        let tags: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SecretMetadata {
            name: name.to_string(),
            tags,
        }
    }

    #[test]
    fn test_secret_name_with_prefix_and_postfix() {
        assert_eq!(
            secret_name("myteam", "/", "env-1", "lkc-1", "sa-1", Some("rp-users")),
            "/myteam/ccloud/sa-1/env-1/lkc-1/rp-users"
        );
    }

    #[test]
    fn test_secret_name_without_prefix() {
        assert_eq!(
            secret_name("", "/", "env-1", "lkc-1", "sa-1", None),
            "/ccloud/sa-1/env-1/lkc-1"
        );
    }

    #[test]
    fn test_record_from_metadata() {
        let meta = meta(
            "/ccloud/sa-1/env-1/lkc-1",
            &[
                (TAG_SA_ID, "sa-1"),
                (TAG_SA_NAME, "svc-a"),
                (TAG_CLUSTER_ID, "lkc-1"),
                (TAG_ENV_ID, "env-1"),
                (TAG_REST_PROXY_ACCESS, "True"),
                (TAG_API_KEY, "AAA111"),
            ],
        );
        let record = SecretRecord::from_metadata(&meta).expect("record parses");
        assert_eq!(record.composite(), CompositeKey::new("svc-a", "lkc-1"));
        assert!(record.rest_proxy_access);
        assert!(!record.is_rest_proxy_user);
        // No sync tag present: REST-proxy-bound credentials default to pending.
        assert!(record.sync_pending);
    }

    #[test]
    fn test_rest_proxy_user_record_is_never_pending() {
        let meta = meta(
            "/ccloud/sa-rp/env-1/lkc-1/rp-users",
            &[
                (TAG_SA_ID, "sa-rp"),
                (TAG_SA_NAME, "rest-proxy"),
                (TAG_CLUSTER_ID, "lkc-1"),
                (TAG_ENV_ID, "env-1"),
                (TAG_IS_REST_PROXY_USER, "True"),
                (TAG_SYNC_NEEDED_FOR_RP, "True"),
            ],
        );
        let record = SecretRecord::from_metadata(&meta).expect("record parses");
        assert!(record.is_rest_proxy_user);
        assert!(!record.sync_pending);
    }

    #[test]
    fn test_sync_complete_tag_clears_pending() {
        let meta = meta(
            "/ccloud/sa-1/env-1/lkc-1",
            &[
                (TAG_SA_ID, "sa-1"),
                (TAG_SA_NAME, "svc-a"),
                (TAG_CLUSTER_ID, "lkc-1"),
                (TAG_ENV_ID, "env-1"),
                (TAG_REST_PROXY_ACCESS, "True"),
                (TAG_SYNC_NEEDED_FOR_RP, "False"),
            ],
        );
        let record = SecretRecord::from_metadata(&meta).expect("record parses");
        assert!(!record.sync_pending);
    }

    #[test]
    fn test_composites_exclude_shared_documents() {
        let mut cache = SecretCache::default();
        cache.insert(SecretRecord {
            secret_name: "a".to_string(),
            sa_id: "sa-1".to_string(),
            sa_name: "svc-a".to_string(),
            cluster_id: "lkc-1".to_string(),
            env_id: "env-1".to_string(),
            rest_proxy_access: true,
            is_rest_proxy_user: false,
            api_key_id: "AAA111".to_string(),
            sync_pending: true,
        });
        cache.insert(SecretRecord {
            secret_name: "b".to_string(),
            sa_id: "sa-rp".to_string(),
            sa_name: "rest-proxy".to_string(),
            cluster_id: "lkc-1".to_string(),
            env_id: "env-1".to_string(),
            rest_proxy_access: false,
            is_rest_proxy_user: true,
            api_key_id: String::new(),
            sync_pending: false,
        });

        let composites = cache.composites();
        assert_eq!(composites.len(), 1);
        assert!(composites.contains(&CompositeKey::new("svc-a", "lkc-1")));
    }
}
