//! # Shared Document Sync Pass
//!
//! Runs once at the end of a reconciliation, after all secret tasks. Every
//! per-account secret whose REST-proxy-bound credentials are still pending
//! is merged into its cluster's shared document, grouped so each cluster
//! gets at most one write no matter how many credentials changed.

use crate::ccloud::DirectoryCache;
use crate::config::{CCloudConfig, Definitions, SecretStoreConfig};
use crate::error::SyncError;
use crate::exec::render_bool;
use crate::restproxy::{content_digest, RestProxyDocument};
use crate::store::records::{
    SecretRecord, TAG_API_KEYS_COUNT, TAG_CLUSTER_ID, TAG_CLUSTER_NAME, TAG_ENV_ID, TAG_ENV_NAME,
    TAG_IS_REST_PROXY_USER, TAG_REST_PROXY_ACCESS, TAG_SA_ID, TAG_SA_NAME, TAG_SECRET_MANAGER,
    TAG_SECRET_MANAGER_VALUE, TAG_SYNC_NEEDED_FOR_RP,
};
use crate::store::{secret_name, SecretCache, SecretStore};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Merge all pending REST-proxy credentials into their clusters' shared
/// documents. Returns the number of shared documents written.
pub async fn sync_rest_proxy_secrets(
    definitions: &Definitions,
    ccloud_config: &CCloudConfig,
    store_config: &SecretStoreConfig,
    directory_cache: &DirectoryCache,
    secret_cache: &mut SecretCache,
    store: &dyn SecretStore,
) -> Result<usize> {
    let Some(postfix) = ccloud_config.rest_proxy_secret_name.as_deref() else {
        debug!("No REST proxy secret name configured, skipping the shared document pass");
        return Ok(0);
    };

    let pending: Vec<SecretRecord> = secret_cache
        .pending_rest_proxy_sync()
        .into_iter()
        .cloned()
        .collect();
    if pending.is_empty() {
        debug!("No per-account secrets pending a REST proxy merge");
        return Ok(0);
    }

    let mut by_cluster: BTreeMap<String, Vec<SecretRecord>> = BTreeMap::new();
    for record in pending {
        by_cluster
            .entry(record.cluster_id.clone())
            .or_default()
            .push(record);
    }

    let mut written = 0;
    for (cluster_id, records) in by_cluster {
        let rp_def = definitions
            .rest_proxy_user_for_cluster(&cluster_id)
            .ok_or_else(|| SyncError::MissingRestProxyUser {
                cluster_id: cluster_id.clone(),
            })?;
        let rp_sa = directory_cache
            .find_service_account_by_name(&rp_def.name)
            .ok_or_else(|| {
                anyhow!(
                    "REST proxy account '{}' is not in the directory yet",
                    rp_def.name
                )
            })?;
        let cluster = directory_cache
            .find_cluster(&cluster_id)
            .ok_or_else(|| anyhow!("cluster {cluster_id} is not in the directory"))?;

        let doc_name = secret_name(
            &store_config.prefix,
            &store_config.separator,
            &cluster.env_id,
            &cluster_id,
            &rp_sa.id,
            Some(postfix),
        );

        let stored = store.get_secret(&doc_name).await?;
        let (mut doc, old_fields) = match &stored {
            Some(raw) => {
                let fields: BTreeMap<String, String> = serde_json::from_str(raw)
                    .with_context(|| format!("Shared document '{doc_name}' is not valid JSON"))?;
                let doc =
                    RestProxyDocument::parse(&fields, &ccloud_config.rest_proxy_basic_auth_path)?;
                (doc, Some(fields))
            }
            None => (
                RestProxyDocument::fresh(&ccloud_config.rest_proxy_basic_auth_path),
                None,
            ),
        };

        let mut changed = false;
        let mut contributors = Vec::new();
        for record in &records {
            let Some(raw) = store.get_secret(&record.secret_name).await? else {
                warn!(
                    "Secret '{}' is pending a REST proxy merge but has no stored value, skipping",
                    record.secret_name
                );
                continue;
            };
            let credential: BTreeMap<String, String> = serde_json::from_str(&raw)
                .with_context(|| format!("Secret '{}' is not valid JSON", record.secret_name))?;
            let (Some(username), Some(password)) =
                (credential.get("username"), credential.get("password"))
            else {
                warn!(
                    "Secret '{}' is missing its username/password fields, skipping",
                    record.secret_name
                );
                continue;
            };
            changed |= doc.upsert(username, password);
            contributors.push(record.secret_name.clone());
        }

        if changed {
            let fields = doc.render();
            let value = serde_json::to_string(&fields)?;
            match old_fields {
                None => {
                    let tags = render_document_tags(directory_cache, cluster, rp_sa, &doc);
                    store.create_secret(&doc_name, &value, &tags).await?;
                    secret_cache.insert(SecretRecord {
                        secret_name: doc_name.clone(),
                        sa_id: rp_sa.id.clone(),
                        sa_name: rp_sa.name.clone(),
                        cluster_id: cluster_id.clone(),
                        env_id: cluster.env_id.clone(),
                        rest_proxy_access: false,
                        is_rest_proxy_user: true,
                        api_key_id: String::new(),
                        sync_pending: false,
                    });
                    info!("Created shared REST proxy document '{}'", doc_name);
                    written += 1;
                }
                Some(old) if content_digest(&old) != content_digest(&fields) => {
                    store.update_secret(&doc_name, &value).await?;
                    let mut count_tag = BTreeMap::new();
                    count_tag.insert(TAG_API_KEYS_COUNT.to_string(), doc.api_keys_count());
                    store.tag_secret(&doc_name, &count_tag).await?;
                    info!("Updated shared REST proxy document '{}'", doc_name);
                    written += 1;
                }
                Some(_) => {
                    debug!(
                        "Shared document '{}' digest unchanged, skipping write",
                        doc_name
                    );
                }
            }
        }

        // Contributors are marked complete even when the document already
        // held their credentials, so they do not re-enter the merge forever.
        let mut done_tag = BTreeMap::new();
        done_tag.insert(TAG_SYNC_NEEDED_FOR_RP.to_string(), render_bool(false));
        for name in contributors {
            store.tag_secret(&name, &done_tag).await?;
            if let Some(record) = secret_cache.records.get_mut(&name) {
                record.sync_pending = false;
            }
        }
    }

    info!("REST proxy pass complete: {} shared document(s) written", written);
    Ok(written)
}

fn render_document_tags(
    directory_cache: &DirectoryCache,
    cluster: &crate::ccloud::Cluster,
    rp_sa: &crate::ccloud::ServiceAccount,
    doc: &RestProxyDocument,
) -> BTreeMap<String, String> {
    let env_name = directory_cache
        .find_environment(&cluster.env_id)
        .map(|e| e.display_name.clone())
        .unwrap_or_default();
    let mut tags = BTreeMap::new();
    tags.insert(
        TAG_SECRET_MANAGER.to_string(),
        TAG_SECRET_MANAGER_VALUE.to_string(),
    );
    tags.insert(TAG_ENV_NAME.to_string(), env_name);
    tags.insert(TAG_ENV_ID.to_string(), cluster.env_id.clone());
    tags.insert(TAG_CLUSTER_NAME.to_string(), cluster.name.clone());
    tags.insert(TAG_CLUSTER_ID.to_string(), cluster.id.clone());
    tags.insert(TAG_SA_NAME.to_string(), rp_sa.name.clone());
    tags.insert(TAG_SA_ID.to_string(), rp_sa.id.clone());
    tags.insert(TAG_REST_PROXY_ACCESS.to_string(), render_bool(false));
    tags.insert(TAG_IS_REST_PROXY_USER.to_string(), render_bool(true));
    tags.insert(TAG_API_KEYS_COUNT.to_string(), doc.api_keys_count());
    tags
}
