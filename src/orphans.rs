//! # Orphan API Key Detection
//!
//! An orphan is an API key that exists in the cloud but is referenced by no
//! stored secret: nothing can be using it through the pipeline, and its
//! secret material is unrecoverable. Detection is read-only; cleanup stays a
//! human decision (or the cleanup flags, which act on the definitions diff).

use crate::ccloud::DirectoryCache;
use crate::store::SecretCache;
use std::fmt::Write as _;

/// One deletion-eligible key with enough context to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanKey {
    pub api_key_id: String,
    pub sa_id: String,
    pub sa_name: String,
    pub cluster_id: String,
}

/// Keys present in the directory but absent from every stored secret,
/// excluding keys owned by ignored accounts. Sorted by key id.
pub fn find_orphan_keys(directory: &DirectoryCache, secrets: &SecretCache) -> Vec<OrphanKey> {
    let known = secrets.known_api_key_ids();
    let mut orphans: Vec<OrphanKey> = directory
        .api_keys
        .values()
        .filter(|key| !known.contains(&key.id))
        .filter_map(|key| {
            let owner = directory.find_service_account(&key.owner_id)?;
            if owner.is_ignored {
                return None;
            }
            Some(OrphanKey {
                api_key_id: key.id.clone(),
                sa_id: owner.id.clone(),
                sa_name: owner.name.clone(),
                cluster_id: key.cluster_id.clone(),
            })
        })
        .collect();
    orphans.sort_by(|a, b| a.api_key_id.cmp(&b.api_key_id));
    orphans
}

/// Fixed-width table for operator output.
pub fn render_table(orphans: &[OrphanKey]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<12} {:<30} {:<12}",
        "API Key", "Owner ID", "Owner Name", "Cluster"
    );
    for orphan in orphans {
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:<30} {:<12}",
            orphan.api_key_id, orphan.sa_id, orphan.sa_name, orphan.cluster_id
        );
    }
    out
}
