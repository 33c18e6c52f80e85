//! # Definitions Scaffolding
//!
//! Reverse-bootstrap: render a definitions file from the service accounts
//! already observed in the directory, so an existing estate can be brought
//! under reconciliation without hand-writing every entry. Cluster access
//! lists start empty; granting access is an explicit follow-up edit.

use crate::ccloud::DirectoryCache;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

const PLACEHOLDER_EMAIL: &str = "team@example.com";

#[derive(Debug, Serialize)]
struct ScaffoldFile {
    service_accounts: Vec<ScaffoldAccount>,
}

#[derive(Debug, Serialize)]
struct ScaffoldAccount {
    name: String,
    description: String,
    enable_rest_proxy_access: bool,
    team_email_address: String,
    api_key_access: Vec<String>,
}

/// Render the definitions YAML for every observed non-ignored service
/// account, sorted by name so regeneration is diff-friendly.
pub fn render_definitions(directory: &DirectoryCache) -> Result<String> {
    let mut accounts: Vec<ScaffoldAccount> = directory
        .service_accounts
        .values()
        .filter(|sa| !sa.is_ignored)
        .map(|sa| ScaffoldAccount {
            name: sa.name.clone(),
            description: sa.description.clone(),
            enable_rest_proxy_access: false,
            team_email_address: PLACEHOLDER_EMAIL.to_string(),
            api_key_access: Vec::new(),
        })
        .collect();
    accounts.sort_by(|a, b| a.name.cmp(&b.name));

    serde_yaml::to_string(&ScaffoldFile {
        service_accounts: accounts,
    })
    .context("Failed to render the definitions YAML")
}

pub fn write_definitions_file(directory: &DirectoryCache, path: &Path) -> Result<()> {
    let yaml = render_definitions(directory)?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write definitions file: {}", path.display()))?;
    let count = directory
        .service_accounts
        .values()
        .filter(|sa| !sa.is_ignored)
        .count();
    info!(
        "Generated definitions for {} service account(s) at {}",
        count,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccloud::ServiceAccount;

    fn sa(name: &str, description: &str, is_ignored: bool) -> ServiceAccount {
        ServiceAccount {
            id: format!("sa-{name}"),
            name: name.to_string(),
            description: description.to_string(),
            created_at: None,
            updated_at: None,
            is_ignored,
        }
    }

    #[test]
    fn test_rendered_definitions_are_sorted_and_loadable() {
        let mut directory = DirectoryCache::default();
        directory.insert_service_account(sa("zeta", "last", false));
        directory.insert_service_account(sa("alpha", "first", false));
        directory.insert_service_account(sa("Connect.lcc-internal", "managed", true));

        let yaml = render_definitions(&directory).expect("render succeeds");
        assert!(yaml.find("alpha").unwrap() < yaml.find("zeta").unwrap());
        assert!(!yaml.contains("Connect.lcc-internal"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).expect("valid YAML");
        let accounts = parsed["service_accounts"].as_sequence().expect("sequence");
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0]["api_key_access"].as_sequence().map(Vec::len), Some(0));
    }
}
