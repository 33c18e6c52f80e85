//! # Secret Store
//!
//! Capability seam over the secret store backing the reconciler. The trait
//! deliberately covers only what the core needs: tag-filtered listing,
//! read-by-name, create/update and re-tagging of opaque secret documents.
//! One implementation per backend, selected from configuration at startup.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod aws;
pub mod records;

pub use aws::AwsSecretStore;
pub use records::{secret_name, SecretCache, SecretRecord};

/// Tag metadata of one stored secret, as returned by a list call.
#[derive(Debug, Clone)]
pub struct SecretMetadata {
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

/// Store operations over opaque secret documents.
///
/// A secret that does not exist is an `Ok(None)` result, never an error;
/// callers branch on presence explicitly.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// List metadata of every secret matching all of the given tag pairs.
    async fn list_secrets(&self, tag_filter: &[(&str, &str)]) -> Result<Vec<SecretMetadata>>;

    async fn get_secret(&self, name: &str) -> Result<Option<String>>;

    async fn create_secret(
        &self,
        name: &str,
        value: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn update_secret(&self, name: &str, value: &str) -> Result<()>;

    /// Add or overwrite tags without touching the secret value.
    async fn tag_secret(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<()>;
}
