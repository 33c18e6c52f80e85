//! # AWS Secrets Manager Backend
//!
//! [`SecretStore`] implementation over the official AWS SDK. Listing is
//! drained with an explicit `next_token` loop; a missing secret on read is
//! reported as `Ok(None)` via the SDK's typed not-found error rather than by
//! matching on error text.

use crate::store::{SecretMetadata, SecretStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType, Tag};
use aws_sdk_secretsmanager::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

const SECRET_DESCRIPTION: &str = "API key and secret generated by the CI/CD reconciler.";

/// AWS Secrets Manager backend.
pub struct AwsSecretStore {
    client: Client,
    region: String,
}

impl std::fmt::Debug for AwsSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretStore")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSecretStore {
    /// Build a client from the default AWS credential chain, with an
    /// optional region override from the settings file.
    pub async fn new(region: Option<&str>) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;
        let resolved_region = sdk_config
            .region()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(
            "Connected to AWS Secrets Manager in region '{}'",
            resolved_region
        );
        Ok(Self {
            client: Client::new(&sdk_config),
            region: resolved_region,
        })
    }

    fn render_tags(tags: &BTreeMap<String, String>) -> Vec<Tag> {
        tags.iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect()
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn list_secrets(&self, tag_filter: &[(&str, &str)]) -> Result<Vec<SecretMetadata>> {
        let mut filters = Vec::new();
        for (key, value) in tag_filter {
            filters.push(
                Filter::builder()
                    .key(FilterNameStringType::TagKey)
                    .values(key.to_string())
                    .build(),
            );
            filters.push(
                Filter::builder()
                    .key(FilterNameStringType::TagValue)
                    .values(value.to_string())
                    .build(),
            );
        }

        let mut secrets = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_secrets()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .context("AWS Secrets Manager list request failed")?;
            for entry in resp.secret_list() {
                let Some(name) = entry.name() else { continue };
                let tags: BTreeMap<String, String> = entry
                    .tags()
                    .iter()
                    .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
                    .collect();
                secrets.push(SecretMetadata {
                    name: name.to_string(),
                    tags,
                });
            }
            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        debug!("Listed {} secrets from AWS Secrets Manager", secrets.len());
        Ok(secrets)
    }

    async fn get_secret(&self, name: &str) -> Result<Option<String>> {
        match self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
        {
            Ok(resp) => {
                let value = resp.secret_string().map(ToString::to_string).or_else(|| {
                    resp.secret_binary()
                        .map(|blob| String::from_utf8_lossy(blob.as_ref()).to_string())
                });
                Ok(value)
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    debug!("Secret '{}' not found", name);
                    Ok(None)
                } else {
                    Err(anyhow::anyhow!(
                        "Failed to get secret '{name}': {service_err}"
                    ))
                }
            }
        }
    }

    async fn create_secret(
        &self,
        name: &str,
        value: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!("Creating secret '{}'", name);
        self.client
            .create_secret()
            .name(name)
            .description(SECRET_DESCRIPTION)
            .secret_string(value)
            .set_tags(Some(Self::render_tags(tags)))
            .send()
            .await
            .with_context(|| format!("Failed to create secret '{name}'"))?;
        Ok(())
    }

    async fn update_secret(&self, name: &str, value: &str) -> Result<()> {
        info!("Updating secret '{}'", name);
        self.client
            .put_secret_value()
            .secret_id(name)
            .secret_string(value)
            .send()
            .await
            .with_context(|| format!("Failed to update secret '{name}'"))?;
        Ok(())
    }

    async fn tag_secret(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        debug!("Tagging secret '{}'", name);
        self.client
            .tag_resource()
            .secret_id(name)
            .set_tags(Some(Self::render_tags(tags)))
            .send()
            .await
            .with_context(|| format!("Failed to tag secret '{name}'"))?;
        Ok(())
    }
}
