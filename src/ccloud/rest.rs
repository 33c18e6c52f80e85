//! # Confluent Cloud REST Client
//!
//! [`ResourceDirectory`] implementation over the Confluent Cloud v2 REST API
//! (`api.confluent.cloud`) with basic auth. List endpoints are drained with
//! an explicit pagination loop following the `metadata.next` link until it is
//! absent. A non-2xx response surfaces immediately with the raw provider
//! body; nothing is retried here.

use crate::ccloud::types::{ApiKey, Cluster, Environment, ServiceAccount};
use crate::ccloud::ResourceDirectory;
use crate::error::SyncError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const BASE_URL: &str = "https://api.confluent.cloud";
const ENVIRONMENTS_PATH: &str = "/org/v2/environments";
const CLUSTERS_PATH: &str = "/cmk/v2/clusters";
const SERVICE_ACCOUNTS_PATH: &str = "/iam/v2/service-accounts";
const API_KEYS_PATH: &str = "/iam/v2/api-keys";
const PAGE_SIZE: u32 = 50;

/// HTTP client for the Confluent Cloud directory.
#[derive(Debug, Clone)]
pub struct CCloudClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    metadata: PageMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PageMetadata {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceMetadata {
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireEnvironment {
    id: String,
    display_name: String,
    metadata: Option<ResourceMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireCluster {
    id: String,
    spec: WireClusterSpec,
}

#[derive(Debug, Deserialize)]
struct WireClusterSpec {
    display_name: String,
    cloud: String,
    availability: String,
    region: String,
    #[serde(default)]
    kafka_bootstrap_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct WireServiceAccount {
    id: String,
    display_name: String,
    #[serde(default)]
    description: String,
    metadata: Option<ResourceMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireApiKey {
    id: String,
    spec: WireApiKeySpec,
    metadata: Option<ResourceMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireApiKeySpec {
    #[serde(default)]
    description: String,
    #[serde(default)]
    secret: Option<String>,
    owner: WireRef,
    resource: Option<WireResourceRef>,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireResourceRef {
    #[serde(default)]
    id: String,
    #[serde(default)]
    kind: String,
}

impl CCloudClient {
    pub fn new(api_key: &str, api_secret: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ccloud-secret-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::Directory {
            status: status.as_u16(),
            body,
        }
        .into())
    }

    /// Drain a paginated list endpoint. The first request carries the query
    /// parameters; follow-up requests use the `metadata.next` URL verbatim
    /// (it already encodes the page token).
    async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next_url: Option<String> = None;
        loop {
            let request = match next_url.take() {
                Some(url) => self.http.get(url),
                None => self.http.get(self.endpoint(path)).query(query),
            };
            let resp = request
                .basic_auth(&self.api_key, Some(&self.api_secret))
                .send()
                .await
                .with_context(|| format!("Request to {path} failed"))?;
            let page: Page<T> = Self::check(resp)
                .await?
                .json()
                .await
                .with_context(|| format!("Response from {path} is not the expected JSON"))?;
            items.extend(page.data);
            match page.metadata.next {
                Some(next) if !next.is_empty() => next_url = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl ResourceDirectory for CCloudClient {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        debug!("Listing all environments");
        let wire: Vec<WireEnvironment> = self
            .fetch_all_pages(ENVIRONMENTS_PATH, &[("page_size", PAGE_SIZE.to_string())])
            .await?;
        Ok(wire
            .into_iter()
            .map(|e| Environment {
                id: e.id,
                display_name: e.display_name,
                created_at: e.metadata.and_then(|m| m.created_at),
            })
            .collect())
    }

    async fn list_clusters(&self, env_id: &str) -> Result<Vec<Cluster>> {
        debug!("Listing clusters in environment {}", env_id);
        let wire: Vec<WireCluster> = self
            .fetch_all_pages(
                CLUSTERS_PATH,
                &[
                    ("environment", env_id.to_string()),
                    ("page_size", PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        Ok(wire
            .into_iter()
            .map(|c| Cluster {
                id: c.id,
                env_id: env_id.to_string(),
                name: c.spec.display_name,
                cloud: c.spec.cloud,
                availability: c.spec.availability,
                region: c.spec.region,
                bootstrap_endpoint: c.spec.kafka_bootstrap_endpoint,
            })
            .collect())
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>> {
        debug!("Listing all service accounts");
        let wire: Vec<WireServiceAccount> = self
            .fetch_all_pages(
                SERVICE_ACCOUNTS_PATH,
                &[("page_size", PAGE_SIZE.to_string())],
            )
            .await?;
        Ok(wire
            .into_iter()
            .map(|sa| {
                let (created_at, updated_at) = sa
                    .metadata
                    .map(|m| (m.created_at, m.updated_at))
                    .unwrap_or_default();
                ServiceAccount {
                    id: sa.id,
                    name: sa.display_name,
                    description: sa.description,
                    created_at,
                    updated_at,
                    is_ignored: false,
                }
            })
            .collect())
    }

    async fn list_api_keys(&self, owner_ids: &[String]) -> Result<Vec<ApiKey>> {
        let mut keys = Vec::new();
        for owner_id in owner_ids {
            debug!("Listing API keys owned by {}", owner_id);
            let wire: Vec<WireApiKey> = self
                .fetch_all_pages(
                    API_KEYS_PATH,
                    &[
                        ("spec.owner", owner_id.clone()),
                        ("page_size", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            for key in wire {
                // Only Kafka cluster keys take part in reconciliation. Keys
                // scoped to other resources (ksqlDB, Schema Registry, Cloud)
                // are out of scope and skipped.
                let Some(resource) = key.spec.resource else {
                    debug!("API key {} has no resource scope, skipping", key.id);
                    continue;
                };
                if resource.kind != "Cluster" || resource.id.is_empty() {
                    debug!(
                        "API key {} is scoped to {} '{}', skipping",
                        key.id, resource.kind, resource.id
                    );
                    continue;
                }
                keys.push(ApiKey {
                    id: key.id,
                    secret: key.spec.secret,
                    owner_id: key.spec.owner.id,
                    cluster_id: resource.id,
                    description: key.spec.description,
                    created_at: key.metadata.and_then(|m| m.created_at),
                });
            }
        }
        Ok(keys)
    }

    async fn create_service_account(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(ServiceAccount, bool)> {
        info!("Creating service account '{}'", name);
        let payload = json!({
            "display_name": name,
            "description": description,
        });
        let resp = self
            .http
            .post(self.endpoint(SERVICE_ACCOUNTS_PATH))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&payload)
            .send()
            .await
            .context("Service account create request failed")?;
        let wire: WireServiceAccount = Self::check(resp)
            .await?
            .json()
            .await
            .context("Service account create response is not the expected JSON")?;
        let (created_at, updated_at) = wire
            .metadata
            .map(|m| (m.created_at, m.updated_at))
            .unwrap_or_default();
        Ok((
            ServiceAccount {
                id: wire.id,
                name: wire.display_name,
                description: wire.description,
                created_at,
                updated_at,
                is_ignored: false,
            },
            true,
        ))
    }

    async fn delete_service_account(&self, id: &str) -> Result<bool> {
        info!("Deleting service account {}", id);
        let resp = self
            .http
            .delete(format!("{}/{id}", self.endpoint(SERVICE_ACCOUNTS_PATH)))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .context("Service account delete request failed")?;
        Self::check(resp).await?;
        Ok(true)
    }

    async fn create_api_key(
        &self,
        env_id: &str,
        cluster_id: &str,
        owner_id: &str,
        description: &str,
    ) -> Result<ApiKey> {
        info!(
            "Creating API key for {} on cluster {} in {}",
            owner_id, cluster_id, env_id
        );
        let payload = json!({
            "spec": {
                "display_name": format!("{owner_id}-{cluster_id}"),
                "description": description,
                "owner": { "id": owner_id },
                "resource": { "id": cluster_id, "environment": env_id },
            }
        });
        let resp = self
            .http
            .post(self.endpoint(API_KEYS_PATH))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&payload)
            .send()
            .await
            .context("API key create request failed")?;
        let wire: WireApiKey = Self::check(resp)
            .await?
            .json()
            .await
            .context("API key create response is not the expected JSON")?;
        Ok(ApiKey {
            id: wire.id,
            secret: wire.spec.secret,
            owner_id: owner_id.to_string(),
            cluster_id: cluster_id.to_string(),
            description: description.to_string(),
            created_at: Some(Utc::now()),
        })
    }

    async fn delete_api_key(&self, id: &str) -> Result<bool> {
        info!("Deleting API key {}", id);
        let resp = self
            .http
            .delete(format!("{}/{id}", self.endpoint(API_KEYS_PATH)))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .context("API key delete request failed")?;
        Self::check(resp).await?;
        Ok(true)
    }
}
