//! # Confluent Cloud Resource Directory
//!
//! Read/write access to the platform inventory: environments, Kafka
//! clusters, service accounts and API keys. The [`ResourceDirectory`] trait
//! is the seam the planner and executor work against; [`rest::CCloudClient`]
//! is the HTTP implementation and [`cache::DirectoryCache`] the request-scoped
//! snapshot built once per run.

use anyhow::Result;
use async_trait::async_trait;

pub mod cache;
pub mod rest;
pub mod types;

pub use cache::DirectoryCache;
pub use rest::CCloudClient;
pub use types::{ApiKey, Cluster, Environment, ServiceAccount};

/// Directory operations the reconciler needs.
///
/// Every list operation returns the fully drained result; pagination is an
/// implementation detail of the backend. `create_service_account` reports
/// whether a new account was actually created alongside the account itself.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn list_environments(&self) -> Result<Vec<Environment>>;

    async fn list_clusters(&self, env_id: &str) -> Result<Vec<Cluster>>;

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>>;

    /// List the Kafka API keys owned by any of the given service accounts.
    async fn list_api_keys(&self, owner_ids: &[String]) -> Result<Vec<ApiKey>>;

    async fn create_service_account(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(ServiceAccount, bool)>;

    async fn delete_service_account(&self, id: &str) -> Result<bool>;

    /// Create an API key. The returned key is the only place the secret
    /// material will ever be visible; it cannot be read back later.
    async fn create_api_key(
        &self,
        env_id: &str,
        cluster_id: &str,
        owner_id: &str,
        description: &str,
    ) -> Result<ApiKey>;

    async fn delete_api_key(&self, id: &str) -> Result<bool>;
}
