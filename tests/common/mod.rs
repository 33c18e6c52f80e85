//! Shared in-memory fakes for the reconciliation integration tests.
//!
//! `FakeDirectory` and `FakeStore` implement the same traits the production
//! backends do, over mutex-guarded maps, so a full plan/execute/merge cycle
//! can run without any network.

use async_trait::async_trait;
use ccloud_secret_sync::ccloud::{
    ApiKey, Cluster, Environment, ResourceDirectory, ServiceAccount,
};
use ccloud_secret_sync::store::{SecretMetadata, SecretStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeDirectory {
    pub environments: Mutex<Vec<Environment>>,
    pub clusters: Mutex<Vec<Cluster>>,
    pub service_accounts: Mutex<Vec<ServiceAccount>>,
    pub api_keys: Mutex<Vec<ApiKey>>,
    next_id: AtomicU32,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(self, id: &str, name: &str) -> Self {
        self.environments.lock().unwrap().push(Environment {
            id: id.to_string(),
            display_name: name.to_string(),
            created_at: None,
        });
        self
    }

    pub fn with_cluster(self, id: &str, env_id: &str, name: &str) -> Self {
        self.clusters.lock().unwrap().push(Cluster {
            id: id.to_string(),
            env_id: env_id.to_string(),
            name: name.to_string(),
            cloud: "aws".to_string(),
            availability: "single-zone".to_string(),
            region: "eu-west-1".to_string(),
            bootstrap_endpoint: format!("SASL_SSL://{id}.example.com:9092"),
        });
        self
    }

    pub fn with_service_account(self, id: &str, name: &str) -> Self {
        self.service_accounts.lock().unwrap().push(ServiceAccount {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} (pre-existing)"),
            created_at: None,
            updated_at: None,
            is_ignored: false,
        });
        self
    }

    /// A key whose secret material is no longer retrievable, as with any key
    /// created by an earlier run.
    pub fn with_api_key(self, id: &str, owner_id: &str, cluster_id: &str) -> Self {
        self.api_keys.lock().unwrap().push(ApiKey {
            id: id.to_string(),
            secret: None,
            owner_id: owner_id.to_string(),
            cluster_id: cluster_id.to_string(),
            description: String::new(),
            created_at: None,
        });
        self
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceDirectory for FakeDirectory {
    async fn list_environments(&self) -> anyhow::Result<Vec<Environment>> {
        Ok(self.environments.lock().unwrap().clone())
    }

    async fn list_clusters(&self, env_id: &str) -> anyhow::Result<Vec<Cluster>> {
        Ok(self
            .clusters
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.env_id == env_id)
            .cloned()
            .collect())
    }

    async fn list_service_accounts(&self) -> anyhow::Result<Vec<ServiceAccount>> {
        Ok(self.service_accounts.lock().unwrap().clone())
    }

    async fn list_api_keys(&self, owner_ids: &[String]) -> anyhow::Result<Vec<ApiKey>> {
        Ok(self
            .api_keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| owner_ids.contains(&k.owner_id))
            .cloned()
            .collect())
    }

    async fn create_service_account(
        &self,
        name: &str,
        description: &str,
    ) -> anyhow::Result<(ServiceAccount, bool)> {
        let mut accounts = self.service_accounts.lock().unwrap();
        if let Some(existing) = accounts.iter().find(|sa| sa.name == name) {
            return Ok((existing.clone(), false));
        }
        let sa = ServiceAccount {
            id: format!("sa-{:06}", self.next_id()),
            name: name.to_string(),
            description: description.to_string(),
            created_at: None,
            updated_at: None,
            is_ignored: false,
        };
        accounts.push(sa.clone());
        Ok((sa, true))
    }

    async fn delete_service_account(&self, id: &str) -> anyhow::Result<bool> {
        let mut accounts = self.service_accounts.lock().unwrap();
        let before = accounts.len();
        accounts.retain(|sa| sa.id != id);
        if accounts.len() == before {
            return Ok(false);
        }
        // Confluent cascades: keys owned by a deleted account die with it.
        self.api_keys.lock().unwrap().retain(|k| k.owner_id != id);
        Ok(true)
    }

    async fn create_api_key(
        &self,
        _env_id: &str,
        cluster_id: &str,
        owner_id: &str,
        description: &str,
    ) -> anyhow::Result<ApiKey> {
        let n = self.next_id();
        let key = ApiKey {
            id: format!("KEY{n:06}"),
            secret: Some(format!("secret-{n:06}")),
            owner_id: owner_id.to_string(),
            cluster_id: cluster_id.to_string(),
            description: description.to_string(),
            created_at: None,
        };
        self.api_keys.lock().unwrap().push(key.clone());
        Ok(key)
    }

    async fn delete_api_key(&self, id: &str) -> anyhow::Result<bool> {
        let mut keys = self.api_keys.lock().unwrap();
        let before = keys.len();
        keys.retain(|k| k.id != id);
        Ok(keys.len() < before)
    }
}

#[derive(Debug, Clone)]
pub struct StoredSecret {
    pub value: String,
    pub tags: BTreeMap<String, String>,
    pub writes: u32,
}

#[derive(Debug, Default)]
pub struct FakeStore {
    pub secrets: Mutex<HashMap<String, StoredSecret>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, value: &str, tags: &[(&str, &str)]) {
        self.secrets.lock().unwrap().insert(
            name.to_string(),
            StoredSecret {
                value: value.to_string(),
                tags: tags
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                writes: 0,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<StoredSecret> {
        self.secrets.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl SecretStore for FakeStore {
    async fn list_secrets(
        &self,
        tag_filter: &[(&str, &str)],
    ) -> anyhow::Result<Vec<SecretMetadata>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, stored)| {
                tag_filter
                    .iter()
                    .all(|(k, v)| stored.tags.get(*k).is_some_and(|t| t == v))
            })
            .map(|(name, stored)| SecretMetadata {
                name: name.clone(),
                tags: stored.tags.clone(),
            })
            .collect())
    }

    async fn get_secret(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.value.clone()))
    }

    async fn create_secret(
        &self,
        name: &str,
        value: &str,
        tags: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(name) {
            anyhow::bail!("secret '{name}' already exists");
        }
        secrets.insert(
            name.to_string(),
            StoredSecret {
                value: value.to_string(),
                tags: tags.clone(),
                writes: 1,
            },
        );
        Ok(())
    }

    async fn update_secret(&self, name: &str, value: &str) -> anyhow::Result<()> {
        let mut secrets = self.secrets.lock().unwrap();
        let stored = secrets
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("secret '{name}' does not exist"))?;
        stored.value = value.to_string();
        stored.writes += 1;
        Ok(())
    }

    async fn tag_secret(&self, name: &str, tags: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let mut secrets = self.secrets.lock().unwrap();
        let stored = secrets
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("secret '{name}' does not exist"))?;
        for (k, v) in tags {
            stored.tags.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}
