//! # Task Executor
//!
//! Walks a [`Plan`] in dependency order: service accounts first, then API
//! keys, then secrets. Each successful create or delete also mutates the
//! run-scoped caches so later tasks in the same run resolve the new ids.
//! A failed task is recorded on the task itself and never halts the others;
//! the next run's diff picks up whatever was left incomplete.

use crate::ccloud::{DirectoryCache, ResourceDirectory};
use crate::config::SecretStoreConfig;
use crate::plan::{Plan, Task, TaskAction, TaskPayload};
use crate::restproxy::content_digest;
use crate::store::records::{
    SecretRecord, TAG_API_KEY, TAG_CLUSTER_ID, TAG_CLUSTER_NAME, TAG_ENV_ID, TAG_ENV_NAME,
    TAG_REST_PROXY_ACCESS, TAG_SA_ID, TAG_SA_NAME, TAG_SECRET_MANAGER, TAG_SECRET_MANAGER_VALUE,
    TAG_SYNC_NEEDED_FOR_RP,
};
use crate::store::{secret_name, SecretCache, SecretStore};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Outcome of one execution pass: every task with its final status, plus
/// whether any secret was written (which gates the REST proxy document pass).
#[derive(Debug, Default)]
pub struct RunReport {
    pub tasks: Vec<Task>,
    pub secrets_changed: bool,
}

impl RunReport {
    pub fn failed_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_failed()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.tasks.iter().any(Task::is_failed)
    }
}

pub struct Executor<'a> {
    directory: &'a dyn ResourceDirectory,
    store: &'a dyn SecretStore,
    directory_cache: &'a mut DirectoryCache,
    secret_cache: &'a mut SecretCache,
    store_config: &'a SecretStoreConfig,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl<'a> Executor<'a> {
    pub fn new(
        directory: &'a dyn ResourceDirectory,
        store: &'a dyn SecretStore,
        directory_cache: &'a mut DirectoryCache,
        secret_cache: &'a mut SecretCache,
        store_config: &'a SecretStoreConfig,
    ) -> Self {
        Self {
            directory,
            store,
            directory_cache,
            secret_cache,
            store_config,
        }
    }

    /// Run every task in order and return the finished report.
    pub async fn execute(mut self, plan: Plan) -> RunReport {
        let mut report = RunReport::default();

        for mut task in plan.sa_creates {
            task.start();
            match self.create_service_account(&task).await {
                Ok(msg) => task.succeed(msg),
                Err(err) => Self::record_failure(&mut task, &err),
            }
            report.tasks.push(task);
        }

        for mut task in plan.sa_deletes {
            task.start();
            match self.delete_service_account(&task).await {
                Ok(msg) => task.succeed(msg),
                Err(err) => Self::record_failure(&mut task, &err),
            }
            report.tasks.push(task);
        }

        for mut task in plan.api_key_creates {
            task.start();
            match self.create_api_key(&task).await {
                Ok(msg) => task.succeed(msg),
                Err(err) => Self::record_failure(&mut task, &err),
            }
            report.tasks.push(task);
        }

        for mut task in plan.api_key_deletes {
            task.start();
            match self.delete_api_key(&task).await {
                Ok(msg) => task.succeed(msg),
                Err(err) => Self::record_failure(&mut task, &err),
            }
            report.tasks.push(task);
        }

        for mut task in plan.secret_creates.into_iter().chain(plan.secret_updates) {
            task.start();
            match self.write_secret(&task).await {
                Ok(msg) => {
                    report.secrets_changed = true;
                    task.succeed(msg);
                }
                Err(err) => Self::record_failure(&mut task, &err),
            }
            report.tasks.push(task);
        }

        let failed = report.failed_tasks().len();
        if failed > 0 {
            warn!(
                "Execution finished with {} failed task(s) out of {}",
                failed,
                report.tasks.len()
            );
        } else {
            info!("Execution finished: {} task(s) succeeded", report.tasks.len());
        }
        report
    }

    fn record_failure(task: &mut Task, err: &anyhow::Error) {
        error!("Task failed ({task}): {err:#}");
        task.fail(format!("{err:#}"));
    }

    async fn create_service_account(&mut self, task: &Task) -> Result<String> {
        let TaskPayload::ServiceAccount {
            sa_name,
            description,
        } = &task.payload
        else {
            return Err(anyhow!("service account payload expected"));
        };
        let (sa, created) = self
            .directory
            .create_service_account(sa_name, description)
            .await?;
        let msg = if created {
            format!("Service account created as {}", sa.id)
        } else {
            format!("Service account already present as {}", sa.id)
        };
        self.directory_cache.insert_service_account(sa);
        Ok(msg)
    }

    async fn delete_service_account(&mut self, task: &Task) -> Result<String> {
        let TaskPayload::ServiceAccount { sa_name, .. } = &task.payload else {
            return Err(anyhow!("service account payload expected"));
        };
        let sa_id = self
            .directory_cache
            .find_service_account_by_name(sa_name)
            .map(|sa| sa.id.clone())
            .ok_or_else(|| anyhow!("service account '{sa_name}' is not in the directory"))?;
        if self.directory.delete_service_account(&sa_id).await? {
            self.directory_cache.remove_service_account(&sa_id);
            Ok(format!("Service account {sa_id} deleted"))
        } else {
            Err(anyhow!("directory refused to delete {sa_id}"))
        }
    }

    async fn create_api_key(&mut self, task: &Task) -> Result<String> {
        let TaskPayload::ApiKey {
            sa_name,
            cluster_id,
            env_id,
            ..
        } = &task.payload
        else {
            return Err(anyhow!("API key payload expected"));
        };
        // The owner may have been created moments ago by an earlier task in
        // this same run, so the id is resolved from the live cache.
        let owner_id = self
            .directory_cache
            .find_service_account_by_name(sa_name)
            .map(|sa| sa.id.clone())
            .ok_or_else(|| anyhow!("service account '{sa_name}' is not in the directory"))?;
        let description =
            format!("API key for service account {owner_id} managed by the CI/CD reconciler");
        let key = self
            .directory
            .create_api_key(env_id, cluster_id, &owner_id, &description)
            .await?;
        let msg = format!("API key {} created on {cluster_id}", key.id);
        self.directory_cache.insert_api_key(key);
        Ok(msg)
    }

    async fn delete_api_key(&mut self, task: &Task) -> Result<String> {
        let TaskPayload::ApiKey {
            api_key_id: Some(api_key_id),
            ..
        } = &task.payload
        else {
            return Err(anyhow!("delete task is missing the API key id"));
        };
        if self.directory.delete_api_key(api_key_id).await? {
            self.directory_cache.remove_api_key(api_key_id);
            Ok(format!("API key {api_key_id} deleted"))
        } else {
            Err(anyhow!("directory refused to delete API key {api_key_id}"))
        }
    }

    async fn write_secret(&mut self, task: &Task) -> Result<String> {
        let TaskPayload::Secret {
            sa_name,
            cluster_id,
            env_id,
            needs_rest_proxy_access,
            is_rest_proxy_user: _,
        } = &task.payload
        else {
            return Err(anyhow!("secret payload expected"));
        };
        let sa = self
            .directory_cache
            .find_service_account_by_name(sa_name)
            .cloned()
            .ok_or_else(|| anyhow!("service account '{sa_name}' is not in the directory"))?;

        // Only keys created within this run still carry their secret
        // material; anything older is unrecoverable and cannot be stored.
        let mut keys: Vec<_> = self
            .directory_cache
            .keys_for_owner_and_cluster(&sa.id, cluster_id)
            .into_iter()
            .filter(|k| k.secret.is_some())
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let key = keys
            .pop()
            .ok_or_else(|| anyhow!("no API key with retrievable secret material for {sa_name}~{cluster_id}"))?;
        let Some(secret_material) = key.secret.as_deref() else {
            return Err(anyhow!("API key {} lost its secret material", key.id));
        };

        let name = secret_name(
            &self.store_config.prefix,
            &self.store_config.separator,
            env_id,
            cluster_id,
            &sa.id,
            None,
        );
        let mut value_fields = BTreeMap::new();
        value_fields.insert("username".to_string(), key.id.clone());
        value_fields.insert("password".to_string(), secret_material.to_string());
        let value = serde_json::to_string(&value_fields)?;
        let tags = self.render_secret_tags(
            env_id,
            cluster_id,
            sa_name,
            &sa.id,
            &key.id,
            *needs_rest_proxy_access,
        );

        let msg = match task.action {
            TaskAction::Create => {
                self.store.create_secret(&name, &value, &tags).await?;
                format!("Secret '{name}' created with API key {}", key.id)
            }
            TaskAction::Update => {
                // Skip the value write when nothing changed; stores version
                // every write and the version history is bounded. Tags are
                // refreshed either way.
                let unchanged = match self.store.get_secret(&name).await? {
                    Some(old) => {
                        let old_fields: BTreeMap<String, String> =
                            serde_json::from_str(&old).unwrap_or_default();
                        content_digest(&old_fields) == content_digest(&value_fields)
                    }
                    None => false,
                };
                if unchanged {
                    info!("Secret '{}' already holds the current value", name);
                } else {
                    self.store.update_secret(&name, &value).await?;
                }
                self.store.tag_secret(&name, &tags).await?;
                format!("Secret '{name}' updated with API key {}", key.id)
            }
            TaskAction::Delete => return Err(anyhow!("secret deletion is not supported")),
        };

        self.secret_cache.insert(SecretRecord {
            secret_name: name,
            sa_id: sa.id,
            sa_name: sa_name.clone(),
            cluster_id: cluster_id.clone(),
            env_id: env_id.clone(),
            rest_proxy_access: *needs_rest_proxy_access,
            is_rest_proxy_user: false,
            api_key_id: key.id,
            sync_pending: *needs_rest_proxy_access,
        });
        Ok(msg)
    }

    fn render_secret_tags(
        &self,
        env_id: &str,
        cluster_id: &str,
        sa_name: &str,
        sa_id: &str,
        api_key_id: &str,
        rest_proxy_access: bool,
    ) -> BTreeMap<String, String> {
        let env_name = self
            .directory_cache
            .find_environment(env_id)
            .map(|e| e.display_name.clone())
            .unwrap_or_default();
        let cluster_name = self
            .directory_cache
            .find_cluster(cluster_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let mut tags = BTreeMap::new();
        tags.insert(TAG_SECRET_MANAGER.to_string(), TAG_SECRET_MANAGER_VALUE.to_string());
        tags.insert(TAG_ENV_NAME.to_string(), env_name);
        tags.insert(TAG_ENV_ID.to_string(), env_id.to_string());
        tags.insert(TAG_CLUSTER_NAME.to_string(), cluster_name);
        tags.insert(TAG_CLUSTER_ID.to_string(), cluster_id.to_string());
        tags.insert(TAG_SA_NAME.to_string(), sa_name.to_string());
        tags.insert(TAG_SA_ID.to_string(), sa_id.to_string());
        tags.insert(
            TAG_REST_PROXY_ACCESS.to_string(),
            render_bool(rest_proxy_access),
        );
        tags.insert(TAG_API_KEY.to_string(), api_key_id.to_string());
        tags.insert(
            TAG_SYNC_NEEDED_FOR_RP.to_string(),
            render_bool(rest_proxy_access),
        );
        tags
    }
}

/// Tag consumers expect `True`/`False` capitalization.
pub(crate) fn render_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}
