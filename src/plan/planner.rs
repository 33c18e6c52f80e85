//! # Reconciliation Planner
//!
//! Pure set arithmetic between the desired definitions and the observed
//! caches. The planner never talks to the outside world: given the same
//! snapshot it always produces the same plan, which is what makes repeated
//! runs idempotent.
//!
//! The one rule that is easy to get wrong: an API key whose secret is gone
//! from the store can never be recovered, because the platform returns the
//! secret material exactly once, at creation. Such keys are forced back into
//! the create set so they get rotated. See [`Planner::plan_api_keys`].

use crate::ccloud::DirectoryCache;
use crate::config::{CCloudConfig, ClusterScope, Definitions};
use crate::error::SyncError;
use crate::plan::task::{CompositeKey, Task, TaskAction, TaskPayload};
use crate::store::SecretCache;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The ordered outcome of one planning pass.
#[derive(Debug, Default)]
pub struct Plan {
    pub sa_creates: Vec<Task>,
    pub sa_deletes: Vec<Task>,
    pub api_key_creates: Vec<Task>,
    pub api_key_deletes: Vec<Task>,
    pub secret_creates: Vec<Task>,
    pub secret_updates: Vec<Task>,
}

impl Plan {
    /// Tasks in execution order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.sa_creates
            .iter()
            .chain(&self.sa_deletes)
            .chain(&self.api_key_creates)
            .chain(&self.api_key_deletes)
            .chain(&self.secret_creates)
            .chain(&self.secret_updates)
    }

    pub fn len(&self) -> usize {
        self.all_tasks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.all_tasks().next().is_none()
    }
}

/// Computes the minimal change set for one run.
#[derive(Debug)]
pub struct Planner<'a> {
    definitions: &'a Definitions,
    config: &'a CCloudConfig,
    directory: &'a DirectoryCache,
    secrets: &'a SecretCache,
}

impl<'a> Planner<'a> {
    pub fn new(
        definitions: &'a Definitions,
        config: &'a CCloudConfig,
        directory: &'a DirectoryCache,
        secrets: &'a SecretCache,
    ) -> Self {
        Self {
            definitions,
            config,
            directory,
            secrets,
        }
    }

    /// Check the planning invariants that must hold before any task runs:
    /// every referenced cluster exists, and every cluster that needs REST
    /// proxy access has a designated REST proxy account.
    pub fn validate(&self) -> Result<(), SyncError> {
        for sa in &self.definitions.service_accounts {
            if let ClusterScope::List(clusters) = &sa.clusters {
                for cluster_id in clusters {
                    if self.directory.find_cluster(cluster_id).is_none() {
                        return Err(SyncError::UnknownCluster {
                            sa_name: sa.name.clone(),
                            cluster_id: cluster_id.clone(),
                        });
                    }
                }
            }
        }
        for sa in &self.definitions.service_accounts {
            if !sa.rest_proxy_access {
                continue;
            }
            for cluster_id in self.expand_clusters(&sa.clusters) {
                if self
                    .definitions
                    .rest_proxy_user_for_cluster(&cluster_id)
                    .is_none()
                {
                    return Err(SyncError::MissingRestProxyUser { cluster_id });
                }
            }
        }
        Ok(())
    }

    /// Build the full ordered plan.
    pub fn plan(&self) -> Result<Plan, SyncError> {
        self.validate()?;
        let mut plan = Plan::default();
        self.plan_service_accounts(&mut plan);
        self.plan_api_keys(&mut plan);
        info!("Planned {} task(s)", plan.len());
        Ok(plan)
    }

    fn desired_sa_names(&self) -> BTreeSet<String> {
        self.definitions
            .service_accounts
            .iter()
            .map(|sa| sa.name.clone())
            .collect()
    }

    fn expand_clusters(&self, scope: &ClusterScope) -> Vec<String> {
        match scope {
            ClusterScope::All => {
                let mut ids: Vec<String> = self.directory.clusters.keys().cloned().collect();
                ids.sort();
                ids
            }
            ClusterScope::List(list) => list.clone(),
        }
    }

    fn plan_service_accounts(&self, plan: &mut Plan) {
        let desired = self.desired_sa_names();
        let observed: BTreeSet<String> = self.directory.observed_sa_names().into_iter().collect();

        for name in desired.difference(&observed) {
            // validated: every desired name has a definition
            let Some(def) = self.definitions.find(name) else {
                continue;
            };
            plan.sa_creates.push(Task::new(
                TaskAction::Create,
                TaskPayload::ServiceAccount {
                    sa_name: def.name.clone(),
                    description: def.description.clone(),
                },
            ));
        }

        // The delete set is always computed; whether it becomes tasks is a
        // config decision. Ignored accounts never make the set at all.
        let ignored = self.directory.ignored_sa_names();
        let to_delete: Vec<&String> = observed
            .difference(&desired)
            .filter(|name| !ignored.contains(*name))
            .collect();
        if !self.config.enable_sa_cleanup {
            if !to_delete.is_empty() {
                debug!(
                    "{} service account(s) eligible for deletion but enable_sa_cleanup is off",
                    to_delete.len()
                );
            }
            return;
        }
        for name in to_delete {
            plan.sa_deletes.push(Task::new(
                TaskAction::Delete,
                TaskPayload::ServiceAccount {
                    sa_name: name.clone(),
                    description: String::new(),
                },
            ));
        }
    }

    /// Every (account, cluster) pair the definitions ask for.
    fn api_keys_in_def(&self) -> BTreeSet<CompositeKey> {
        let mut composites = BTreeSet::new();
        for sa in &self.definitions.service_accounts {
            for cluster_id in self.expand_clusters(&sa.clusters) {
                composites.insert(CompositeKey::new(sa.name.clone(), cluster_id));
            }
        }
        composites
    }

    /// Every (account, cluster) pair that already has a live API key.
    fn api_keys_in_ccloud(&self) -> BTreeSet<CompositeKey> {
        let mut composites = BTreeSet::new();
        for sa in &self.definitions.service_accounts {
            let Some(observed) = self.directory.find_service_account_by_name(&sa.name) else {
                continue;
            };
            for key in self.directory.keys_for_owner(&observed.id) {
                composites.insert(CompositeKey::new(sa.name.clone(), key.cluster_id.clone()));
            }
        }
        composites
    }

    fn plan_api_keys(&self, plan: &mut Plan) {
        let in_def = self.api_keys_in_def();
        let in_ccloud = self.api_keys_in_ccloud();
        let secrets_in_store = self.secrets.composites();

        let mut create_api_keys_req: BTreeSet<CompositeKey> =
            in_def.difference(&in_ccloud).cloned().collect();
        let create_secrets_req: BTreeSet<CompositeKey> =
            in_def.difference(&secrets_in_store).cloned().collect();
        let update_secrets_req: BTreeSet<CompositeKey> = create_api_keys_req
            .intersection(&secrets_in_store)
            .cloned()
            .collect();

        // A secret is missing but the key itself still exists. The secret
        // material cannot be read back from the platform, so the only way to
        // get usable credentials into the store is to rotate: force the pair
        // back into the create set.
        let force_recreate: BTreeSet<CompositeKey> = create_secrets_req
            .difference(&create_api_keys_req)
            .filter(|composite| in_ccloud.contains(composite))
            .cloned()
            .collect();
        for composite in &force_recreate {
            info!(
                "API key for {} exists but its secret is gone from the store; forcing rotation",
                composite
            );
        }
        create_api_keys_req.extend(force_recreate);

        for composite in &create_api_keys_req {
            // validate() guarantees the cluster exists
            let Some(cluster) = self.directory.find_cluster(&composite.cluster_id) else {
                continue;
            };
            plan.api_key_creates.push(Task::new(
                TaskAction::Create,
                TaskPayload::ApiKey {
                    sa_name: composite.sa_name.clone(),
                    cluster_id: cluster.id.clone(),
                    env_id: cluster.env_id.clone(),
                    api_key_id: None,
                },
            ));
        }

        self.plan_api_key_deletes(plan, &in_def, &in_ccloud);
        self.plan_secrets(plan, &create_secrets_req, &update_secrets_req);
    }

    fn plan_api_key_deletes(
        &self,
        plan: &mut Plan,
        in_def: &BTreeSet<CompositeKey>,
        in_ccloud: &BTreeSet<CompositeKey>,
    ) {
        let ignored = self.directory.ignored_sa_names();
        let eligible: Vec<&CompositeKey> = in_ccloud
            .difference(in_def)
            .filter(|composite| !ignored.contains(&composite.sa_name))
            .collect();
        if !self.config.enable_api_key_cleanup {
            if !eligible.is_empty() {
                debug!(
                    "{} API key pairing(s) eligible for deletion but enable_api_key_cleanup is off",
                    eligible.len()
                );
            }
            return;
        }
        for composite in eligible {
            let Some(sa) = self
                .directory
                .find_service_account_by_name(&composite.sa_name)
            else {
                continue;
            };
            let Some(cluster) = self.directory.find_cluster(&composite.cluster_id) else {
                continue;
            };
            let mut keys = self
                .directory
                .keys_for_owner_and_cluster(&sa.id, &composite.cluster_id);
            keys.sort_by(|a, b| a.id.cmp(&b.id));
            for key in keys {
                plan.api_key_deletes.push(Task::new(
                    TaskAction::Delete,
                    TaskPayload::ApiKey {
                        sa_name: composite.sa_name.clone(),
                        cluster_id: cluster.id.clone(),
                        env_id: cluster.env_id.clone(),
                        api_key_id: Some(key.id.clone()),
                    },
                ));
            }
        }
    }

    fn plan_secrets(
        &self,
        plan: &mut Plan,
        create_secrets_req: &BTreeSet<CompositeKey>,
        update_secrets_req: &BTreeSet<CompositeKey>,
    ) {
        for (composites, action, out) in [
            (create_secrets_req, TaskAction::Create, &mut plan.secret_creates),
            (update_secrets_req, TaskAction::Update, &mut plan.secret_updates),
        ] {
            for composite in composites {
                let Some(def) = self.definitions.find(&composite.sa_name) else {
                    continue;
                };
                let Some(cluster) = self.directory.find_cluster(&composite.cluster_id) else {
                    continue;
                };
                out.push(Task::new(
                    action,
                    TaskPayload::Secret {
                        sa_name: composite.sa_name.clone(),
                        cluster_id: cluster.id.clone(),
                        env_id: cluster.env_id.clone(),
                        needs_rest_proxy_access: def.rest_proxy_access,
                        is_rest_proxy_user: def.is_rest_proxy_user,
                    },
                ));
            }
        }
    }
}
