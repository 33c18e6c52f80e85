//! # Task Model
//!
//! One [`Task`] per pending change. Tasks are created by the planner, walked
//! in order by the executor, and never revisited: status transitions are
//! strictly `NotStarted -> InProgress -> Success | Failed`.

use serde::Serialize;
use std::fmt;

/// Identity of one (service account, cluster) pairing. API-key and secret
/// reconciliation is keyed on this pair; using a struct instead of a joined
/// string keeps names containing the display separator unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CompositeKey {
    pub sa_name: String,
    pub cluster_id: String,
}

impl CompositeKey {
    pub fn new(sa_name: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            sa_name: sa_name.into(),
            cluster_id: cluster_id.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.sa_name, self.cluster_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskAction::Create => "create",
            TaskAction::Update => "update",
            TaskAction::Delete => "delete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    ServiceAccount,
    ApiKey,
    Secret,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::ServiceAccount => "service-account",
            ObjectKind::ApiKey => "api-key",
            ObjectKind::Secret => "secret",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Typed task payload. Carries exactly the identifiers the executor needs;
/// resolved ids (which may not exist until an earlier task runs) are looked
/// up from the cache at execution time.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskPayload {
    ServiceAccount {
        sa_name: String,
        description: String,
    },
    ApiKey {
        sa_name: String,
        cluster_id: String,
        env_id: String,
        /// Set on delete tasks only: the concrete key being removed.
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key_id: Option<String>,
    },
    Secret {
        sa_name: String,
        cluster_id: String,
        env_id: String,
        needs_rest_proxy_access: bool,
        is_rest_proxy_user: bool,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            TaskPayload::ServiceAccount { .. } => ObjectKind::ServiceAccount,
            TaskPayload::ApiKey { .. } => ObjectKind::ApiKey,
            TaskPayload::Secret { .. } => ObjectKind::Secret,
        }
    }

    fn summary(&self) -> String {
        match self {
            TaskPayload::ServiceAccount { sa_name, .. } => sa_name.clone(),
            TaskPayload::ApiKey {
                sa_name,
                cluster_id,
                api_key_id,
                ..
            } => match api_key_id {
                Some(id) => format!("{sa_name}~{cluster_id} ({id})"),
                None => format!("{sa_name}~{cluster_id}"),
            },
            TaskPayload::Secret {
                sa_name, cluster_id, ..
            } => format!("{sa_name}~{cluster_id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub action: TaskAction,
    pub kind: ObjectKind,
    pub status: TaskStatus,
    pub status_message: String,
    pub payload: TaskPayload,
}

impl Task {
    pub fn new(action: TaskAction, payload: TaskPayload) -> Self {
        Self {
            action,
            kind: payload.kind(),
            status: TaskStatus::NotStarted,
            status_message: "Waiting to start".to_string(),
            payload,
        }
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.status, TaskStatus::NotStarted);
        self.status = TaskStatus::InProgress;
        self.status_message = "Running".to_string();
    }

    pub fn succeed(&mut self, message: impl Into<String>) {
        debug_assert_eq!(self.status, TaskStatus::InProgress);
        self.status = TaskStatus::Success;
        self.status_message = message.into();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        debug_assert_eq!(self.status, TaskStatus::InProgress);
        self.status = TaskStatus::Failed;
        self.status_message = message.into();
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} {:<16} {:<12} {:<40} {}",
            self.action.to_string(),
            self.kind.to_string(),
            self.status.to_string(),
            self.status_message,
            self.payload.summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_display() {
        let key = CompositeKey::new("svc-a", "lkc-1");
        assert_eq!(key.to_string(), "svc-a~lkc-1");
    }

    #[test]
    fn test_composite_key_ordering_is_by_name_then_cluster() {
        let mut keys = vec![
            CompositeKey::new("svc-b", "lkc-1"),
            CompositeKey::new("svc-a", "lkc-2"),
            CompositeKey::new("svc-a", "lkc-1"),
        ];
        keys.sort();
        assert_eq!(keys[0], CompositeKey::new("svc-a", "lkc-1"));
        assert_eq!(keys[2], CompositeKey::new("svc-b", "lkc-1"));
    }

    #[test]
    fn test_task_status_lifecycle() {
        let mut task = Task::new(
            TaskAction::Create,
            TaskPayload::ServiceAccount {
                sa_name: "svc-a".to_string(),
                description: "Service A".to_string(),
            },
        );
        assert_eq!(task.status, TaskStatus::NotStarted);
        task.start();
        assert_eq!(task.status, TaskStatus::InProgress);
        task.succeed("done");
        assert_eq!(task.status, TaskStatus::Success);
        assert!(!task.is_failed());
    }
}
