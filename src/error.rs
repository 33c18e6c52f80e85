//! # Error Types
//!
//! Typed errors for the failure classes that abort a run before any task
//! executes. Per-task execution failures are not errors in this sense; they
//! are recorded on the task itself and reported at the end of the run.

use thiserror::Error;

/// Fatal errors raised while loading configuration or building the plan.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A mandatory setting (or one half of a mandatory pair) is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configured secret store type has no backend implementation.
    #[error("unsupported secret store type '{0}'. Supported stores: {1}")]
    UnsupportedStore(String, String),

    /// A Confluent Cloud API call returned a non-2xx response. Carries the
    /// raw provider error text; never retried.
    #[error("Confluent Cloud request failed ({status}): {body}")]
    Directory { status: u16, body: String },

    /// A definition references a cluster id the directory does not know.
    #[error("definition '{sa_name}' references unknown cluster '{cluster_id}'")]
    UnknownCluster { sa_name: String, cluster_id: String },

    /// A definition wants REST proxy access on a cluster that has no
    /// designated REST proxy service account.
    #[error("no REST proxy service account is defined for cluster '{cluster_id}'")]
    MissingRestProxyUser { cluster_id: String },
}

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        SyncError::Config(msg.into())
    }
}
