//! Observed resource types, keyed by their cloud-assigned identifiers.

use chrono::{DateTime, Utc};

/// A Confluent Cloud environment.
#[derive(Debug, Clone)]
pub struct Environment {
    pub id: String,
    pub display_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A Kafka cluster inside an environment.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub env_id: String,
    pub name: String,
    pub cloud: String,
    pub availability: String,
    pub region: String,
    pub bootstrap_endpoint: String,
}

/// A service account as observed in the directory.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set when the id appears in the ignore-list or the name matches a
    /// platform-internal prefix. Ignored accounts are invisible to the diff
    /// and protected from deletion.
    pub is_ignored: bool,
}

/// A Kafka API key.
///
/// `secret` is populated only on the key returned by a create call; the
/// platform never returns it again. A key whose secret was lost has to be
/// rotated, not re-read.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: String,
    pub secret: Option<String>,
    pub owner_id: String,
    pub cluster_id: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}
