//! # REST Proxy Credential Documents
//!
//! The REST proxy authenticates callers against a shared per-cluster secret
//! holding two text sub-documents: a basic-auth user table and a JAAS login
//! configuration. This module parses both formats, upserts individual
//! username/password entries without disturbing unrelated ones, and pushes
//! the merged document back to the store with at most one write per cluster.

pub mod basic;
pub mod document;
pub mod jaas;
pub mod sync;

pub use document::{content_digest, RestProxyDocument, BASIC_FIELD, JAAS_FIELD};
pub use sync::sync_rest_proxy_secrets;
