//! ccloud-secret-sync library
//!
//! Core functionality for reconciling declared Confluent Cloud service
//! accounts and API keys against the live platform and an AWS Secrets
//! Manager backend. The binary in `main.rs` is a thin CLI wrapper around
//! [`runner`].

pub mod ccloud;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod orphans;
pub mod plan;
pub mod restproxy;
pub mod runner;
pub mod scaffold;
pub mod store;
