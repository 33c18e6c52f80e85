//! # Shared Credential Document
//!
//! One secret value per cluster, holding the basic-auth table and the JAAS
//! block as two JSON fields. The upsert contract is the same for both
//! sub-documents: identical pair is a no-op, differing password overwrites,
//! unknown username inserts. Writes are suppressed entirely when the content
//! digest is unchanged, because the store versions every write.

use crate::restproxy::{basic, jaas::JaasBlock};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// JSON field holding the basic-auth user table.
pub const BASIC_FIELD: &str = "basic.txt";

/// JSON field holding the JAAS login configuration.
pub const JAAS_FIELD: &str = "restProxyUsers.jaas";

/// SHA-256 over the canonical JSON rendering of a field map. `BTreeMap`
/// serializes in key order, so equal maps always hash equal.
pub fn content_digest(fields: &BTreeMap<String, String>) -> String {
    let canonical = serde_json::to_string(fields).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The parsed two-field document for one cluster.
#[derive(Debug, Clone)]
pub struct RestProxyDocument {
    basic_users: BTreeMap<String, String>,
    jaas: JaasBlock,
}

impl RestProxyDocument {
    /// Start an empty document for a cluster that has none yet.
    pub fn fresh(basic_auth_path: &str) -> Self {
        Self {
            basic_users: BTreeMap::new(),
            jaas: JaasBlock::fresh(basic_auth_path),
        }
    }

    /// Parse the stored JSON fields. A missing field falls back to its fresh
    /// form so a half-written document can still be repaired.
    pub fn parse(fields: &BTreeMap<String, String>, basic_auth_path: &str) -> Result<Self> {
        let basic_users = fields
            .get(BASIC_FIELD)
            .map(|text| basic::parse(text))
            .unwrap_or_default();
        let jaas = match fields.get(JAAS_FIELD) {
            Some(text) if !text.is_empty() => JaasBlock::parse(text)?,
            _ => JaasBlock::fresh(basic_auth_path),
        };
        Ok(Self { basic_users, jaas })
    }

    /// Upsert one credential into both sub-documents. Returns whether
    /// anything actually changed.
    pub fn upsert(&mut self, username: &str, password: &str) -> bool {
        let mut changed = false;
        for table in [&mut self.basic_users, &mut self.jaas.users] {
            match table.get(username) {
                Some(existing) if existing == password => {}
                _ => {
                    table.insert(username.to_string(), password.to_string());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Render back to the stored JSON field map.
    pub fn render(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(BASIC_FIELD.to_string(), basic::render(&self.basic_users));
        fields.insert(JAAS_FIELD.to_string(), self.jaas.render());
        fields
    }

    /// `<basic-count>--<jaas-count>`, stored as a tag on the shared secret
    /// for operators to spot drift between the two sub-documents at a glance.
    pub fn api_keys_count(&self) -> String {
        format!("{}--{}", self.basic_users.len(), self.jaas.users.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_AUTH_PATH: &str = "/mnt/secrets/rest-proxy-users/basic.txt";

    #[test]
    fn test_upsert_reports_no_change_for_identical_pair() {
        let mut doc = RestProxyDocument::fresh(BASIC_AUTH_PATH);
        assert!(doc.upsert("k1", "s1"));
        let before = content_digest(&doc.render());
        assert!(!doc.upsert("k1", "s1"));
        assert_eq!(content_digest(&doc.render()), before);
    }

    #[test]
    fn test_upsert_overwrites_differing_password() {
        let mut doc = RestProxyDocument::fresh(BASIC_AUTH_PATH);
        doc.upsert("k1", "s1");
        assert!(doc.upsert("k1", "s2"));

        let fields = doc.render();
        assert_eq!(fields[BASIC_FIELD], "k1: s2,krp-users");
        let jaas = &fields[JAAS_FIELD];
        assert_eq!(jaas.matches("username=\"k1\"").count(), 1);
        assert!(jaas.contains("password=\"s2\";"));
    }

    #[test]
    fn test_upsert_inserts_unknown_username() {
        let mut doc = RestProxyDocument::fresh(BASIC_AUTH_PATH);
        doc.upsert("k1", "s1");
        assert!(doc.upsert("k2", "s2"));
        assert_eq!(doc.api_keys_count(), "2--2");
    }

    #[test]
    fn test_parse_render_round_trip() {
        let mut doc = RestProxyDocument::fresh(BASIC_AUTH_PATH);
        doc.upsert("k1", "s1");
        doc.upsert("k2", "s2");
        let fields = doc.render();

        let reparsed =
            RestProxyDocument::parse(&fields, BASIC_AUTH_PATH).expect("document parses");
        assert_eq!(reparsed.render(), fields);
    }

    #[test]
    fn test_parse_of_empty_fields_yields_fresh_document() {
        let doc = RestProxyDocument::parse(&BTreeMap::new(), BASIC_AUTH_PATH)
            .expect("empty document parses");
        assert_eq!(doc.api_keys_count(), "0--0");
    }

    #[test]
    fn test_digest_is_order_insensitive() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), "1".to_string());
        a.insert("y".to_string(), "2".to_string());
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), "2".to_string());
        b.insert("x".to_string(), "1".to_string());
        assert_eq!(content_digest(&a), content_digest(&b));
    }
}
