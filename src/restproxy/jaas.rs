//! # JAAS Login Configuration Block
//!
//! The `restProxyUsers.jaas` sub-document: a verbatim prefix (everything up
//! to and including the `KafkaClient {` section opener), one fixed-template
//! stanza per user, and a closing `};`. Entries are content-addressed by
//! username, so rendering sorts stanzas rather than preserving original
//! document order.

use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Section marker separating the untouched prefix from the user stanzas.
const SECTION_MARKER: &str = "KafkaClient";

/// Required-module header opening every user stanza.
const MODULE_HEADER: &str = "org.apache.kafka.common.security.plain.PlainLoginModule required";

const CLOSING: &str = "};\n";

/// A parsed JAAS block: opaque prefix plus the username/password entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JaasBlock {
    prefix: String,
    pub users: BTreeMap<String, String>,
}

impl JaasBlock {
    /// A block for a cluster that has no shared document yet. The prefix
    /// wires the REST proxy's own basic-auth file in before the
    /// `KafkaClient` section.
    pub fn fresh(basic_auth_path: &str) -> Self {
        let prefix = format!(
            "KafkaRest {{\n    org.eclipse.jetty.jaas.spi.PropertyFileLoginModule required\n    debug=\"true\"\n    file=\"{basic_auth_path}\";\n}};\n\n{SECTION_MARKER} {{\n"
        );
        Self {
            prefix,
            users: BTreeMap::new(),
        }
    }

    /// Parse an existing block. Everything before the section marker is kept
    /// verbatim; each stanza after it yields its first two quoted strings as
    /// username and password.
    pub fn parse(text: &str) -> Result<Self> {
        let (before, after) = text
            .split_once(SECTION_MARKER)
            .ok_or_else(|| anyhow!("JAAS document has no '{SECTION_MARKER}' section"))?;
        let quoted = Regex::new(r#""(.*?)""#)
            .map_err(|e| anyhow!("Failed to compile regex: {e}"))?;

        let mut users = BTreeMap::new();
        // The first fragment is the opening brace before any stanza.
        for stanza in after.split(MODULE_HEADER).skip(1) {
            let mut values = quoted
                .captures_iter(stanza)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()));
            let (Some(username), Some(password)) = (values.next(), values.next()) else {
                return Err(anyhow!(
                    "JAAS stanza is missing its quoted username/password pair"
                ));
            };
            users.insert(username, password);
        }
        Ok(Self {
            prefix: format!("{before}{SECTION_MARKER} {{\n"),
            users,
        })
    }

    pub fn render(&self) -> String {
        let mut out = self.prefix.clone();
        for (username, password) in &self.users {
            out.push_str(&format!(
                "  {MODULE_HEADER}\n  username=\"{username}\"\n  password=\"{password}\";\n\n"
            ));
        }
        out.push_str(CLOSING);
        out
    }
}
