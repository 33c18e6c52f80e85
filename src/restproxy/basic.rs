//! # Basic-Auth User Table
//!
//! Newline-separated lines of the form `<username>: <password>,krp-users`.
//! Parsed into a sorted map so rendering is deterministic and a parse/render
//! round-trip is byte-identical.

use std::collections::BTreeMap;

/// Role suffix the REST proxy expects on every basic-auth line.
pub const ROLE_SUFFIX: &str = "krp-users";

/// Parse the user table. Blank lines are skipped; a line without the role
/// suffix is still split on its first colon so older hand-edited entries
/// survive a round-trip.
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let mut users = BTreeMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let entry = line
            .split_once(&format!(",{ROLE_SUFFIX}"))
            .map_or(line, |(before, _)| before);
        if let Some((username, password)) = entry.split_once(':') {
            users.insert(username.trim().to_string(), password.trim().to_string());
        }
    }
    users
}

pub fn render(users: &BTreeMap<String, String>) -> String {
    users
        .iter()
        .map(|(username, password)| format!("{username}: {password},{ROLE_SUFFIX}"))
        .collect::<Vec<_>>()
        .join("\n")
}
