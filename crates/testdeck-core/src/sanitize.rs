//! Share-link output filtering.
//!
//! Reports shared publicly or behind a password must not carry user
//! identifiers, contact details or internal bookkeeping. The filter walks the
//! JSON tree and keeps its shape; only offending keys change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dimension::UNASSIGNED_KEY;

/// How a report is being viewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareLinkMode {
    Public,
    PasswordProtected,
    #[default]
    Authenticated,
}

impl ShareLinkMode {
    pub fn is_restricted(self) -> bool {
        !matches!(self, Self::Authenticated)
    }
}

/// Keys whose object value describes a person.
const USER_KEYS: [&str; 4] = ["user", "executedBy", "assignedTo", "creator"];

/// Removed wherever they appear.
const SENSITIVE_KEYS: [&str; 7] = [
    "email",
    "ipAddress",
    "internalId",
    "auditLog",
    "integrationConfig",
    "apiKey",
    "apiToken",
];

const FALLBACK_NAME: &str = "User";

/// Stable `User N` labels, first encounter first.
#[derive(Debug, Default)]
struct Pseudonyms {
    assigned: HashMap<String, String>,
}

impl Pseudonyms {
    fn label(&mut self, name: &str) -> String {
        let next = self.assigned.len() + 1;
        self.assigned
            .entry(name.to_owned())
            .or_insert_with(|| format!("User {next}"))
            .clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SensitiveDataFilter {
    mode: ShareLinkMode,
    anonymize: bool,
}

impl SensitiveDataFilter {
    pub fn new(mode: ShareLinkMode) -> Self {
        Self {
            mode,
            anonymize: false,
        }
    }

    /// Replace user names with `User 1`, `User 2`, ... in restricted modes.
    pub fn with_anonymize(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    /// Filter one response. Authenticated views pass through untouched.
    pub fn filter(&self, mut value: Value) -> Value {
        if !self.mode.is_restricted() {
            return value;
        }
        let mut names = Pseudonyms::default();
        self.scrub(&mut value, false, &mut names);
        value
    }

    fn scrub(&self, value: &mut Value, user_like: bool, names: &mut Pseudonyms) {
        match value {
            Value::Object(map) => {
                map.retain(|k, _| !SENSITIVE_KEYS.contains(&k.as_str()));
                if user_like {
                    self.scrub_user(map, names);
                }
                for (key, child) in map.iter_mut() {
                    let child_user_like = USER_KEYS.contains(&key.as_str());
                    self.scrub(child, child_user_like, names);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.scrub(item, user_like, names);
                }
            }
            _ => {}
        }
    }

    fn scrub_user(&self, map: &mut Map<String, Value>, names: &mut Pseudonyms) {
        // The none bucket names nobody.
        if map.get(UNASSIGNED_KEY).and_then(Value::as_bool) == Some(true) {
            return;
        }
        map.remove("id");
        let name = match map.get("name").and_then(Value::as_str) {
            Some(name) if self.anonymize => names.label(name),
            Some(name) => name.to_owned(),
            None => FALLBACK_NAME.to_owned(),
        };
        map.insert("name".to_owned(), Value::String(name));
    }
}
