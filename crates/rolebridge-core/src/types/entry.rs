//! Directory entry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only view of one directory record.
///
/// Attribute names are matched case-insensitively, as LDAP does. An entry is
/// owned by the query that fetched it and dropped before that query returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished Name
    pub dn: String,

    /// Attribute values, all multi-valued
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style attribute setter, replacing any previous values
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    fn lookup(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, values)| values)
        })
    }

    /// Whether the entry carries the attribute at all
    pub fn contains_attribute(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All values of an attribute; empty if absent
    pub fn values(&self, name: &str) -> &[String] {
        self.lookup(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of an attribute
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}
