//! Descriptors that are published but never downloaded.
//!
//! Some snapshot families are intentionally left out of the swarm; their
//! descriptors may still appear in provider documents.

use std::path::Path;

/// A family of descriptor names identified by base-name prefix and full-name
/// suffix. Both must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRule {
    pub prefix: String,
    pub suffixes: Vec<String>,
}

impl SkipRule {
    pub fn new(prefix: impl Into<String>, suffixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { prefix: prefix.into(), suffixes: suffixes.into_iter().map(Into::into).collect() }
    }

    /// The reserved commitment value and Elias-Fano index descriptors.
    pub fn commitment() -> Self {
        Self::new("commitment", [".v.torrent", ".ef.torrent"])
    }

    pub fn matches(&self, name: &str) -> bool {
        let base = Path::new(name).file_name().and_then(|n| n.to_str()).unwrap_or(name);
        base.starts_with(&self.prefix) && self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipPolicy {
    rules: Vec<SkipRule>,
}

impl SkipPolicy {
    pub fn new(rules: impl IntoIterator<Item = SkipRule>) -> Self {
        Self { rules: rules.into_iter().collect() }
    }

    /// Download everything.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// First rule that excludes `name`, if any.
    pub fn matching(&self, name: &str) -> Option<&SkipRule> {
        self.rules.iter().find(|rule| rule.matches(name))
    }

    pub fn rules(&self) -> &[SkipRule] {
        &self.rules
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::new([SkipRule::commitment()])
    }
}
