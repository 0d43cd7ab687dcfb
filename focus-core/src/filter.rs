//! Host blocking rules and matching

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FocusError;
use crate::Result;

/// A named host-blocking rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Host")]
    pub host: String,
}

impl BlockEntry {
    /// Create a validated entry. The host is trimmed, lowercased and stripped of a trailing dot.
    pub fn new(name: impl Into<String>, host: impl AsRef<str>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(FocusError::Configuration(
                "Block entry name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            host: normalize_host(host.as_ref())?,
        })
    }

    /// Exact or proper-subdomain match, ASCII case-insensitive
    pub fn matches(&self, host: &str) -> bool {
        host_matches(host, &self.host)
    }
}

fn normalize_host(raw: &str) -> Result<String> {
    let host = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let invalid = host.is_empty()
        || host.contains("://")
        || host.contains('/')
        || host.starts_with('.')
        || host.chars().any(char::is_whitespace);
    if invalid {
        return Err(FocusError::InvalidHost(raw.trim().to_string()));
    }
    Ok(host)
}

fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host).as_bytes();
    let domain = domain.as_bytes();
    if host.is_empty() || domain.is_empty() {
        return false;
    }
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    // "." + domain must be a proper suffix
    host.len() > domain.len()
        && host[host.len() - domain.len() - 1] == b'.'
        && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
}

/// Check whether `host` is blocked by any of `entries`.
///
/// A host is blocked when it equals an entry's host or is a subdomain of it,
/// ignoring ASCII case. `notfacebook.com` is not blocked by `facebook.com`.
pub fn is_blocked<'a>(host: &str, entries: impl IntoIterator<Item = &'a BlockEntry>) -> bool {
    entries.into_iter().any(|entry| entry.matches(host))
}

/// Ordered set of block entries with case-insensitively unique names.
///
/// Lists are treated as immutable snapshots: `with_added` and `without` build a new
/// list so readers holding the previous one are never disturbed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    entries: Vec<BlockEntry>,
}

impl BlockList {
    /// Build a list from possibly untrusted entries (e.g. loaded from disk).
    ///
    /// Entries with invalid hosts or duplicate names are skipped with a warning.
    pub fn from_entries(entries: impl IntoIterator<Item = BlockEntry>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            match BlockEntry::new(entry.name.clone(), &entry.host) {
                Ok(valid) if !list.contains_name(&valid.name) => list.entries.push(valid),
                Ok(dup) => warn!("Skipping duplicate block entry '{}'", dup.name),
                Err(e) => warn!("Skipping block entry '{}': {}", entry.name, e),
            }
        }
        list
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Return a new list with `entry` appended, rejecting duplicate names.
    pub fn with_added(&self, entry: BlockEntry) -> Result<Self> {
        if self.contains_name(&entry.name) {
            return Err(FocusError::DuplicateName(entry.name));
        }
        let mut entries = self.entries.clone();
        entries.push(entry);
        Ok(Self { entries })
    }

    /// Return a new list without the entries named `name`, and whether any were removed.
    pub fn without(&self, name: &str) -> (Self, bool) {
        let entries: Vec<BlockEntry> = self
            .entries
            .iter()
            .filter(|e| !e.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .collect();
        let removed = entries.len() != self.entries.len();
        (Self { entries }, removed)
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        is_blocked(host, &self.entries)
    }

    /// First entry matching `host`
    pub fn matching(&self, host: &str) -> Option<&BlockEntry> {
        self.entries.iter().find(|e| e.matches(host))
    }
}

impl<'a> IntoIterator for &'a BlockList {
    type Item = &'a BlockEntry;
    type IntoIter = std::slice::Iter<'a, BlockEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
