//! Blocklist and message persistence
//!
//! Both files live in the data directory as pretty-printed JSON:
//! - `blocked_sites.json`: array of `{ "name": ..., "host": ... }`
//! - `messages.json`: array of strings
//!
//! A missing file is created with the defaults. A file that cannot be read or parsed
//! is left alone and the defaults are used for this run.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::FocusError;
use crate::filter::{BlockEntry, BlockList};
use crate::page::{default_messages, MessageSet};
use crate::Result;

pub const BLOCKLIST_FILE: &str = "blocked_sites.json";
pub const MESSAGES_FILE: &str = "messages.json";

/// Blocklist shipped with a fresh install
pub fn default_blocklist() -> BlockList {
    BlockList::from_entries(
        [
            ("X", "x.com"),
            ("Facebook", "facebook.com"),
            ("Facebook WWW", "www.facebook.com"),
            ("Instagram", "instagram.com"),
            ("Instagram WWW", "www.instagram.com"),
        ]
        .into_iter()
        .map(|(name, host)| BlockEntry {
            name: name.to_string(),
            host: host.to_string(),
        }),
    )
}

/// File-backed storage for the blocklist and motivational messages
#[derive(Debug, Clone)]
pub struct FocusStore {
    data_dir: PathBuf,
}

impl FocusStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|e| {
            FocusError::Persistence(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn blocklist_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKLIST_FILE)
    }

    pub fn messages_path(&self) -> PathBuf {
        self.data_dir.join(MESSAGES_FILE)
    }

    /// Load the blocklist, falling back to the defaults. Never fails.
    pub fn load_blocklist(&self) -> BlockList {
        let defaults = default_blocklist();
        let path = self.blocklist_path();
        match self.load_or_init::<Vec<BlockEntry>, _>(&path, defaults.entries()) {
            Some(entries) => BlockList::from_entries(entries),
            None => defaults,
        }
    }

    pub fn save_blocklist(&self, list: &BlockList) -> Result<()> {
        write_json(&self.blocklist_path(), list.entries())
    }

    /// Load the message set, falling back to the defaults. Never fails.
    pub fn load_messages(&self) -> MessageSet {
        let path = self.messages_path();
        let messages = self
            .load_or_init::<Vec<String>, _>(&path, &default_messages())
            .and_then(|messages| match MessageSet::new(messages) {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!("{} in {}, using defaults", e, path.display());
                    None
                }
            })
            .unwrap_or_default();
        debug!("Loaded {} messages", messages.len());
        messages
    }

    /// `Some(value)` when the file parsed, `None` when the caller should use defaults.
    /// A missing file is initialised with `defaults`.
    fn load_or_init<T, D>(&self, path: &Path, defaults: &D) -> Option<T>
    where
        T: DeserializeOwned,
        D: Serialize + ?Sized,
    {
        if !path.exists() {
            match write_json(path, defaults) {
                Ok(()) => info!("Created {} with defaults", path.display()),
                Err(e) => warn!("Could not write defaults to {}: {}", path.display(), e),
            }
            return None;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}, using defaults", path.display(), e);
                return None;
            }
        };

        // `null` is treated like a corrupt file
        match serde_json::from_str::<Option<T>>(&content) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                warn!("{} is empty, using defaults", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                None
            }
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|e| {
        FocusError::Persistence(format!("Failed to write {}: {}", path.display(), e))
    })
}
