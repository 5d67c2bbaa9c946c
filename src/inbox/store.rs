use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DiscoveryResult, ThingUid};

use super::InboxEvent;

/// Maximum number of events kept in the store history
pub const MAX_EVENT_HISTORY: usize = 1000;

/// Discovery result with storage metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEntry {
    pub result: DiscoveryResult,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Store metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: "1.0.0".to_string(),
            created_at: now,
            last_modified: now,
        }
    }
}

/// Persistent inbox state.
///
/// The store holds the working set of discovery results keyed by thing UID,
/// a bounded event history, and metadata. In-memory by default; when opened
/// with a path it loads existing state and saves back after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxStore {
    /// Path to the store file, None for an in-memory store
    #[serde(skip)]
    store_path: Option<PathBuf>,

    /// Discovery results indexed by thing UID
    pub entries: HashMap<ThingUid, InboxEntry>,

    /// Inbox change history, most recent last
    pub events: Vec<InboxEvent>,

    /// Store metadata
    pub metadata: StoreMetadata,
}

impl InboxStore {
    /// Create an in-memory store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            store_path: None,
            entries: HashMap::new(),
            events: Vec::new(),
            metadata: StoreMetadata::default(),
        }
    }

    /// Open a file-backed store, loading existing state if the file exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::in_memory()
        };
        store.store_path = Some(path);
        Ok(store)
    }

    /// Default store location under the user's home directory
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".thingscan").join("inbox.json"))
    }

    /// Load store from file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read inbox store file: {}", path.display()))?;

        let store: Self = serde_json::from_str(&content)
            .with_context(|| "Failed to parse inbox store file")?;

        Ok(store)
    }

    /// Save the store to its file; a no-op for in-memory stores
    pub(crate) fn save(&mut self) -> Result<()> {
        self.metadata.last_modified = Utc::now();

        let Some(path) = self.store_path.clone() else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(self)
            .with_context(|| "Failed to serialize inbox store")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write inbox store file: {}", path.display()))?;

        Ok(())
    }

    /// Append an event to the history, dropping the oldest beyond the cap
    pub(crate) fn record_event(&mut self, event: InboxEvent) {
        self.events.push(event);
        if self.events.len() > MAX_EVENT_HISTORY {
            let excess = self.events.len() - MAX_EVENT_HISTORY;
            self.events.drain(..excess);
        }
    }
}

impl Default for InboxStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
