use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::models::{DiscoveryResult, DiscoveryResultFlag, ThingUid};

use super::{InboxEntry, InboxStore};

/// Inbox change event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InboxEventKind,
    pub thing_uid: ThingUid,
    /// Snapshot of the result at the time of the event
    pub result: DiscoveryResult,
}

/// Kind of inbox change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboxEventKind {
    Added,
    Updated,
    FlagChanged,
    Removed,
    Approved,
}

/// Outcome of submitting a discovery result to the inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxOutcome {
    /// The thing was not known before and was inserted
    Added,
    /// A known thing was re-discovered with different data and replaced
    Updated,
    /// A known thing was re-discovered with identical data; only re-confirmed
    Unchanged,
}

/// Observer of inbox changes.
///
/// Listeners are notified synchronously, in registration order, after the
/// working set has been updated and persisted.
pub trait InboxListener: Send + Sync {
    fn on_inbox_event(&self, event: &InboxEvent);
}

/// Inbox statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxStats {
    pub total: usize,
    pub new: usize,
    pub ignored: usize,
}

/// The discovery inbox: a working set of discovery results keyed by thing UID.
///
/// Discovery services submit results with [`Inbox::add`]; a re-discovery of a
/// known thing is merged into the stored record instead of duplicated. An
/// operator reviews entries and either approves, ignores, or removes them.
/// Entries not re-confirmed by a finished scan can be purged.
///
/// The inbox itself is single-owner; callers that share it across tasks wrap
/// it in whatever synchronization fits their runtime.
pub struct Inbox {
    store: InboxStore,
    listeners: Vec<Box<dyn InboxListener>>,
}

impl Inbox {
    /// Create an in-memory inbox
    pub fn new() -> Self {
        Self {
            store: InboxStore::in_memory(),
            listeners: Vec::new(),
        }
    }

    /// Create an inbox backed by a JSON store file
    pub fn open<P: AsRef<Path>>(store_path: P) -> Result<Self> {
        Ok(Self {
            store: InboxStore::open(store_path)?,
            listeners: Vec::new(),
        })
    }

    /// Create an inbox on top of an existing store
    pub fn with_store(store: InboxStore) -> Self {
        Self {
            store,
            listeners: Vec::new(),
        }
    }

    /// Register a listener for inbox changes
    pub fn add_listener(&mut self, listener: Box<dyn InboxListener>) {
        self.listeners.push(listener);
    }

    /// Submit a discovery result.
    ///
    /// An unknown thing UID is inserted as a new entry. A known UID is merged
    /// via [`DiscoveryResult::merged_with`]; when the replacement record is
    /// structurally equal to the stored one, the entry is only re-confirmed
    /// and no event is published.
    pub fn add(&mut self, result: DiscoveryResult) -> Result<InboxOutcome> {
        let uid = result.thing_uid().clone();
        let now = Utc::now();

        if let Some(entry) = self.store.entries.get_mut(&uid) {
            let merged = entry.result.merged_with(&result)?;
            if merged == entry.result {
                entry.last_updated = now;
                self.store.save()?;
                debug!("discovery result '{}' re-confirmed, no change", uid);
                return Ok(InboxOutcome::Unchanged);
            }

            entry.result = merged.clone();
            entry.last_updated = now;
            debug!("discovery result '{}' updated by re-discovery", uid);
            self.publish(InboxEventKind::Updated, merged)?;
            Ok(InboxOutcome::Updated)
        } else {
            self.store.entries.insert(
                uid.clone(),
                InboxEntry {
                    result: result.clone(),
                    first_seen: now,
                    last_updated: now,
                },
            );
            info!("discovery result '{}' added to inbox", uid);
            self.publish(InboxEventKind::Added, result)?;
            Ok(InboxOutcome::Added)
        }
    }

    /// Get the current result for a thing, if present
    pub fn get(&self, uid: &ThingUid) -> Option<&DiscoveryResult> {
        self.store.entries.get(uid).map(|entry| &entry.result)
    }

    /// Get the inbox entry for a thing, including storage metadata
    pub fn entry(&self, uid: &ThingUid) -> Option<&InboxEntry> {
        self.store.entries.get(uid)
    }

    /// All inbox entries
    pub fn entries(&self) -> Vec<&InboxEntry> {
        self.store.entries.values().collect()
    }

    /// Mark a thing as ignored: it stays known so automatic processing of
    /// further discoveries is suppressed. Idempotent for an already ignored
    /// thing.
    pub fn ignore(&mut self, uid: &ThingUid) -> Result<()> {
        self.set_flag(uid, DiscoveryResultFlag::Ignored)
    }

    /// Return an ignored thing to operator review
    pub fn unignore(&mut self, uid: &ThingUid) -> Result<()> {
        self.set_flag(uid, DiscoveryResultFlag::New)
    }

    fn set_flag(&mut self, uid: &ThingUid, flag: DiscoveryResultFlag) -> Result<()> {
        let entry = self
            .store
            .entries
            .get_mut(uid)
            .ok_or_else(|| anyhow!("No inbox entry for thing '{}'", uid))?;

        if entry.result.flag() == flag {
            return Ok(());
        }

        let replacement = entry.result.with_flag(flag);
        entry.result = replacement.clone();
        info!("discovery result '{}' flag changed to {:?}", uid, flag);
        self.publish(InboxEventKind::FlagChanged, replacement)
    }

    /// Approve a result: remove it from the inbox and hand it to the caller,
    /// which turns it into a managed thing.
    pub fn approve(&mut self, uid: &ThingUid) -> Result<DiscoveryResult> {
        let entry = self
            .store
            .entries
            .remove(uid)
            .ok_or_else(|| anyhow!("No inbox entry for thing '{}'", uid))?;

        info!("discovery result '{}' approved", uid);
        self.publish(InboxEventKind::Approved, entry.result.clone())?;
        Ok(entry.result)
    }

    /// Remove a result from the inbox. A removed thing that is discovered
    /// again re-enters the inbox as a fresh `New` entry.
    pub fn remove(&mut self, uid: &ThingUid) -> Result<DiscoveryResult> {
        let entry = self
            .store
            .entries
            .remove(uid)
            .ok_or_else(|| anyhow!("No inbox entry for thing '{}'", uid))?;

        info!("discovery result '{}' removed from inbox", uid);
        self.publish(InboxEventKind::Removed, entry.result.clone())?;
        Ok(entry.result)
    }

    /// Purge entries of a binding that were not re-confirmed since `cutoff`.
    ///
    /// Ignored entries are never purged automatically; they stay known so
    /// that a later re-discovery remains suppressed. Returns the UIDs of the
    /// purged entries.
    pub fn purge_older_than(
        &mut self,
        binding_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ThingUid>> {
        let stale: Vec<ThingUid> = self
            .store
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.result.binding_id() == binding_id
                    && entry.last_updated < cutoff
                    && entry.result.flag() != DiscoveryResultFlag::Ignored
            })
            .map(|(uid, _)| uid.clone())
            .collect();

        for uid in &stale {
            if let Some(entry) = self.store.entries.remove(uid) {
                self.publish(InboxEventKind::Removed, entry.result)?;
            }
        }

        if !stale.is_empty() {
            info!(
                "purged {} stale discovery result(s) for binding '{}'",
                stale.len(),
                binding_id
            );
        }

        Ok(stale)
    }

    /// Inbox statistics
    pub fn stats(&self) -> InboxStats {
        let total = self.store.entries.len();
        let ignored = self
            .store
            .entries
            .values()
            .filter(|entry| entry.result.flag() == DiscoveryResultFlag::Ignored)
            .count();

        InboxStats {
            total,
            new: total - ignored,
            ignored,
        }
    }

    /// Events published within the last `hours` hours, oldest first
    pub fn recent_events(&self, hours: u32) -> Vec<InboxEvent> {
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        self.store
            .events
            .iter()
            .filter(|event| event.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    fn publish(&mut self, kind: InboxEventKind, result: DiscoveryResult) -> Result<()> {
        let event = InboxEvent {
            timestamp: Utc::now(),
            kind,
            thing_uid: result.thing_uid().clone(),
            result,
        };

        self.store.record_event(event.clone());
        self.store.save()?;

        for listener in &self.listeners {
            listener.on_inbox_event(&event);
        }

        Ok(())
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
