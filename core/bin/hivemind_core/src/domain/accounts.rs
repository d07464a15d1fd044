//! Account registry.
//!
//! Keeps the set of known account names in memory so that operations in a
//! block can reference accounts created earlier in the same block without
//! a database round-trip. Registration rows are staged and land with the
//! batch flush.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use hivemind_storage::chain::records::NewAccount;
use hivemind_storage::{QueryResult, StorageProcessor};

/// How stale an account row became.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyLevel {
    /// Profile metadata changed; everything is recomputed.
    Full,
    /// Post/vote counters changed.
    LiteStats,
    /// Reputation inputs changed.
    LiteRep,
}

#[derive(Debug, Default)]
pub struct Accounts {
    known: HashSet<String>,
    staged: Vec<NewAccount>,
    dirty: HashMap<String, DirtyLevel>,
}

impl Accounts {
    /// Prefetches the name registry; run once at startup.
    pub fn load(&mut self, names: Vec<String>) {
        self.known.extend(names);
    }

    /// Registers any new names among `names`, tagged with `date`.
    /// Re-registration is a no-op.
    pub fn register<I>(&mut self, names: I, date: NaiveDateTime)
    where
        I: IntoIterator<Item = String>,
    {
        for name in names {
            if self.known.insert(name.clone()) {
                self.staged.push(NewAccount {
                    name,
                    created_at: date,
                });
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Marks an account for a cache refresh. A full mark is never
    /// downgraded by a later lite one.
    pub fn dirty(&mut self, name: &str, level: DirtyLevel) {
        let entry = self
            .dirty
            .entry(name.to_string())
            .or_insert(level);
        if level == DirtyLevel::Full {
            *entry = DirtyLevel::Full;
        }
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        storage.chain_schema().save_accounts(&self.staged).await?;
        self.staged.clear();
        // Dirty marks are consumed by the account-cache refresher, which
        // recomputes from committed state; dropping them here is safe.
        if !self.dirty.is_empty() {
            log::debug!("{} dirty account marks after batch", self.dirty.len());
            self.dirty.clear();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for staged in self.staged.drain(..) {
            self.known.remove(&staged.name);
        }
        self.dirty.clear();
    }

    #[cfg(test)]
    pub fn staged(&self) -> &[NewAccount] {
        &self.staged
    }
}
