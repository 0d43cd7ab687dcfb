//! Shared state for the command shell, the session controller and the interceptor

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::activity::{ActivityLog, FocusStats, RequestLogEntry};
use crate::filter::{BlockEntry, BlockList};
use crate::page::MessageSet;
use crate::Result;

/// State shared by handle between the shell, the [`crate::SessionController`]
/// and every [`crate::InterceptionHandler`].
///
/// The blocklist is an immutable snapshot swapped on add/remove, so classification
/// never observes a half-updated list. The activity log and its counter sit behind
/// one mutex.
#[derive(Debug)]
pub struct SessionContext {
    blocklist: RwLock<Arc<BlockList>>,
    messages: Arc<MessageSet>,
    activity: Mutex<ActivityLog>,
}

impl SessionContext {
    pub fn new(blocklist: BlockList, messages: MessageSet, log_capacity: usize) -> Self {
        Self {
            blocklist: RwLock::new(Arc::new(blocklist)),
            messages: Arc::new(messages),
            activity: Mutex::new(ActivityLog::new(log_capacity)),
        }
    }

    /// Current blocklist snapshot
    pub fn blocklist(&self) -> Arc<BlockList> {
        self.blocklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add an entry, rejecting duplicate names. Returns the new snapshot.
    pub fn add_entry(&self, entry: BlockEntry) -> Result<Arc<BlockList>> {
        let mut guard = self
            .blocklist
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let updated = Arc::new(guard.with_added(entry)?);
        *guard = updated.clone();
        Ok(updated)
    }

    /// Remove entries by name (case-insensitive). Returns the new snapshot and whether
    /// anything was removed.
    pub fn remove_entry(&self, name: &str) -> (Arc<BlockList>, bool) {
        let mut guard = self
            .blocklist
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (list, removed) = guard.without(name);
        let updated = Arc::new(list);
        *guard = updated.clone();
        (updated, removed)
    }

    pub fn messages(&self) -> &MessageSet {
        &self.messages
    }

    fn activity(&self) -> MutexGuard<'_, ActivityLog> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an outcome to the rolling log (and bump the counter when blocked)
    pub fn record(&self, entry: RequestLogEntry) {
        self.activity().record(entry);
    }

    pub fn reset_activity(&self) {
        self.activity().reset();
    }

    pub fn block_count(&self) -> u64 {
        self.activity().block_count()
    }

    pub fn stats(&self) -> FocusStats {
        self.activity().stats()
    }

    /// The `n` most recent log entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<RequestLogEntry> {
        self.activity().recent(n)
    }

    pub fn log_len(&self) -> usize {
        self.activity().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FocusError;
    use chrono::Utc;

    fn context() -> SessionContext {
        SessionContext::new(BlockList::default(), MessageSet::default(), 100)
    }

    #[test]
    fn test_add_list_remove_round_trip() {
        let ctx = context();
        ctx.add_entry(BlockEntry::new("Test", "test.com").unwrap())
            .unwrap();
        assert!(ctx.blocklist().contains_name("Test"));
        assert!(ctx.blocklist().is_blocked("www.test.com"));

        let (_, removed) = ctx.remove_entry("Test");
        assert!(removed);
        assert!(ctx.blocklist().is_empty());
    }

    #[test]
    fn test_duplicate_add_leaves_list_unchanged() {
        let ctx = context();
        ctx.add_entry(BlockEntry::new("Test", "test.com").unwrap())
            .unwrap();
        let before = ctx.blocklist();

        let result = ctx.add_entry(BlockEntry::new("test", "other.com").unwrap());
        assert!(matches!(result, Err(FocusError::DuplicateName(_))));
        assert_eq!(*ctx.blocklist(), *before);
    }

    #[test]
    fn test_old_snapshot_unaffected_by_swap() {
        let ctx = context();
        let snapshot = ctx.blocklist();
        ctx.add_entry(BlockEntry::new("X", "x.com").unwrap()).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(ctx.blocklist().len(), 1);
    }

    #[test]
    fn test_concurrent_records() {
        let ctx = Arc::new(context());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        ctx.record(RequestLogEntry::blocked(
                            Utc::now(),
                            format!("{}-{}.com", t, i),
                            "m",
                        ));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ctx.block_count(), 400);
        assert_eq!(ctx.log_len(), 100);
    }
}
