//! Rolling request log and blocked-attempt counter

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Minutes assumed saved per blocked attempt
pub const MINUTES_SAVED_PER_BLOCK: f64 = 1.5;

/// Outcome of a classified request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Blocked,
    Allowed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Blocked => "Blocked",
            RequestStatus::Allowed => "Allowed",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            RequestStatus::Blocked => "🔒",
            RequestStatus::Allowed => "✅",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub time: DateTime<Utc>,
    pub host: String,
    pub status: RequestStatus,
    /// Message shown on the substitute page, empty for allowed requests
    pub message: String,
}

impl RequestLogEntry {
    pub fn blocked(
        time: DateTime<Utc>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            time,
            host: host.into(),
            status: RequestStatus::Blocked,
            message: message.into(),
        }
    }

    pub fn allowed(time: DateTime<Utc>, host: impl Into<String>) -> Self {
        Self {
            time,
            host: host.into(),
            status: RequestStatus::Allowed,
            message: String::new(),
        }
    }

    /// One line for the `log` command: `🔒 14:02:11 15-10 | host | Blocked | "message"`
    pub fn display_line(&self) -> String {
        let mut line = format!(
            "{} {} | {:<25} {:<7}",
            self.status.icon(),
            self.time.with_timezone(&Local).format("%H:%M:%S %d-%m"),
            self.host,
            self.status.as_str(),
        );
        if !self.message.trim().is_empty() {
            line.push_str(&format!(" | \"{}\"", self.message));
        }
        line
    }
}

/// Snapshot of the counters for the `stats` command
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FocusStats {
    pub blocked_attempts: u64,
    pub estimated_minutes_saved: f64,
}

impl FocusStats {
    pub fn from_block_count(blocked_attempts: u64) -> Self {
        Self {
            blocked_attempts,
            estimated_minutes_saved: blocked_attempts as f64 * MINUTES_SAVED_PER_BLOCK,
        }
    }
}

/// Fixed-capacity FIFO of request outcomes plus the blocked-attempt counter.
///
/// Not synchronized on its own; [`crate::SessionContext`] keeps it behind a mutex so
/// the counter and the buffer are always updated together.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<RequestLogEntry>,
    capacity: usize,
    block_count: u64,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            block_count: 0,
        }
    }

    /// Append an outcome, evicting the oldest entry when full.
    /// Blocked entries also bump the counter.
    pub fn record(&mut self, entry: RequestLogEntry) {
        if entry.status == RequestStatus::Blocked {
            self.block_count += 1;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Clear the buffer and the counter (start of a session)
    pub fn reset(&mut self) {
        self.entries.clear();
        self.block_count = 0;
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RequestLogEntry> {
        self.entries.iter()
    }

    /// The `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<RequestLogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> FocusStats {
        FocusStats::from_block_count(self.block_count)
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(i: usize) -> RequestLogEntry {
        RequestLogEntry::allowed(Utc::now(), format!("host{}.com", i))
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut log = ActivityLog::new(100);
        for i in 0..105 {
            log.record(allowed(i));
        }

        assert_eq!(log.len(), 100);
        let hosts: Vec<String> = log.entries().map(|e| e.host.clone()).collect();
        for i in 0..5 {
            assert!(!hosts.contains(&format!("host{}.com", i)));
        }
        let expected: Vec<String> = (5..105).map(|i| format!("host{}.com", i)).collect();
        assert_eq!(hosts, expected);
    }

    #[test]
    fn test_block_count_survives_eviction() {
        let mut log = ActivityLog::new(2);
        for i in 0..5 {
            log.record(RequestLogEntry::blocked(Utc::now(), format!("b{}.com", i), "m"));
        }
        log.record(allowed(9));
        assert_eq!(log.block_count(), 5);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut log = ActivityLog::default();
        for i in 0..30 {
            log.record(allowed(i));
        }
        let tail = log.recent(20);
        assert_eq!(tail.len(), 20);
        assert_eq!(tail[0].host, "host10.com");
        assert_eq!(tail[19].host, "host29.com");
        assert_eq!(ActivityLog::default().recent(20).len(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut log = ActivityLog::default();
        log.record(RequestLogEntry::blocked(Utc::now(), "x.com", "m"));
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.block_count(), 0);
    }

    #[test]
    fn test_stats_estimate() {
        let stats = FocusStats::from_block_count(4);
        assert_eq!(stats.blocked_attempts, 4);
        assert!((stats.estimated_minutes_saved - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_line() {
        let blocked = RequestLogEntry::blocked(Utc::now(), "x.com", "Focus now");
        let line = blocked.display_line();
        assert!(line.starts_with("🔒 "));
        assert!(line.contains("Blocked"));
        assert!(line.ends_with("| \"Focus now\""));

        let line = RequestLogEntry::allowed(Utc::now(), "docs.rs").display_line();
        assert!(line.contains("Allowed"));
        assert!(!line.contains('"'));
    }
}
