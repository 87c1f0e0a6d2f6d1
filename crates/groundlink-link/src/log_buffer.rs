use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::config::DEFAULT_LOG_CAPACITY;

/// One decoded telemetry frame, formatted for display.
///
/// Only produced by a successful decode of a registered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Dialect message name, e.g. `GLOBAL_POSITION_INT`.
    pub message_name: String,
    /// CRC_EXTRA byte of the message definition.
    pub magic_number: u8,
    /// Receive time.
    pub timestamp: DateTime<Utc>,
    /// Decoded message fields.
    pub payload: serde_json::Value,
}

impl LogEntry {
    /// Receive time as ISO-8601 with millisecond precision, e.g.
    /// `2024-05-01T12:00:00.000Z`.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Whether this entry is an acknowledgement message (`*_ACK`).
    pub fn is_ack(&self) -> bool {
        self.message_name.ends_with("_ACK")
    }
}

/// `MSG_NAME(MAGIC)::TIMESTAMP::JSON_PAYLOAD`
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})::{}::{}",
            self.message_name,
            self.magic_number,
            self.timestamp_iso(),
            self.payload
        )
    }
}

/// Bounded telemetry log plus an unread list drained by polling.
///
/// Both lists are capped at the same capacity and evict their oldest entry
/// first. A drain takes the whole unread list under one lock, so an entry
/// is returned by exactly one drain.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    inner: Mutex<Lists>,
}

#[derive(Debug, Default)]
struct Lists {
    entries: VecDeque<LogEntry>,
    unread: VecDeque<LogEntry>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// Create a buffer retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Lists::default()),
        }
    }

    /// Append an entry to the log and to the unread list.
    pub fn push(&self, entry: LogEntry) {
        let mut lists = self.lock();
        if lists.entries.len() == self.capacity {
            lists.entries.pop_front();
        }
        if lists.unread.len() == self.capacity {
            lists.unread.pop_front();
        }
        lists.unread.push_back(entry.clone());
        lists.entries.push_back(entry);
    }

    /// Take every unread entry, oldest first, leaving the unread list empty.
    pub fn drain_unread(&self) -> Vec<LogEntry> {
        let unread = std::mem::take(&mut self.lock().unread);
        unread.into()
    }

    /// Copy of the retained log, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Most recent entry, if any.
    pub fn latest(&self) -> Option<LogEntry> {
        self.lock().entries.back().cloned()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Number of entries waiting for the next drain.
    pub fn unread_len(&self) -> usize {
        self.lock().unread.len()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        // A panic while holding the lock cannot leave the lists inconsistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
