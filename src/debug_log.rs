// ============================================================================
// File: src/debug_log.rs
// Bounded in-memory debug log shown in the debug panel
// ============================================================================

use chrono::Local;
use serde_json::Value;
use std::collections::VecDeque;

use crate::models::DebugLogEntry;

/// Number of entries kept; older entries are dropped first.
pub const MAX_DEBUG_ENTRIES: usize = 1000;

/// Entry tags used across the application
pub mod kind {
    pub const INFO: &str = "info";
    pub const REQUEST: &str = "request";
    pub const RESPONSE: &str = "response";
    pub const STREAM: &str = "stream";
    pub const PARSE_ERROR: &str = "parse_error";
    pub const ERROR: &str = "error";
    pub const TIMING: &str = "timing";
    pub const REMOTE: &str = "remote";
}

#[derive(Debug, Default)]
pub struct DebugLog {
    entries: VecDeque<DebugLogEntry>,
    prompt: Option<String>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, kind: &str, message: impl Into<String>, data: Option<Value>) {
        let entry = DebugLogEntry {
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            kind: kind.to_string(),
            message: message.into(),
            data,
        };
        tracing::debug!(kind = %entry.kind, data = ?entry.data, "{}", entry.message);

        self.entries.push_back(entry);
        while self.entries.len() > MAX_DEBUG_ENTRIES {
            self.entries.pop_front();
        }
    }

    /// Drops every entry and the saved prompt.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.prompt = None;
    }

    pub fn save_prompt(&mut self, text: impl Into<String>) {
        self.prompt = Some(text.into());
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DebugLogEntry> {
        self.entries.iter()
    }

    /// The last `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &DebugLogEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
