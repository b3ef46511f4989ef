// ============================================================================
// File: src/session.rs
// State owned by one interactive session
// ============================================================================

use crate::debug_log::DebugLog;
use crate::models::{Reference, RemoteLogEntry};

/// Everything one REPL session accumulates.
///
/// Search fields are reset when a new search starts. The debug log lives for
/// the whole session unless the user clears it.
#[derive(Debug, Default)]
pub struct SessionState {
    pub answer: String,
    pub prompt: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub references: Option<Vec<Reference>>,
    /// Question of the last search, kept for the answer export
    pub question: Option<String>,
    pub debug_log: DebugLog,
    pub remote_logs: Vec<RemoteLogEntry>,
    pub remote_stream_name: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_search(&mut self, question: &str) {
        self.answer.clear();
        self.prompt = None;
        self.keywords = None;
        self.references = None;
        self.question = Some(question.to_string());
    }

    pub fn references(&self) -> Option<&[Reference]> {
        self.references.as_deref()
    }

    pub fn has_answer(&self) -> bool {
        !self.answer.is_empty()
    }
}
