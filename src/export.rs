// ============================================================================
// File: src/export.rs
// Plain-text downloads for the debug panel and markdown answer export
// ============================================================================

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::Path;

use crate::citation::link_citations;
use crate::display::{publish_day, truncate_chars};
use crate::models::{DebugLogEntry, RemoteLogEntry};
use crate::session::SessionState;

/// What a `:save` command writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    SystemLog,
    RemoteLog,
    Prompt,
    Answer,
}

pub struct SessionExporter<'a> {
    session: &'a SessionState,
}

impl<'a> SessionExporter<'a> {
    pub fn new(session: &'a SessionState) -> Self {
        Self { session }
    }

    pub fn export(&self, kind: ExportKind, path: &Path) -> Result<()> {
        let content = self.render(kind);
        fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn render(&self, kind: ExportKind) -> String {
        let mut content = String::new();
        match kind {
            ExportKind::SystemLog => {
                self.write_banner(&mut content, "System log");
                write_system_log(&mut content, self.session.debug_log.entries());
            }
            ExportKind::RemoteLog => {
                self.write_banner(&mut content, "Server log");
                write_remote_log(
                    &mut content,
                    self.session.remote_stream_name.as_deref(),
                    &self.session.remote_logs,
                );
            }
            ExportKind::Prompt => {
                self.write_banner(&mut content, "Prompt");
                content.push_str(self.session.debug_log.prompt().unwrap_or("(no prompt saved)"));
                content.push('\n');
            }
            ExportKind::Answer => self.write_answer(&mut content),
        }
        content
    }

    fn write_banner(&self, content: &mut String, title: &str) {
        content.push_str(&format!("# {}\n", title));
        content.push_str(&format!("# Exported: {}\n\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    }

    fn write_answer(&self, content: &mut String) {
        let question = self.session.question.as_deref().unwrap_or("(no search yet)");
        content.push_str(&format!("# {}\n\n", question));
        content.push_str(&format!("**Date**: {}\n\n", Local::now().format("%Y-%m-%d %H:%M:%S")));

        if let Some(keywords) = &self.session.keywords {
            content.push_str(&format!("**Keywords**: {}\n\n", keywords.join(", ")));
        }

        content.push_str("## Answer\n\n");
        content.push_str(&link_citations(&self.session.answer, self.session.references()));
        content.push_str("\n\n");

        if let Some(references) = self.session.references() {
            content.push_str("## References\n\n");
            for (position, reference) in references.iter().enumerate() {
                let title = match reference.target() {
                    Some(link) => format!("[{}]({})", reference.title, link),
                    None => reference.title.clone(),
                };
                content.push_str(&format!("{}. {}", position + 1, title));
                let day = publish_day(&reference.publish_date);
                if !reference.author.is_empty() || !day.is_empty() {
                    content.push_str(&format!(" ({} {})", reference.author, day));
                }
                content.push('\n');
                if !reference.content.is_empty() {
                    content.push_str(&format!("   > {}\n", truncate_chars(&reference.content, 100)));
                }
            }
        }
    }
}

fn write_system_log<'e>(content: &mut String, entries: impl Iterator<Item = &'e DebugLogEntry>) {
    for entry in entries {
        content.push_str(&format!("[{}] [{}] {}\n", entry.timestamp, entry.kind, entry.message));
        if let Some(data) = &entry.data {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            for line in pretty.lines() {
                content.push_str(&format!("    {}\n", line));
            }
        }
    }
}

fn write_remote_log(content: &mut String, stream_name: Option<&str>, entries: &[RemoteLogEntry]) {
    content.push_str(&format!("# Stream: {}\n\n", stream_name.unwrap_or("(none)")));
    for entry in entries {
        content.push_str(&format!("[{}] {}\n", entry.timestamp, entry.message));
    }
}
