// ============================================================================
// File: src/display.rs
// Terminal rendering: streaming answer, reference cards, debug panel
// ============================================================================

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

use crate::chat_client::SearchError;
use crate::debug_log::kind;
use crate::models::{DebugLogEntry, Reference, RemoteLogEntry};
use crate::stream::StreamSink;

const SUMMARY_CHARS: usize = 100;

/// Streams the answer to stdout as it grows.
///
/// Text is printed incrementally while each update extends the previous
/// one. When references arrive and earlier numbers turn into links, the
/// printed text can no longer be patched in place, so the final linked
/// answer is printed again by [`TerminalAnswer::finish`].
pub struct TerminalAnswer {
    spinner: Option<ProgressBar>,
    latest: String,
    diverged: bool,
    keywords: Vec<String>,
    references: Vec<Reference>,
}

impl TerminalAnswer {
    pub fn start(question: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Searching: {}", question));

        Self {
            spinner: Some(spinner),
            latest: String::new(),
            diverged: false,
            keywords: Vec::new(),
            references: Vec::new(),
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Ends the live area and prints everything that was deferred.
    pub fn finish(&mut self) {
        self.stop_spinner();
        if !self.latest.is_empty() {
            println!();
        }
        if self.diverged {
            println!("\n{}", "Answer with sources".green().bold());
            println!("{}", "─".repeat(40).bright_black());
            println!("{}", self.latest);
        }
        if !self.keywords.is_empty() {
            print_keywords(&self.keywords);
        }
        if !self.references.is_empty() {
            print_reference_cards(&self.references);
        }
    }
}

impl StreamSink for TerminalAnswer {
    fn first_token(&mut self) {
        self.stop_spinner();
        println!("\n{} {}", "●".bright_cyan(), "Answer".bright_white().bold());
        println!("{}", "─".repeat(40).bright_black());
    }

    fn answer_updated(&mut self, rendered: &str) {
        match rendered.strip_prefix(self.latest.as_str()) {
            Some(delta) => {
                print!("{}", delta);
                flush_stdout();
            }
            None => self.diverged = true,
        }
        self.latest = rendered.to_string();
    }

    fn keywords_received(&mut self, keywords: &[String]) {
        self.keywords = keywords.to_vec();
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("Keywords: {}", keywords.join(", ")));
        }
    }

    fn references_received(&mut self, references: &[Reference]) {
        self.references = references.to_vec();
    }
}

/// Push partial output to the terminal. A failed flush only delays output.
pub fn flush_stdout() {
    if let Err(e) = std::io::stdout().flush() {
        tracing::debug!(error = %e, "stdout flush failed");
    }
}

pub fn print_header() {
    println!("{}", "\n═══════════════════════════════════════".bright_blue());
    println!("{}", "        NEWSROOM AI SEARCH".bright_white().bold());
    println!("{}", "═══════════════════════════════════════".bright_blue());
    println!(
        "Type a question to search, or {} for commands.\n",
        ":help".cyan()
    );
}

pub fn print_help() {
    let commands = [
        (":logs [N]", "show the last N system log entries (default 50)"),
        (":remote [N]", "refresh and show the latest server log stream"),
        (":prompt", "show the prompt of the last answer"),
        (":save logs|remote|prompt|answer <path>", "write a plain-text download"),
        (":clear", "clear the system log and saved prompt"),
        (":secrets", "show which secret keys were found"),
        (":quit", "exit"),
    ];
    println!("\n{}", "Commands".green().bold());
    for (command, description) in commands {
        println!("  {:<42} {}", command.cyan(), description);
    }
    println!();
}

pub fn print_keywords(keywords: &[String]) {
    println!("\n{} {}", "Keywords:".green().bold(), keywords.join(", ").yellow());
}

pub fn print_reference_cards(references: &[Reference]) {
    println!(
        "\n{} {}",
        "▼".yellow(),
        format!("References ({})", references.len()).bright_white().bold()
    );
    for (position, reference) in references.iter().enumerate() {
        println!("{}", "─".repeat(40).bright_black());
        for line in reference_card(position + 1, reference) {
            println!("{}", line);
        }
    }
}

/// Plain lines of one reference card, numbered by list position.
pub fn reference_card(number: usize, reference: &Reference) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", number, reference.title)];
    let byline = match (reference.author.is_empty(), publish_day(&reference.publish_date)) {
        (false, "") => reference.author.clone(),
        (false, day) => format!("{} · {}", reference.author, day),
        (true, day) => day.to_string(),
    };
    if !byline.is_empty() {
        lines.push(format!("    {}", byline));
    }
    if !reference.content.is_empty() {
        lines.push(format!("    {}", truncate_chars(&reference.content, SUMMARY_CHARS)));
    }
    if let Some(link) = reference.target() {
        lines.push(format!("    {}", link));
    }
    lines
}

/// Date part of an ISO-8601 date-time.
pub fn publish_day(publish_date: &str) -> &str {
    match publish_date.char_indices().nth(10) {
        Some((cut, _)) => &publish_date[..cut],
        None => publish_date,
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

pub fn print_elapsed(elapsed: Duration) {
    println!(
        "\n{} {}",
        "⏱".blue().bold(),
        format!("Elapsed: {:.2}s", elapsed.as_secs_f64()).bright_black()
    );
}

pub fn print_search_error(error: &SearchError) {
    let label = match error {
        SearchError::Timeout => "Timeout",
        SearchError::Http { .. } => "HTTP error",
        SearchError::Network(_) => "Connection error",
        SearchError::Stream(_) => "Stream error",
        SearchError::Unexpected(_) => "Error",
    };
    println!("\n{} {}: {}", "✗".red().bold(), label.red().bold(), error);
}

pub fn print_debug_entries<'a>(entries: impl Iterator<Item = &'a DebugLogEntry>, total: usize) {
    println!("\n{} {}", "System log".green().bold(), format!("({} stored)", total).bright_black());
    println!("{}", "─".repeat(40).bright_black());
    let mut shown = 0;
    for entry in entries {
        let tag = format!("[{}]", entry.kind);
        let tag = if entry.kind == kind::ERROR || entry.kind == kind::PARSE_ERROR {
            tag.red()
        } else {
            tag.cyan()
        };
        println!("{} {} {}", entry.timestamp.bright_black(), tag, entry.message);
        if let Some(data) = &entry.data {
            println!("    {}", data.to_string().bright_black());
        }
        shown += 1;
    }
    if shown == 0 {
        println!("{}", "(empty)".bright_black());
    }
}

pub fn print_remote_logs(stream_name: Option<&str>, entries: &[RemoteLogEntry]) {
    println!(
        "\n{} {}",
        "Server log".green().bold(),
        stream_name.unwrap_or("(no stream)").bright_black()
    );
    println!("{}", "─".repeat(40).bright_black());
    if entries.is_empty() {
        println!("{}", "(no events)".bright_black());
    }
    for entry in entries {
        println!("{} {}", entry.timestamp.bright_black(), entry.message);
    }
}

pub fn print_prompt(prompt: Option<&str>) {
    println!("\n{}", "Prompt".green().bold());
    println!("{}", "─".repeat(40).bright_black());
    match prompt {
        Some(prompt) => println!("{}", prompt),
        None => println!("{}", "(no prompt saved yet)".bright_black()),
    }
}

pub fn print_secrets(present: &[&str]) {
    println!("\n{}", "Secrets".green().bold());
    for key in ["aws_access_key_id", "aws_secret_access_key", "aws_region"] {
        if present.contains(&key) {
            println!("  {} {} found", "✓".green(), key);
        } else {
            println!("  {} {} missing", "✗".red(), key);
        }
    }
}

pub fn print_notice(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}
