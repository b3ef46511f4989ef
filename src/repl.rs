// ============================================================================
// File: src/repl.rs
// Parsing of interactive input into commands
// ============================================================================

use std::path::PathBuf;

use crate::export::ExportKind;

pub const DEFAULT_LOG_COUNT: usize = 50;

#[derive(Debug, PartialEq)]
pub enum Command {
    Search(String),
    Logs(usize),
    /// `None` uses the configured limit
    Remote(Option<usize>),
    Prompt,
    Save(ExportKind, PathBuf),
    Clear,
    Secrets,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = input.strip_prefix(':') else {
            return Command::Search(input.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("logs", []) => Command::Logs(DEFAULT_LOG_COUNT),
            ("logs", [count]) => match count.parse::<usize>() {
                Ok(count) => Command::Logs(count),
                Err(_) => Command::Invalid(format!("'{}' is not a number", count)),
            },
            ("remote", []) => Command::Remote(None),
            ("remote", [count]) => match count.parse::<usize>() {
                Ok(count) if count > 0 => Command::Remote(Some(count)),
                _ => Command::Invalid(format!("'{}' is not a positive number", count)),
            },
            ("prompt", []) => Command::Prompt,
            ("save", [target, path]) => match parse_export_kind(target) {
                Some(kind) => Command::Save(kind, PathBuf::from(path)),
                None => Command::Invalid(format!(
                    "unknown download '{}', expected logs, remote, prompt or answer",
                    target
                )),
            },
            ("save", _) => Command::Invalid("usage: :save logs|remote|prompt|answer <path>".to_string()),
            ("clear", []) => Command::Clear,
            ("secrets", []) => Command::Secrets,
            ("help", _) => Command::Help,
            ("quit", []) | ("exit", []) | ("q", []) => Command::Quit,
            _ => Command::Invalid(format!("unknown command ':{}'", rest)),
        }
    }
}

fn parse_export_kind(target: &str) -> Option<ExportKind> {
    match target {
        "logs" => Some(ExportKind::SystemLog),
        "remote" => Some(ExportKind::RemoteLog),
        "prompt" => Some(ExportKind::Prompt),
        "answer" => Some(ExportKind::Answer),
        _ => None,
    }
}
