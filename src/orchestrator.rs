// ============================================================================
// File: src/orchestrator.rs
// Interactive session: searches, debug panel commands, downloads
// ============================================================================

use anyhow::Result;
use colored::*;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat_client::ChatClient;
use crate::config::{Config, Secrets};
use crate::debug_log::kind;
use crate::display::{self, TerminalAnswer};
use crate::export::{ExportKind, SessionExporter};
use crate::log_fetcher::RemoteLogFetcher;
use crate::repl::Command;
use crate::session::SessionState;
use crate::stream::{StreamEnd, StreamReducer};

pub struct SearchOrchestrator {
    config: Config,
    chat_client: ChatClient,
    log_fetcher: RemoteLogFetcher,
    secret_keys: Vec<&'static str>,
    session: SessionState,
}

impl SearchOrchestrator {
    pub fn new(config: Config, secrets: &Secrets) -> Result<Self> {
        let mut session = SessionState::new();
        session.debug_log.append(
            kind::INFO,
            "Session started",
            Some(serde_json::json!({
                "endpoint": config.search_endpoint,
                "diagnostics": config.diagnostics,
            })),
        );

        if let Some(reason) = &secrets.load_error {
            session.debug_log.append(
                kind::ERROR,
                "Secrets file ignored; using environment variables only",
                Some(serde_json::json!({ "error": reason })),
            );
        }

        let chat_client = ChatClient::new(&config)?;
        let log_fetcher =
            RemoteLogFetcher::from_credentials(secrets.credentials(), &config.log_group, &mut session.debug_log);

        Ok(Self {
            config,
            chat_client,
            log_fetcher,
            secret_keys: secrets.present_keys(),
            session,
        })
    }

    /// Read commands from stdin until `:quit` or end of input.
    pub async fn run_interactive(&mut self) -> Result<()> {
        display::print_header();
        if !self.log_fetcher.is_enabled() {
            display::print_warning("Server log viewer disabled (see :logs for the setup error)");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n{} ", "›".bright_cyan().bold());
            display::flush_stdout();

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match Command::parse(&line) {
                Command::Search(question) => self.search(&question).await,
                Command::Logs(count) => display::print_debug_entries(
                    self.session.debug_log.recent(count),
                    self.session.debug_log.len(),
                ),
                Command::Remote(limit) => self.refresh_remote_logs(limit).await,
                Command::Prompt => display::print_prompt(self.session.debug_log.prompt()),
                Command::Save(target, path) => self.save(target, &path),
                Command::Clear => {
                    self.session.debug_log.clear();
                    display::print_notice("System log and saved prompt cleared");
                }
                Command::Secrets => display::print_secrets(&self.secret_keys),
                Command::Help => display::print_help(),
                Command::Quit => break,
                Command::Empty => {}
                Command::Invalid(reason) => display::print_warning(&reason),
            }
        }

        println!("\n{} Bye", "✓".green().bold());
        Ok(())
    }

    /// Run one search to completion. Every failure is reported and swallowed.
    pub async fn search(&mut self, question: &str) {
        let mut reducer = StreamReducer::new(self.config.diagnostics);
        let mut answer = TerminalAnswer::start(question);

        reducer.begin(question, &mut self.session);
        let result = self
            .chat_client
            .stream_answer(question, &mut reducer, &mut self.session, &mut answer)
            .await;
        answer.finish();

        match result {
            Ok(end) => {
                if end == StreamEnd::EndOfBody {
                    display::print_warning("The answer stream ended without a completion marker");
                }
                if !self.session.has_answer() {
                    display::print_warning("No answer text was received");
                }
                if let Some(elapsed) = reducer.complete(&mut self.session) {
                    display::print_elapsed(elapsed);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search failed");
                reducer.fail(&mut self.session, &e.to_string());
                display::print_search_error(&e);
            }
        }

        tracing::debug!(phase = ?reducer.phase(), chars = self.session.answer.len(), "Search finished");

        // Only prints when the success path did not
        if let Some(elapsed) = reducer.take_elapsed() {
            display::print_elapsed(elapsed);
        }
    }

    async fn refresh_remote_logs(&mut self, limit: Option<usize>) {
        let limit = limit.unwrap_or(self.config.remote_log_limit);
        let batch = self
            .log_fetcher
            .fetch_latest(limit, &mut self.session.debug_log)
            .await;

        self.session.remote_stream_name = batch.stream_name;
        self.session.remote_logs = batch.entries;

        if !self.log_fetcher.is_enabled() {
            display::print_warning("Server log viewer is disabled: AWS secrets are incomplete");
        }
        display::print_remote_logs(
            self.session.remote_stream_name.as_deref(),
            &self.session.remote_logs,
        );
    }

    fn save(&mut self, target: ExportKind, path: &Path) {
        let result = SessionExporter::new(&self.session).export(target, path);
        match result {
            Ok(()) => display::print_notice(&format!("Saved to {}", path.display())),
            Err(e) => {
                display::print_warning(&format!("{:#}", e));
                self.session.debug_log.append(kind::ERROR, format!("Download failed: {:#}", e), None);
            }
        }
    }
}
