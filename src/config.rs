// ============================================================================
// File: src/config.rs
// Configuration structures, secrets loading and validation
// ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure loaded from config.json
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Streaming chat/search endpoint (e.g., "https://api.example.com/chat/stream")
    pub search_endpoint: String,

    /// Fixed chat room identifier sent with every question
    pub chat_rooms_id: String,

    /// Upper bound on the whole search request, body included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Record stream diagnostics in the debug log
    #[serde(default = "default_diagnostics")]
    pub diagnostics: bool,

    /// CloudWatch log group holding the backend's logs
    #[serde(default)]
    pub log_group: String,

    /// Default number of remote log events to fetch
    #[serde(default = "default_remote_log_limit")]
    pub remote_log_limit: usize,
}

fn default_request_timeout_secs() -> u64 { 60 }
fn default_diagnostics() -> bool { true }
fn default_remote_log_limit() -> usize { 100 }

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.search_endpoint.is_empty() {
            return Err(anyhow::anyhow!("search_endpoint is required"));
        }

        if !self.search_endpoint.starts_with("http://") && !self.search_endpoint.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "search_endpoint must be an http(s) URL, got '{}'",
                self.search_endpoint
            ));
        }

        if self.chat_rooms_id.is_empty() {
            return Err(anyhow::anyhow!("chat_rooms_id is required"));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than zero"));
        }

        Ok(())
    }
}

/// Credentials for the log-aggregation service.
///
/// Read from a secrets file kept outside the config, with environment
/// variables filling any key the file leaves out.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Secrets {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: Option<String>,
    /// Why the secrets file was ignored, if it was
    #[serde(skip)]
    pub load_error: Option<String>,
}

/// Complete credential set; only exists when every key was found.
#[derive(Debug, Clone)]
pub struct LogServiceCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl Secrets {
    /// Never fails; the remote log viewer is optional. A missing file is
    /// silently skipped, an unreadable one is recorded in `load_error`.
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut secrets = Self::read_file(path).unwrap_or_else(|e| {
            let reason = format!("{:#}", e);
            tracing::warn!(error = %reason, "Ignoring secrets file");
            Secrets {
                load_error: Some(reason),
                ..Secrets::default()
            }
        });
        secrets.fill_from(lookup);
        secrets
    }

    fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Secrets::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {}", path.display()))
    }

    fn fill_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let slots = [
            (&mut self.aws_access_key_id, "AWS_ACCESS_KEY_ID"),
            (&mut self.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY"),
            (&mut self.aws_region, "AWS_REGION"),
        ];
        for (slot, var) in slots {
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = lookup(var).filter(|value| !value.is_empty());
            }
        }
    }

    /// Names of the secret keys that are present, never their values.
    pub fn present_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.aws_access_key_id.is_some() {
            keys.push("aws_access_key_id");
        }
        if self.aws_secret_access_key.is_some() {
            keys.push("aws_secret_access_key");
        }
        if self.aws_region.is_some() {
            keys.push("aws_region");
        }
        keys
    }

    pub fn credentials(&self) -> Option<LogServiceCredentials> {
        Some(LogServiceCredentials {
            access_key_id: self.aws_access_key_id.clone()?,
            secret_access_key: self.aws_secret_access_key.clone()?,
            region: self.aws_region.clone()?,
        })
    }
}
