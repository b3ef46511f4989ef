// ============================================================================
// File: src/log_fetcher.rs
// Fetches the latest backend log stream from CloudWatch Logs
// ============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_cloudwatchlogs::types::OrderBy;
use aws_sdk_cloudwatchlogs::Client;
use chrono::DateTime;
use serde_json::json;
use std::sync::Arc;

use crate::config::LogServiceCredentials;
use crate::debug_log::{kind, DebugLog};
use crate::models::RemoteLogEntry;

/// Raw event as returned by the log service
#[derive(Debug, Clone)]
pub struct RawLogEvent {
    pub timestamp_ms: Option<i64>,
    pub message: String,
}

/// The two queries the fetcher needs from a log-aggregation service.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Name of the stream with the most recent event, if the group has any.
    async fn latest_stream(&self, log_group: &str) -> Result<Option<String>>;

    /// Up to `limit` events of one stream, in service order.
    async fn stream_events(&self, log_group: &str, stream: &str, limit: usize) -> Result<Vec<RawLogEvent>>;
}

/// CloudWatch Logs backed source
pub struct CloudWatchLogSource {
    client: Client,
}

impl CloudWatchLogSource {
    pub fn new(credentials: &LogServiceCredentials) -> Self {
        let config = aws_sdk_cloudwatchlogs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "newsroom-search-secrets",
            ))
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl LogSource for CloudWatchLogSource {
    async fn latest_stream(&self, log_group: &str) -> Result<Option<String>> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(1)
            .send()
            .await
            .with_context(|| format!("DescribeLogStreams failed for {}", log_group))?;

        Ok(output
            .log_streams()
            .first()
            .and_then(|stream| stream.log_stream_name())
            .map(str::to_string))
    }

    #[allow(deprecated)] // `interleaved` is ignored by the service but still accepted
    async fn stream_events(&self, log_group: &str, stream: &str, limit: usize) -> Result<Vec<RawLogEvent>> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let output = self
            .client
            .filter_log_events()
            .log_group_name(log_group)
            .log_stream_names(stream)
            .limit(limit)
            .interleaved(true)
            .send()
            .await
            .with_context(|| format!("FilterLogEvents failed for {}/{}", log_group, stream))?;

        Ok(output
            .events()
            .iter()
            .map(|event| RawLogEvent {
                timestamp_ms: event.timestamp(),
                message: event.message().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

/// Result of one remote log refresh
#[derive(Debug, Default)]
pub struct RemoteLogBatch {
    pub stream_name: Option<String>,
    pub entries: Vec<RemoteLogEntry>,
}

pub struct RemoteLogFetcher {
    source: Option<Arc<dyn LogSource>>,
    log_group: String,
}

impl RemoteLogFetcher {
    pub fn new(source: Arc<dyn LogSource>, log_group: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            log_group: log_group.into(),
        }
    }

    /// A fetcher that only reports that it is not configured.
    pub fn disabled(log_group: impl Into<String>) -> Self {
        Self {
            source: None,
            log_group: log_group.into(),
        }
    }

    /// Builds the CloudWatch-backed fetcher, or a disabled one when
    /// credentials or the log group are missing. Setup problems go to the
    /// debug log; the search flow never sees them.
    pub fn from_credentials(
        credentials: Option<LogServiceCredentials>,
        log_group: &str,
        debug_log: &mut DebugLog,
    ) -> Self {
        match credentials {
            Some(_) if log_group.is_empty() => {
                debug_log.append(kind::ERROR, "Remote logs disabled: no log_group configured", None);
                Self::disabled(log_group)
            }
            Some(credentials) => {
                debug_log.append(
                    kind::REMOTE,
                    "Remote log client configured",
                    Some(json!({ "region": credentials.region, "log_group": log_group })),
                );
                Self::new(Arc::new(CloudWatchLogSource::new(&credentials)), log_group)
            }
            None => {
                debug_log.append(
                    kind::ERROR,
                    "Remote log client setup failed: AWS credentials or region missing",
                    None,
                );
                Self::disabled(log_group)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    /// Events of the most recently active stream. Failures are logged and
    /// produce an empty batch.
    pub async fn fetch_latest(&self, max_events: usize, debug_log: &mut DebugLog) -> RemoteLogBatch {
        match self.try_fetch(max_events, debug_log).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, log_group = %self.log_group, "Remote log fetch failed");
                debug_log.append(kind::ERROR, format!("Remote log fetch failed: {:#}", e), None);
                RemoteLogBatch::default()
            }
        }
    }

    async fn try_fetch(&self, max_events: usize, debug_log: &mut DebugLog) -> Result<RemoteLogBatch> {
        let source = self
            .source
            .as_ref()
            .context("remote log client is not configured")?;

        let Some(stream_name) = source.latest_stream(&self.log_group).await? else {
            debug_log.append(
                kind::ERROR,
                format!("No log streams found in {}", self.log_group),
                None,
            );
            return Ok(RemoteLogBatch::default());
        };

        let events = source
            .stream_events(&self.log_group, &stream_name, max_events)
            .await?;
        let entries: Vec<RemoteLogEntry> = events
            .into_iter()
            .map(|event| RemoteLogEntry {
                timestamp: format_epoch_millis(event.timestamp_ms),
                message: event.message.trim_end().to_string(),
            })
            .collect();

        debug_log.append(
            kind::REMOTE,
            format!("Fetched {} events from {}", entries.len(), stream_name),
            Some(json!({ "stream": stream_name, "count": entries.len() })),
        );

        Ok(RemoteLogBatch {
            stream_name: Some(stream_name),
            entries,
        })
    }
}

fn format_epoch_millis(timestamp_ms: Option<i64>) -> String {
    timestamp_ms
        .and_then(DateTime::from_timestamp_millis)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
