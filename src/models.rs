// ============================================================================
// File: src/models.rs
// API request, stream fragment and log entry models
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};

/// Request body for the streaming chat/search API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub chat_rooms_id: String,
    pub question: String,
}

/// News article cited by an answer. Position in the list is the citation number.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    /// ISO-8601 date-time, e.g. "2024-05-01T09:30:00"
    #[serde(default, deserialize_with = "null_as_default")]
    pub publish_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl Reference {
    /// Link target, if the article has a non-empty one
    pub fn target(&self) -> Option<&str> {
        self.link.as_deref().filter(|link| !link.is_empty())
    }
}

/// Reads `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One decoded line of the response stream
#[derive(Debug, Deserialize, Default)]
pub struct StreamEvent {
    pub prompt: Option<String>,
    pub keywords: Option<Vec<String>>,
    /// Incremental answer fragment
    pub answer: Option<String>,
    pub references: Option<Vec<Reference>>,
}

/// Entry of the client-side debug log
#[derive(Debug, Serialize, Clone)]
pub struct DebugLogEntry {
    /// Local time, "HH:MM:SS.mmm"
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Event fetched from the log-aggregation service
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RemoteLogEntry {
    /// UTC, "YYYY-MM-DD HH:MM:SS.mmm UTC"
    pub timestamp: String,
    pub message: String,
}
