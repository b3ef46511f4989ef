// ============================================================================
// File: src/chat_client.rs
// Streaming chat/search API client
// ============================================================================

use futures_util::TryStreamExt;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::config::Config;
use crate::debug_log::kind;
use crate::line_codec::LossyLineCodec;
use crate::models::SearchRequest;
use crate::session::SessionState;
use crate::stream::{drain_lines, StreamEnd, StreamReducer, StreamSink};

/// Ways a search request can fail. None of them end the session.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("The request timed out. Please try again in a moment.")]
    Timeout,

    #[error("HTTP error {status}: {message}")]
    Http { status: StatusCode, message: String },

    /// No response was received at all.
    #[error("Connection failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SearchError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SearchError::Timeout
        } else if let Some(status) = error.status() {
            SearchError::Http { status, message: error.to_string() }
        } else if error.is_connect() || error.is_request() {
            SearchError::Network(error)
        } else {
            SearchError::Unexpected(error.to_string())
        }
    }

    /// Classify a failure while reading the response body.
    fn from_io(error: io::Error) -> Self {
        let timed_out = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
        if timed_out || error.kind() == io::ErrorKind::TimedOut {
            SearchError::Timeout
        } else {
            SearchError::Stream(error.to_string())
        }
    }
}

pub struct ChatClient {
    client: Client,
    endpoint: String,
    chat_rooms_id: String,
    max_line_bytes: usize,
}

/// Longest single line kept from the stream; longer lines are skipped as malformed
const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SearchError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.search_endpoint.clone(),
            chat_rooms_id: config.chat_rooms_id.clone(),
            max_line_bytes: MAX_LINE_BYTES,
        })
    }

    #[cfg(test)]
    fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Send `question` and stream the answer into `session`.
    ///
    /// The reducer must already be in the streaming phase; this only drives it.
    /// Undecodable or oversized lines are passed on lossily so the reducer
    /// skips them; only transport failures end the stream early.
    pub async fn stream_answer(
        &self,
        question: &str,
        reducer: &mut StreamReducer,
        session: &mut SessionState,
        sink: &mut dyn StreamSink,
    ) -> Result<StreamEnd, SearchError> {
        let request = SearchRequest {
            chat_rooms_id: self.chat_rooms_id.clone(),
            question: question.to_string(),
        };

        session.debug_log.append(
            kind::REQUEST,
            format!("POST {}", self.endpoint),
            Some(json!({ "chatRoomsId": request.chat_rooms_id, "question": request.question })),
        );
        tracing::info!(endpoint = %self.endpoint, "Sending search request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        session.debug_log.append(
            kind::RESPONSE,
            format!("HTTP {}", status),
            Some(json!({ "status": status.as_u16() })),
        );

        if !status.is_success() {
            let message = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("failed to read error body: {}", e),
            };
            return Err(SearchError::Http { status, message });
        }

        let body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        let lines = FramedRead::new(body, LossyLineCodec::new(self.max_line_bytes));

        drain_lines(Box::pin(lines), reducer, session, sink)
            .await
            .map_err(SearchError::from_io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_is_fixed() {
        assert_eq!(
            SearchError::Timeout.to_string(),
            "The request timed out. Please try again in a moment."
        );
    }

    #[test]
    fn test_http_error_includes_status() {
        let error = SearchError::Http {
            status: StatusCode::BAD_GATEWAY,
            message: "upstream unavailable".to_string(),
        };
        let text = error.to_string();
        assert!(text.contains("502"));
        assert!(text.contains("upstream unavailable"));
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let error = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(SearchError::from_io(error), SearchError::Timeout));
    }

    #[test]
    fn test_io_reset_maps_to_stream() {
        let error = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        match SearchError::from_io(error) {
            SearchError::Stream(message) => assert!(message.contains("reset")),
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[derive(Default)]
    struct CollectSink {
        renders: Vec<String>,
    }

    impl StreamSink for CollectSink {
        fn answer_updated(&mut self, rendered: &str) {
            self.renders.push(rendered.to_string());
        }
    }

    /// Read one request: headers plus a `Content-Length` body.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let body_len = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Serve one canned HTTP response and return the endpoint URL.
    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/stream", addr)
    }

    /// Write `head`, then stall without closing the connection.
    async fn serve_stalled(head: &'static [u8]) -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket.write_all(head).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        format!("http://{}/stream", addr)
    }

    fn started(question: &str) -> (SessionState, StreamReducer) {
        let mut session = SessionState::new();
        let mut reducer = StreamReducer::new(true);
        reducer.begin(question, &mut session);
        (session, reducer)
    }

    fn client_with_timeout(endpoint: &str, timeout_secs: u64) -> ChatClient {
        let config: Config = serde_json::from_value(json!({
            "search_endpoint": endpoint,
            "chat_rooms_id": "room",
            "request_timeout_secs": timeout_secs,
        }))
        .unwrap();
        ChatClient::new(&config).unwrap()
    }

    fn client_for(endpoint: &str) -> ChatClient {
        client_with_timeout(endpoint, 5)
    }

    #[tokio::test]
    async fn test_streams_answer_from_server() {
        let endpoint = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             data: {\"prompt\":\"system prompt\"}\n\n\
             data: {\"answer\":\"Rates \"}\r\n\
             data: {\"answer\":\"rose 1\"}\n\
             data: {\"references\":[{\"index\":1,\"title\":\"t\",\"link\":\"https://n.example/1\"}]}\n\
             [done]\n\
             data: {\"answer\":\" ignored\"}\n",
        )
        .await;
        let client = client_for(&endpoint);
        let mut session = SessionState::new();
        let mut sink = CollectSink::default();
        let mut reducer = StreamReducer::new(true);
        reducer.begin("rates", &mut session);

        let end = client
            .stream_answer("rates", &mut reducer, &mut session, &mut sink)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Sentinel);
        assert_eq!(session.answer, "Rates rose 1");
        assert_eq!(session.prompt.as_deref(), Some("system prompt"));
        assert_eq!(
            sink.renders.last().map(String::as_str),
            Some("Rates rose [1](https://n.example/1)")
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_stream() {
        let endpoint = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
              data: {\"answer\":\"a\"}\n\
              data: {\"answer\":\"\xff\xfe\"}\n\
              data: {\"answer\":\"b\"}\n\
              [done]\n",
        )
        .await;
        let client = client_for(&endpoint);
        let (mut session, mut reducer) = started("q");

        let end = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Sentinel);
        // The bad bytes decode to U+FFFD inside a valid JSON string.
        assert_eq!(session.answer, "a\u{FFFD}\u{FFFD}b");
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped_as_malformed() {
        let endpoint = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
              data: {\"answer\":\"a\"}\n\
              data: {\"answer\":\"this line is far longer than the limit allows\"}\n\
              data: {\"answer\":\"b\"}\n\
              [done]\n",
        )
        .await;
        let client = client_for(&endpoint).with_max_line_bytes(32);
        let (mut session, mut reducer) = started("q");

        let end = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Sentinel);
        assert_eq!(session.answer, "ab");
        let parse_errors = session
            .debug_log
            .entries()
            .filter(|e| e.kind == kind::PARSE_ERROR)
            .count();
        assert_eq!(parse_errors, 1);
    }

    #[tokio::test]
    async fn test_answer_and_references_in_one_event() {
        let endpoint = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
              data: {\"answer\":\"see 1\",\"references\":[{\"index\":1,\"title\":\"t\",\"author\":null,\"link\":\"https://x\"}]}\n\
              [done]\n",
        )
        .await;
        let client = client_for(&endpoint);
        let (mut session, mut reducer) = started("q");
        let mut sink = CollectSink::default();

        client
            .stream_answer("q", &mut reducer, &mut session, &mut sink)
            .await
            .unwrap();

        assert_eq!(session.answer, "see 1");
        let references = session.references().unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].author, "");
        assert_eq!(sink.renders.last().map(String::as_str), Some("see [1](https://x)"));
    }

    #[tokio::test]
    async fn test_slow_headers_time_out() {
        let endpoint = serve_stalled(b"").await;
        let client = client_with_timeout(&endpoint, 1);
        let (mut session, mut reducer) = started("q");

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await;
        assert!(matches!(result, Err(SearchError::Timeout)), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_stalled_body_times_out_after_partial_answer() {
        let endpoint = serve_stalled(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
              data: {\"answer\":\"partial\"}\n",
        )
        .await;
        let client = client_with_timeout(&endpoint, 1);
        let (mut session, mut reducer) = started("q");

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await;
        assert!(matches!(result, Err(SearchError::Timeout)), "got {:?}", result);
        assert_eq!(session.answer, "partial");
    }

    #[tokio::test]
    async fn test_redirect_loop_is_unexpected_error() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 302 Found\r\nLocation: /stream\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });
        let client = client_for(&format!("http://{}/stream", addr));
        let (mut session, mut reducer) = started("q");

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await;
        match result {
            Err(SearchError::Unexpected(message)) => assert!(!message.is_empty()),
            other => panic!("expected unexpected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let endpoint = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 11\r\nConnection: close\r\n\r\nbackend off",
        )
        .await;
        let client = client_for(&endpoint);
        let mut session = SessionState::new();
        let mut reducer = StreamReducer::new(true);
        reducer.begin("q", &mut session);

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await;
        match result {
            Err(SearchError::Http { status, message }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(message, "backend off");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_error_body_keeps_status() {
        let endpoint = serve_once(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\nConnection: close\r\n\r\ncut",
        )
        .await;
        let client = client_for(&endpoint);
        let (mut session, mut reducer) = started("q");

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut CollectSink::default())
            .await;
        match result {
            Err(SearchError::Http { status, message }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(message.starts_with("failed to read error body:"), "got {}", message);
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config: Config = serde_json::from_str(
            r#"{"search_endpoint": "http://127.0.0.1:1/stream", "chat_rooms_id": "room", "request_timeout_secs": 5}"#,
        )
        .unwrap();
        let client = ChatClient::new(&config).unwrap();
        let mut session = SessionState::new();
        let mut reducer = StreamReducer::new(true);
        reducer.begin("q", &mut session);

        struct NullSink;
        impl StreamSink for NullSink {
            fn answer_updated(&mut self, _rendered: &str) {}
        }

        let result = client
            .stream_answer("q", &mut reducer, &mut session, &mut NullSink)
            .await;
        assert!(matches!(result, Err(SearchError::Network(_))));
    }
}
