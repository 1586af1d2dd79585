//! HTTP/1.1 over a Unix domain socket to the extraction worker.
//!
//! The client keeps a single connection and reconnects lazily when it has
//! been closed. A request that is cancelled or times out mid-flight leaves
//! the HTTP/1 connection in an unknown state, so it is dropped and the next
//! call dials again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

use pagewise_core::{ExtractError, Extraction, ExtractionRequest, ExtractionResult, TransportError};

/// Header carrying the document's original URL.
pub const DOCUMENT_URL_HEADER: &str = "X-Document-URL";

/// Content type of every request body.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Raw error bodies longer than this are truncated in `Upstream` messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

pub struct RpcClient {
    socket_path: PathBuf,
    sender: Option<SendRequest<Full<Bytes>>>,
}

impl RpcClient {
    /// A client bound to `socket_path`. Nothing is dialed until the first call.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            sender: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// `POST /` the document and interpret the worker's reply.
    pub async fn post_document(
        &mut self,
        request: &ExtractionRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Extraction, ExtractError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, self.exchange(request)) => Some(result),
        };

        let result = match outcome {
            None => Err(TransportError::Cancelled.into()),
            Some(Err(_elapsed)) => Err(TransportError::TimedOut(timeout).into()),
            Some(Ok(result)) => result,
        };
        if matches!(result, Err(ExtractError::Transport(_))) {
            self.sender = None;
        }
        result
    }

    async fn connect(&self) -> Result<SendRequest<Full<Bytes>>, TransportError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| TransportError::Connect {
                path: self.socket_path.clone(),
                message: e.to_string(),
            })?;

        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let socket = self.socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(socket = %socket.display(), error = %e, "worker connection ended");
            }
        });

        Ok(sender)
    }

    async fn sender(&mut self) -> Result<&mut SendRequest<Full<Bytes>>, TransportError> {
        let sender = match self.sender.take() {
            Some(sender) if !sender.is_closed() => sender,
            _ => self.connect().await?,
        };
        Ok(self.sender.insert(sender))
    }

    async fn exchange(&mut self, request: &ExtractionRequest) -> Result<Extraction, ExtractError> {
        let http_request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
            .header(DOCUMENT_URL_HEADER, request.document_url.as_str())
            .body(Full::new(request.html_body.clone()))
            .map_err(|e| ExtractError::InvalidInput(format!("cannot build worker request: {e}")))?;

        let sender = self.sender().await?;
        sender
            .ready()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let response = sender
            .send_request(http_request)
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?
            .to_bytes();

        interpret_response(status, &body)
    }
}

/// Error body shape the worker uses for non-200 replies.
#[derive(Debug, Deserialize)]
struct WorkerErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl WorkerErrorBody {
    fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    fn message(&self) -> Option<String> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }

    /// `details` may be a string or any JSON value; either way it becomes text.
    fn details(&self) -> Option<String> {
        match self.details.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }
}

/// Map a worker reply onto the extraction outcome or error taxonomy.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<Extraction, ExtractError> {
    if status == 200 {
        return match serde_json::from_slice::<Option<ExtractionResult>>(body) {
            Ok(Some(result)) => Ok(Extraction::Article(result)),
            Ok(None) => Ok(Extraction::NoArticle),
            Err(e) => Err(TransportError::Decode {
                status,
                message: e.to_string(),
            }
            .into()),
        };
    }

    let parsed = WorkerErrorBody::parse(body);
    let message = parsed.as_ref().and_then(WorkerErrorBody::message);

    if status == 400 {
        return Err(ExtractError::InvalidInput(
            message.unwrap_or_else(|| fallback_message(status, body)),
        ));
    }

    match message {
        Some(message) => Err(ExtractError::Upstream {
            status,
            message,
            details: parsed.as_ref().and_then(WorkerErrorBody::details),
        }),
        None => Err(ExtractError::Upstream {
            status,
            message: fallback_message(status, body),
            details: None,
        }),
    }
}

/// Trimmed raw body capped at [`MAX_ERROR_BODY_CHARS`], or the status reason.
fn fallback_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown status")
            .to_string();
    }
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    #[test]
    fn ok_object_is_article() {
        let body = br#"{"title":"T","content":"<p>x</p>","textContent":"x"}"#;
        let Extraction::Article(result) = interpret_response(200, body).unwrap() else {
            panic!("expected article");
        };
        assert_eq!(result.title, "T");
        assert_eq!(result.text_content, "x");
        assert!(result.site_name.is_empty());
    }

    #[test]
    fn ok_null_is_no_article() {
        assert_eq!(interpret_response(200, b"null").unwrap(), Extraction::NoArticle);
        assert_eq!(interpret_response(200, b" null\n").unwrap(), Extraction::NoArticle);
    }

    #[test]
    fn ok_garbage_is_decode_error() {
        let err = interpret_response(200, b"<html>oops</html>").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Transport(TransportError::Decode { status: 200, .. })
        ));
    }

    #[test]
    fn bad_request_is_invalid_input() {
        let err = interpret_response(400, br#"{"error":"empty body"}"#).unwrap_err();
        assert!(matches!(&err, ExtractError::InvalidInput(m) if m == "empty body"));

        let err = interpret_response(400, b"").unwrap_err();
        assert!(matches!(&err, ExtractError::InvalidInput(m) if m == "Bad Request"));
    }

    #[test]
    fn json_error_with_details() {
        let err =
            interpret_response(500, br#"{"error":"parse failed","details":"stack"}"#).unwrap_err();
        match err {
            ExtractError::Upstream {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "parse failed");
                assert_eq!(details.as_deref(), Some("stack"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn structured_details_become_text() {
        let err =
            interpret_response(503, br#"{"error":"busy","details":{"retry":1}}"#).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Upstream { details: Some(d), .. } if d == r#"{"retry":1}"#
        ));
    }

    #[test]
    fn empty_error_field_falls_back_to_raw_body() {
        let body = br#"{"error":""}"#;
        let err = interpret_response(502, body).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Upstream { message, details: None, .. } if message == r#"{"error":""}"#
        ));
    }

    #[test]
    fn long_raw_body_is_truncated() {
        let body = "x".repeat(500);
        let err = interpret_response(500, body.as_bytes()).unwrap_err();
        let ExtractError::Upstream { message, .. } = err else {
            panic!("expected upstream");
        };
        assert_eq!(message.len(), 203);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn empty_body_uses_reason_phrase() {
        let err = interpret_response(503, b"   ").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Upstream { message, .. } if message == "Service Unavailable"
        ));
    }

    /// Read one HTTP/1.1 request (headers plus content-length body).
    async fn read_request(stream: &mut tokio::net::UnixStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed early");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return String::from_utf8_lossy(&buf).into_owned();
                }
            }
        }
    }

    #[tokio::test]
    async fn posts_document_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("rpc.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let body = r#"{"title":"Hello","siteName":"Example"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            request
        });

        let mut client = RpcClient::new(&socket);
        let request = ExtractionRequest::new("<p>hi</p>", "https://example.com/a");
        let outcome = client
            .post_document(&request, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        let result = outcome.into_result();
        assert_eq!(result.title, "Hello");
        assert_eq!(result.site_name, "Example");

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("post / http/1.1"));
        assert!(raw.contains("x-document-url: https://example.com/a"));
        assert!(raw.contains("content-type: text/html; charset=utf-8"));
        assert!(raw.ends_with("<p>hi</p>"));
    }

    #[tokio::test]
    async fn missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = RpcClient::new(dir.path().join("absent.sock"));
        let request = ExtractionRequest::new("<p>hi</p>", "https://example.com/a");
        let err = client
            .post_document(&request, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Transport(TransportError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn silent_worker_times_out_and_cancel_wins() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("silent.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let mut client = RpcClient::new(&socket);
        let request = ExtractionRequest::new("<p>hi</p>", "https://example.com/a");
        let err = client
            .post_document(&request, Duration::from_millis(100), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .post_document(&request, Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
