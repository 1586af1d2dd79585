use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod url_utils;

// Re-export for convenience
pub use backend::{BackendFuture, ExtractionBackend};
pub use url_utils::{is_same_site_different_page, relativize_url, resolve_url};

/// A single extraction call: the raw document and the URL it was served from.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub html_body: Bytes,
    pub document_url: String,
}

impl ExtractionRequest {
    pub fn new(html_body: impl Into<Bytes>, document_url: impl Into<String>) -> Self {
        Self {
            html_body: html_body.into(),
            document_url: document_url.into(),
        }
    }
}

/// Article fields produced by an extraction backend.
///
/// Field names on the wire follow the worker's camelCase JSON. Missing fields
/// decode as empty strings so a sparse worker response is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionResult {
    pub title: String,
    pub text_content: String,
    /// Cleaned article HTML.
    pub content: String,
    pub excerpt: String,
    pub site_name: String,
    pub published_time: String,
}

/// Outcome of a successful backend call.
///
/// `NoArticle` means the backend understood the document but found nothing
/// worth extracting. It is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Article(ExtractionResult),
    NoArticle,
}

impl Extraction {
    pub fn article(&self) -> Option<&ExtractionResult> {
        match self {
            Extraction::Article(result) => Some(result),
            Extraction::NoArticle => None,
        }
    }

    pub fn is_article(&self) -> bool {
        matches!(self, Extraction::Article(_))
    }

    /// Collapse into a result, using empty fields for `NoArticle`.
    pub fn into_result(self) -> ExtractionResult {
        match self {
            Extraction::Article(result) => result,
            Extraction::NoArticle => ExtractionResult::default(),
        }
    }
}

/// The merged output of extraction and navigation inference.
///
/// Empty `nav_next` / `nav_prev` mean no link was found in that direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanDocument {
    pub title: String,
    pub content_html: String,
    pub nav_next: String,
    pub nav_prev: String,
}

impl CleanDocument {
    pub fn assemble(extraction: Extraction, nav_next: String, nav_prev: String) -> Self {
        let result = extraction.into_result();
        Self {
            title: result.title,
            content_html: result.content,
            nav_next,
            nav_prev,
        }
    }

    pub fn has_navigation(&self) -> bool {
        !self.nav_next.is_empty() || !self.nav_prev.is_empty()
    }
}

/// Failures of the RPC channel itself, as opposed to failures the worker reports.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to worker socket {path}: {message}")]
    Connect { path: PathBuf, message: String },
    #[error("HTTP exchange with worker failed: {0}")]
    Http(String),
    #[error("failed to decode worker response (status {status}): {message}")]
    Decode { status: u16, message: String },
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("worker startup failed: {0}")]
    Startup(String),
    #[error("worker failed health check after {elapsed:?} ({attempts} attempts): {last}")]
    HealthCheck {
        elapsed: Duration,
        attempts: u32,
        #[source]
        last: Box<ExtractError>,
    },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("worker returned status {status}: {message}{}", details_suffix(.details))]
    Upstream {
        status: u16,
        message: String,
        details: Option<String>,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("extraction backend is closed")]
    Closed,
    #[error("worker shutdown not confirmed: {0}")]
    ShutdownTimeout(String),
}

fn details_suffix(details: &Option<String>) -> String {
    match details {
        Some(d) if !d.is_empty() => format!(" ({d})"),
        _ => String::new(),
    }
}

impl ExtractError {
    pub fn is_closed(&self) -> bool {
        matches!(self, ExtractError::Closed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractError::Transport(TransportError::Cancelled))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtractError::Transport(TransportError::TimedOut(_)))
    }
}
