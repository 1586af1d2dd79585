use thiserror::Error;

use pagewise_core::ExtractError;

pub mod assembler;
pub mod cache;
pub mod fetch;

// Re-export domain types for convenience
pub use assembler::{CLEAN_PREFIX, ContentAssembler};
pub use cache::{DEFAULT_TTL, DocumentCache, SWEEP_THRESHOLD};
pub use fetch::{DEFAULT_USER_AGENT, DocumentFetcher};
pub use pagewise_core::{CleanDocument, ExtractionRequest};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not an HTML document (content-type: {content_type:?})")]
    NotHtml { url: String, content_type: String },
    #[error("no document fetcher configured")]
    NoFetcher,
    #[error("navigation inference failed: {0}")]
    Nav(String),
    #[error("cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            IngestError::Cancelled => true,
            IngestError::Extract(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
